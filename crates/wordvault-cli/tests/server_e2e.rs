use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

const USER_TOKEN: &str = "t1";
const ADMIN_TOKEN: &str = "adm";

fn wordvault_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wordvault"))
}

struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Starts `wordvault serve` on an ephemeral port and returns its address.
fn spawn_server(run_dir: &Path, extra: &[&str]) -> (ChildGuard, String) {
    let ready_file = run_dir.join("ready.json");
    let _ = fs::remove_file(&ready_file);
    let child = Command::new(wordvault_bin())
        .current_dir(run_dir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_VISION_API_KEY")
        .env_remove("FIREBASE_API_KEY")
        .env_remove("WORDVAULT_ADMIN_TOKEN")
        .arg("serve")
        .arg("--listen")
        .arg("127.0.0.1:0")
        .arg("--ready-file")
        .arg(&ready_file)
        .arg("--llm-mock")
        .arg("--offline-dictionary")
        .arg("--dev-token")
        .arg(format!("{USER_TOKEN}=alice"))
        .arg("--admin-token")
        .arg(ADMIN_TOKEN)
        .args(extra)
        .spawn()
        .expect("spawn wordvault serve");
    let guard = ChildGuard { child };

    let deadline = Instant::now() + Duration::from_secs(10);
    while !ready_file.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(ready_file.exists(), "server did not write ready file");

    let ready: Value =
        serde_json::from_str(&fs::read_to_string(&ready_file).expect("read ready file"))
            .expect("parse ready json");
    assert_eq!(ready["version"], "wordvault_server_ready_v1");
    let addr = ready["addr"].as_str().expect("ready.addr is string").to_string();
    (guard, addr)
}

fn http(
    addr: &str,
    method: &str,
    path: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
    stream.set_write_timeout(Some(Duration::from_secs(5))).ok();

    let mut request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    if let Some(ct) = content_type {
        request.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    if let Some(tok) = token {
        request.push_str(&format!("Authorization: Bearer {tok}\r\n"));
    }
    request.push_str("\r\n");

    stream.write_all(request.as_bytes()).expect("write request");
    stream.write_all(body).expect("write body");
    stream.flush().ok();

    let mut response_bytes = Vec::new();
    stream.read_to_end(&mut response_bytes).expect("read response");
    let response = String::from_utf8_lossy(&response_bytes).to_string();

    let status = response
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    let body_text = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body_text)
}

fn http_json(addr: &str, method: &str, path: &str, token: Option<&str>, body: Option<&Value>) -> (u16, Value) {
    let bytes = body.map(|b| serde_json::to_vec(b).expect("serialize")).unwrap_or_default();
    let ct = body.map(|_| "application/json");
    let (status, text) = http(addr, method, path, token, ct, &bytes);
    let json = serde_json::from_str(&text).expect("parse JSON response");
    (status, json)
}

#[test]
fn serve_health_status_and_auth() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_guard, addr) = spawn_server(dir.path(), &[]);

    let (status, text) = http(&addr, "GET", "/healthz", None, None, b"");
    assert_eq!(status, 200);
    assert_eq!(text, "ok\n");

    let (status, body) = http_json(&addr, "GET", "/api/status", None, None);
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["store"], "memory");
    assert_eq!(body["llm"], "mock");

    let (status, body) = http_json(&addr, "GET", "/api/personal-collections", None, None);
    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, _) = http_json(&addr, "POST", "/api/admin/normalize", Some(USER_TOKEN), None);
    assert_eq!(status, 401);
    let (status, body) = http_json(&addr, "POST", "/api/admin/normalize", Some(ADMIN_TOKEN), None);
    assert_eq!(status, 200, "{body}");

    let (status, _) = http_json(&addr, "GET", "/api/does-not-exist", None, None);
    assert_eq!(status, 404);
}

#[test]
fn serve_upload_study_round() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_guard, addr) = spawn_server(dir.path(), &[]);

    let (status, body) = http_json(
        &addr,
        "POST",
        "/api/personal-collections",
        Some(USER_TOKEN),
        Some(&json!({ "name": "Week 1" })),
    );
    assert_eq!(status, 200, "{body}");
    let collection_id = body["collection"]["id"].as_str().expect("collection id").to_string();

    let list = "abate - to lessen\ncandid - honest and direct\nlaconic - using few words\nzeal - great energy\n";
    let (status, text) = http(
        &addr,
        "POST",
        &format!("/api/extract?filename=week1.txt&save_to={collection_id}"),
        Some(USER_TOKEN),
        Some("text/plain"),
        list.as_bytes(),
    );
    assert_eq!(status, 200, "{text}");
    let body: Value = serde_json::from_str(&text).expect("parse extract response");
    assert_eq!(body["saved"]["created"], 4);

    let (status, body) = http_json(
        &addr,
        "GET",
        &format!("/api/study/flashcards?collection_id={collection_id}&seed=3"),
        Some(USER_TOKEN),
        None,
    );
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["count"], 4);

    let word_id = body["cards"][0]["word"]["id"].as_str().expect("word id").to_string();
    let headword = body["cards"][0]["word"]["word"].as_str().expect("headword").to_string();
    let (status, body) = http_json(
        &addr,
        "POST",
        "/api/study/typing/check",
        Some(USER_TOKEN),
        Some(&json!({ "wordId": word_id, "answer": headword })),
    );
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["correct"], true);

    let (status, body) = http_json(
        &addr,
        "GET",
        &format!("/api/progress?collection_id={collection_id}"),
        Some(USER_TOKEN),
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body["stats"]["total"], 4);
    assert_eq!(body["stats"]["learning"], 1);
}

#[test]
fn oversized_body_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_guard, addr) = spawn_server(dir.path(), &[]);

    let mut stream = TcpStream::connect(&addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
    let request = format!(
        "POST /api/extract HTTP/1.1\r\nHost: {addr}\r\nContent-Length: {}\r\nAuthorization: Bearer {USER_TOKEN}\r\nConnection: close\r\n\r\n",
        11 * 1024 * 1024
    );
    stream.write_all(request.as_bytes()).expect("write request");
    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response);
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");
}

#[test]
fn cli_import_and_admin_against_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_file = dir.path().join("store.json");
    let data_arg = data_file.to_string_lossy().to_string();

    {
        let (_guard, addr) =
            spawn_server(dir.path(), &["--store", "file", "--data-file", &data_arg]);
        let (status, body) = http_json(
            &addr,
            "POST",
            "/api/collections",
            Some(ADMIN_TOKEN),
            Some(&json!({ "id": "sat-1", "name": "SAT day 1", "category": "sat" })),
        );
        assert_eq!(status, 200, "{body}");
    }

    let list_path = dir.path().join("day1.txt");
    fs::write(&list_path, "abate - to lessen\ncandid - honest\nzeal - great energy\n").expect("write list");

    let out = Command::new(wordvault_bin())
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_VISION_API_KEY")
        .arg("extract")
        .arg(&list_path)
        .arg("--offline-dictionary")
        .output()
        .expect("run wordvault extract");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report: Value = serde_json::from_slice(&out.stdout).expect("parse extract report");
    assert_eq!(report["words"].as_array().map(Vec::len), Some(3));

    let out = Command::new(wordvault_bin())
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_VISION_API_KEY")
        .arg("import")
        .arg(&list_path)
        .arg("--collection")
        .arg("sat-1")
        .arg("--store")
        .arg("file")
        .arg("--data-file")
        .arg(&data_file)
        .arg("--offline-dictionary")
        .output()
        .expect("run wordvault import");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let summary: Value = serde_json::from_slice(&out.stdout).expect("parse import summary");
    assert_eq!(summary["created"], 3);

    let out = Command::new(wordvault_bin())
        .arg("import")
        .arg(&list_path)
        .arg("--collection")
        .arg("missing")
        .arg("--store")
        .arg("file")
        .arg("--data-file")
        .arg(&data_file)
        .arg("--offline-dictionary")
        .output()
        .expect("run wordvault import");
    assert!(!out.status.success());

    let out = Command::new(wordvault_bin())
        .env_remove("GOOGLE_VISION_API_KEY")
        .args(["admin", "delete-collection", "sat-1", "--store", "file", "--offline-dictionary"])
        .arg("--data-file")
        .arg(&data_file)
        .output()
        .expect("run wordvault admin delete-collection");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report: Value = serde_json::from_slice(&out.stdout).expect("parse delete report");
    assert_eq!(report["collectionId"], "sat-1");
    assert_eq!(report["kind"], "official");
}
