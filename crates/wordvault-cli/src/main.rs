//! WordVault CLI
//!
//! - `serve`: the JSON HTTP API
//! - `extract` / `import`: run the upload pipeline on a local file
//! - `admin …`: store maintenance jobs (same code as `/api/admin/*`)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use wordvault_ingest_docs::UploadedFile;
use wordvault_model::CollectionKind;
use wordvault_storage::repo::CollectionRepo;

mod api;
mod auth;
mod backends;
mod import;
mod maintenance;
mod server;

use auth::{FirebaseTokenVerifier, StaticTokenVerifier, TokenVerifier, ADMIN_TOKEN_ENV, FIREBASE_API_KEY_ENV};
use backends::{BackendArgs, Backends};
use server::{AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "wordvault")]
#[command(author, version, about = "WordVault: SAT/TOEFL vocabulary backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server.
    Serve {
        /// Listen address (use port 0 for an ephemeral port).
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,

        /// Bearer token for `/api/admin/*` and other admin routes
        /// (falls back to `WORDVAULT_ADMIN_TOKEN`).
        #[arg(long)]
        admin_token: Option<String>,

        /// Write `{version, addr, pid}` JSON here once the listener is bound.
        #[arg(long)]
        ready_file: Option<PathBuf>,

        /// Development identity `TOKEN=UID` (repeatable); replaces Firebase auth.
        #[arg(long = "dev-token")]
        dev_tokens: Vec<String>,

        #[command(flatten)]
        backends: BackendArgs,
    },

    /// Extract candidate words from a PDF, image or text file and print the report.
    Extract {
        file: PathBuf,

        #[command(flatten)]
        backends: BackendArgs,
    },

    /// Extract words from a file and store them in an official collection.
    Import {
        file: PathBuf,

        /// Target official collection id.
        #[arg(long)]
        collection: String,

        /// Fill definitions, examples and synonyms through the LLM.
        #[arg(long)]
        enrich: bool,

        #[command(flatten)]
        backends: BackendArgs,
    },

    /// Store maintenance.
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Repair cut-off definitions through the LLM.
    FixDefinitions {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Rename a top-level field across a collection.
    MigrateField {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Copy legacy word documents into `words_v3`.
    Normalize {
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Delete a collection and its memberships.
    DeleteCollection {
        id: String,
        #[command(flatten)]
        backends: BackendArgs,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to start tokio runtime: {e}"))?;

    match cli.command {
        Commands::Serve {
            listen,
            admin_token,
            ready_file,
            dev_tokens,
            backends,
        } => runtime.block_on(cmd_serve(listen, admin_token, ready_file, dev_tokens, backends)),
        Commands::Extract { file, backends } => runtime.block_on(cmd_extract(file, backends)),
        Commands::Import {
            file,
            collection,
            enrich,
            backends,
        } => runtime.block_on(cmd_import(file, collection, enrich, backends)),
        Commands::Admin { command } => runtime.block_on(cmd_admin(command)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// serve
// ============================================================================

fn resolve_verifier(dev_tokens: &[String]) -> Result<Arc<dyn TokenVerifier>> {
    if !dev_tokens.is_empty() {
        let verifier = StaticTokenVerifier::from_pairs(dev_tokens)?;
        warn!(tokens = dev_tokens.len(), "using development tokens; do not expose this server");
        return Ok(Arc::new(verifier));
    }
    match std::env::var(FIREBASE_API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(Arc::new(
            FirebaseTokenVerifier::new(key.trim()).map_err(|e| anyhow!("firebase auth: {e}"))?,
        )),
        _ => {
            warn!("no {FIREBASE_API_KEY_ENV} and no --dev-token: user endpoints will reject every token");
            Ok(Arc::new(StaticTokenVerifier::new()))
        }
    }
}

async fn cmd_serve(
    listen: SocketAddr,
    admin_token: Option<String>,
    ready_file: Option<PathBuf>,
    dev_tokens: Vec<String>,
    args: BackendArgs,
) -> Result<()> {
    let backends = Backends::from_args(&args)?;
    let verifier = resolve_verifier(&dev_tokens)?;
    let admin_token = admin_token
        .or_else(|| std::env::var(ADMIN_TOKEN_ENV).ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if admin_token.is_none() {
        info!("admin endpoints disabled (no admin token)");
    }

    let state = Arc::new(AppState {
        store: backends.store,
        enricher: backends.enricher,
        pipeline: backends.pipeline,
        dictionary: backends.dictionary,
        verifier,
        admin_token,
        started_at: Utc::now(),
    });
    server::serve_async(ServerConfig { listen, ready_file }, state).await
}

// ============================================================================
// extract / import
// ============================================================================

async fn cmd_extract(file: PathBuf, args: BackendArgs) -> Result<()> {
    let backends = Backends::from_args(&args)?;
    let upload = UploadedFile::from_path(&file)
        .map_err(|e| anyhow!("failed to read {}: {e}", file.display()))?;
    let report = backends.pipeline.run(&upload).await?;
    eprintln!(
        "{} {} words from {} ({:?}, {:?})",
        "extracted".green().bold(),
        report.words.len(),
        file.display(),
        report.kind,
        report.strategy
    );
    print_json(&report)
}

async fn cmd_import(file: PathBuf, collection: String, enrich: bool, args: BackendArgs) -> Result<()> {
    let backends = Backends::from_args(&args)?;
    let enricher = if enrich {
        Some(backends.require_enricher()?)
    } else {
        None
    };

    let target = CollectionRepo::new(backends.store.as_ref())
        .get(&collection)
        .await?
        .ok_or_else(|| anyhow!("collection `{collection}` not found"))?;
    if target.kind != CollectionKind::Official {
        return Err(anyhow!("`{collection}` is not an official collection"));
    }

    let upload = UploadedFile::from_path(&file)
        .map_err(|e| anyhow!("failed to read {}: {e}", file.display()))?;
    let report = backends.pipeline.run(&upload).await?;
    let summary = import::store_candidates(
        backends.store.as_ref(),
        &report.words,
        import::source_for(report.kind),
        Some(&target.id),
        enricher,
    )
    .await?;

    CollectionRepo::new(backends.store.as_ref())
        .refresh_word_count(&target.id)
        .await?;

    eprintln!(
        "{} {} new, {} existing, {} invalid into {}",
        "imported".green().bold(),
        summary.created,
        summary.existing,
        summary.invalid.len(),
        target.id.bold()
    );
    print_json(&summary)
}

// ============================================================================
// admin
// ============================================================================

async fn cmd_admin(command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::FixDefinitions {
            dry_run,
            limit,
            backends,
        } => {
            let backends = Backends::from_args(&backends)?;
            let report = maintenance::fix_definitions(
                backends.store.as_ref(),
                backends.enricher.as_ref(),
                dry_run,
                limit,
            )
            .await?;
            eprintln!(
                "{} {} truncated, {} repaired, {} failed{}",
                "fix-definitions".cyan().bold(),
                report.truncated,
                report.repaired,
                report.failed,
                dry_run_note(dry_run)
            );
            print_json(&report)
        }
        AdminCommands::MigrateField {
            collection,
            from,
            to,
            dry_run,
            backends,
        } => {
            let backends = Backends::from_args(&backends)?;
            let report =
                maintenance::migrate_field(backends.store.as_ref(), &collection, &from, &to, dry_run)
                    .await?;
            eprintln!(
                "{} {} migrated, {} conflicts{}",
                "migrate-field".cyan().bold(),
                report.migrated,
                report.conflicts.len(),
                dry_run_note(dry_run)
            );
            print_json(&report)
        }
        AdminCommands::Normalize { dry_run, backends } => {
            let backends = Backends::from_args(&backends)?;
            let report = maintenance::normalize_words(backends.store.as_ref(), dry_run).await?;
            eprintln!(
                "{} {} normalized, {} skipped, {} failed{}",
                "normalize".cyan().bold(),
                report.normalized,
                report.skipped,
                report.failed.len(),
                dry_run_note(dry_run)
            );
            print_json(&report)
        }
        AdminCommands::DeleteCollection { id, backends } => {
            let backends = Backends::from_args(&backends)?;
            let report = maintenance::delete_collection(backends.store.as_ref(), &id).await?;
            eprintln!(
                "{} {} ({} documents touched)",
                "deleted".red().bold(),
                report.collection_id,
                report.documents_touched
            );
            print_json(&report)
        }
    }
}

fn dry_run_note(dry_run: bool) -> String {
    if dry_run {
        " (dry run)".yellow().to_string()
    } else {
        String::new()
    }
}
