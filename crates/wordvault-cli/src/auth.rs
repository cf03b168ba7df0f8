//! Request authentication.
//!
//! Users present a Firebase ID token as `Authorization: Bearer <token>`;
//! the verifier resolves it to a uid. Admin endpoints compare the bearer
//! token against the configured admin token instead.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

pub const FIREBASE_API_KEY_ENV: &str = "FIREBASE_API_KEY";
pub const ADMIN_TOKEN_ENV: &str = "WORDVAULT_ADMIN_TOKEN";
const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing Authorization: Bearer <token>")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token verification failed: {0}")]
    Verifier(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolves a bearer token to a user id.
    async fn verify(&self, token: &str) -> Result<String, AuthError>;

    fn name(&self) -> &str;
}

/// Extracts the token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Firebase
// ============================================================================

/// Verifies ID tokens through the Identity Toolkit `accounts:lookup` call.
pub struct FirebaseTokenVerifier {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirebaseTokenVerifier {
    pub fn new(api_key: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Verifier(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let url = format!("{}/v1/accounts:lookup", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": token }))
            .send()
            .await
            .map_err(|e| AuthError::Verifier(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Verifier(format!("identity toolkit error {status}: {body}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AuthError::Verifier(e.to_string()))?;
        let uid = parse_lookup_response(&body).ok_or(AuthError::InvalidToken)?;
        debug!(uid = %uid, "verified firebase token");
        Ok(uid)
    }

    fn name(&self) -> &str {
        "firebase"
    }
}

/// `localId` of the first user in an `accounts:lookup` response.
pub fn parse_lookup_response(v: &Value) -> Option<String> {
    v.pointer("/users/0/localId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Static tokens (development, tests)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, uid: &str) -> Self {
        self.tokens.insert(token.to_string(), uid.to_string());
        self
    }

    /// Parses `TOKEN=UID` pairs as given to `--dev-token`.
    pub fn from_pairs(pairs: &[String]) -> anyhow::Result<Self> {
        let mut verifier = Self::new();
        for pair in pairs {
            let (token, uid) = pair
                .split_once('=')
                .filter(|(t, u)| !t.trim().is_empty() && !u.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("--dev-token expects TOKEN=UID, got `{pair}`"))?;
            verifier = verifier.with_token(token.trim(), uid.trim());
        }
        Ok(verifier)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }

    fn name(&self) -> &str {
        "static"
    }
}
