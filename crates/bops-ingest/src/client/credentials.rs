//! Vendor credentials
//!
//! Credentials are explicit values handed to a client at construction, with
//! an explicit refresh contract, instead of hidden process-wide state.

use sha1::{Digest, Sha1};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::VendorError;

/// Static token credentials for the accounting vendor
#[derive(Debug, Clone)]
pub struct BooksCredentials {
    pub api_token: String,
    pub organization_id: String,
}

/// Login parameters for the POS vendor
#[derive(Debug, Clone)]
pub struct PosLogin {
    pub email: String,
    pub password: String,
}

/// An established POS session
#[derive(Debug, Clone)]
pub struct PosSession {
    /// Session cookie attached to every query call
    pub cookie: String,
    /// Vendor account number the queries are scoped to
    pub account: String,
}

/// Lazily-established, cached POS session.
///
/// The POS API has no token endpoint; a login exchange posts the email and
/// the SHA-1 digest of the password and yields a session cookie plus the
/// account number. The session is cached under a lock and re-established on
/// demand via [`refresh`](PosSessionProvider::refresh) when the vendor
/// rejects it.
pub struct PosSessionProvider {
    http: reqwest::Client,
    base_url: String,
    login: PosLogin,
    session: RwLock<Option<PosSession>>,
}

impl PosSessionProvider {
    pub fn new(http: reqwest::Client, base_url: String, login: PosLogin) -> Self {
        Self {
            http,
            base_url,
            login,
            session: RwLock::new(None),
        }
    }

    /// Current session, logging in first if none is cached.
    pub async fn session(&self) -> Result<PosSession, VendorError> {
        if let Some(session) = self.session.read().await.clone() {
            debug!("reusing cached POS session");
            return Ok(session);
        }
        self.refresh().await
    }

    /// Drop the cached session and perform a fresh login exchange.
    pub async fn refresh(&self) -> Result<PosSession, VendorError> {
        let mut guard = self.session.write().await;

        let password_sha1 = hex::encode(Sha1::digest(self.login.password.as_bytes()));
        let form = [
            ("email", self.login.email.as_str()),
            ("password_sha1", password_sha1.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| VendorError::Unavailable(format!("login request failed: {}", e)))?;

        if !response.status().is_success() {
            *guard = None;
            return Err(VendorError::Auth(format!(
                "login rejected with status {}",
                response.status()
            )));
        }

        let cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).to_string())
            .ok_or_else(|| VendorError::Auth("login response carried no session cookie".to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VendorError::Unavailable(format!("login response not JSON: {}", e)))?;

        let account = body
            .get("account")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                body.get("account")
                    .and_then(serde_json::Value::as_i64)
                    .map(|n| n.to_string())
            })
            .ok_or_else(|| VendorError::Auth("login response carried no account".to_string()))?;

        let session = PosSession { cookie, account };
        *guard = Some(session.clone());
        info!(account = %session.account, "POS session established");

        Ok(session)
    }

    /// Forget the cached session without logging in again.
    pub async fn invalidate(&self) {
        *self.session.write().await = None;
    }
}
