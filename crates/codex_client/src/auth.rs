use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::CodexClientError;

/// Fixed OAuth token endpoint used for refresh exchanges.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";

/// OAuth client id registered by the external login CLI.
pub const DEFAULT_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";

/// Margin applied by the store before handing out a token.
pub const STORE_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Tighter margin applied by long-lived callers revalidating a cached token.
pub const CALL_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// One usable credential pair, with claims decoded from the access token.
///
/// `account_id` and `expires_at` are derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub account_id: String,
    pub expires_at: Option<u64>,
}

impl Credential {
    /// Returns true while `now + margin` stays before the expiry claim.
    ///
    /// A token without a decodable expiry is treated as usable; the gateway
    /// is the final arbiter.
    #[must_use]
    pub fn usable_for(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() + margin.as_secs() < expires_at,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default)]
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Full auth-file shape. Unknown sibling keys survive a rewrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default)]
    tokens: StoredTokens,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_refresh: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RefreshGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// File-backed OAuth credential store with transparent refresh.
///
/// The persisted pair is the only state shared across calls; a refresh
/// rewrites the whole file through a temp-file rename, so concurrent
/// refreshes race benignly and losers fall back to their stale token.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    token_url: String,
    client_id: String,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    /// Conventional location written by the external login flow.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codex").join("auth.json"))
    }

    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored credential, refreshing it first when it is within
    /// [`STORE_REFRESH_MARGIN`] of expiry and a refresh token is present.
    ///
    /// A failed exchange is logged and the existing pair is returned; the
    /// downstream call is the real arbiter of token validity.
    pub fn obtain(&self) -> Result<Credential, CodexClientError> {
        let mut auth = self.read_file()?;

        if needs_refresh(&auth.tokens, unix_now()) {
            match self.exchange_blocking(&auth.tokens) {
                Ok(grant) => self.accept_grant(&mut auth, grant),
                Err(error) => {
                    debug!("token refresh failed, using existing token: {error}");
                }
            }
        }

        Ok(credential_from(&auth.tokens))
    }

    /// Cooperative-concurrency variant of [`CredentialStore::obtain`].
    pub async fn obtain_async(&self) -> Result<Credential, CodexClientError> {
        let mut auth = self.read_file()?;

        if needs_refresh(&auth.tokens, unix_now()) {
            match self.exchange_async(&auth.tokens).await {
                Ok(grant) => self.accept_grant(&mut auth, grant),
                Err(error) => {
                    debug!("token refresh failed, using existing token: {error}");
                }
            }
        }

        Ok(credential_from(&auth.tokens))
    }

    fn read_file(&self) -> Result<AuthFile, CodexClientError> {
        if !self.path.exists() {
            return Err(CodexClientError::MissingCredentials);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            CodexClientError::CredentialFile {
                operation: "reading",
                path: self.path.clone(),
                source,
            }
        })?;
        let auth: AuthFile = serde_json::from_str(&raw)?;

        if auth.tokens.access_token.is_empty() {
            return Err(CodexClientError::MissingCredentials);
        }

        Ok(auth)
    }

    /// Applies a successful exchange: rotate in memory, then persist.
    ///
    /// A persist failure leaves the file on its previous pair; the fresh
    /// in-memory pair is still handed to the caller.
    fn accept_grant(&self, auth: &mut AuthFile, grant: RefreshGrant) {
        auth.tokens.access_token = grant.access_token;
        if let Some(refresh_token) = grant.refresh_token {
            auth.tokens.refresh_token = Some(refresh_token);
        }
        auth.last_refresh = rfc3339_now();

        match self.persist(auth) {
            Ok(()) => debug!("refreshed token persisted"),
            Err(error) => warn!("refreshed token could not be persisted: {error}"),
        }
    }

    fn persist(&self, auth: &AuthFile) -> Result<(), CodexClientError> {
        let body = serde_json::to_string_pretty(auth)?;
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, body).map_err(|source| CodexClientError::CredentialFile {
            operation: "writing",
            path: tmp.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp, perms).map_err(|source| {
                CodexClientError::CredentialFile {
                    operation: "restricting",
                    path: tmp.clone(),
                    source,
                }
            })?;
        }

        std::fs::rename(&tmp, &self.path).map_err(|source| CodexClientError::CredentialFile {
            operation: "replacing",
            path: self.path.clone(),
            source,
        })
    }

    fn exchange_blocking(&self, tokens: &StoredTokens) -> Result<RefreshGrant, CodexClientError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or(CodexClientError::MissingCredentials)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .map_err(CodexClientError::from_reqwest)?;

        let response = client
            .post(&self.token_url)
            .form(&self.exchange_params(refresh_token))
            .send()
            .map_err(CodexClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CodexClientError::Status(
                status,
                crate::error::status_message(status, &body),
            ));
        }

        response.json().map_err(CodexClientError::from_reqwest)
    }

    async fn exchange_async(&self, tokens: &StoredTokens) -> Result<RefreshGrant, CodexClientError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or(CodexClientError::MissingCredentials)?;
        let client = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .map_err(CodexClientError::from_reqwest)?;

        let response = client
            .post(&self.token_url)
            .form(&self.exchange_params(refresh_token))
            .send()
            .await
            .map_err(CodexClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexClientError::Status(
                status,
                crate::error::status_message(status, &body),
            ));
        }

        response.json().await.map_err(CodexClientError::from_reqwest)
    }

    fn exchange_params<'a>(&'a self, refresh_token: &'a str) -> [(&'static str, &'a str); 3] {
        [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ]
    }
}

fn credential_from(tokens: &StoredTokens) -> Credential {
    let account_id = account_id_from_token(&tokens.access_token).unwrap_or_default();
    if account_id.is_empty() {
        warn!("could not extract account id from access token; requests may fail");
    }

    Credential {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        account_id,
        expires_at: expiry_from_token(&tokens.access_token),
    }
}

fn needs_refresh(tokens: &StoredTokens, now: u64) -> bool {
    if tokens.refresh_token.is_none() {
        return false;
    }

    let expires_at = expiry_from_token(&tokens.access_token).unwrap_or(0);
    expires_at.saturating_sub(now) < STORE_REFRESH_MARGIN.as_secs()
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    exp: Option<u64>,
    #[serde(rename = "https://api.openai.com/auth")]
    auth: Option<AuthClaims>,
}

#[derive(Debug, Deserialize)]
struct AuthClaims {
    #[serde(default)]
    chatgpt_account_id: Option<String>,
}

fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;

    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| general_purpose::URL_SAFE.decode(payload))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Decodes the account-scoping claim embedded in the access token.
pub fn account_id_from_token(token: &str) -> Option<String> {
    decode_claims(token)?
        .auth
        .and_then(|auth| auth.chatgpt_account_id)
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
}

/// Decodes the expiry claim (unix seconds) from the access token.
pub fn expiry_from_token(token: &str) -> Option<u64> {
    decode_claims(token)?.exp
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn rfc3339_now() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}
