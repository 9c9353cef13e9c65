use std::time::Duration;

/// Default base URL for the responses gateway.
pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api";

/// Fixed whole-exchange deadline applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport configuration for responses-endpoint requests.
#[derive(Debug, Clone)]
pub struct CodexConfig {
    /// OAuth bearer token passed to `Authorization`.
    pub access_token: String,
    /// Account identifier carried in the `chatgpt-account-id` header.
    pub account_id: String,
    /// Base URL for the gateway.
    pub base_url: String,
    /// Client-origin identifier added to outgoing headers.
    pub originator: String,
    /// `User-Agent` value.
    pub user_agent: String,
    /// Whole-exchange timeout.
    pub timeout: Duration,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            account_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            originator: "pi".to_string(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CodexConfig {
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_originator(mut self, originator: impl Into<String>) -> Self {
        self.originator = originator.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the responses endpoint from the configured base URL.
    ///
    /// Rules: keep `/codex/responses` unchanged, append `/responses` when the
    /// path ends in `/codex`, append `/codex/responses` otherwise.
    #[must_use]
    pub fn responses_endpoint(&self) -> String {
        let base = if self.base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            self.base_url.trim()
        };

        let trimmed = base.trim_end_matches('/');
        if trimmed.ends_with("/codex/responses") {
            return trimmed.to_string();
        }
        if trimmed.ends_with("/codex") {
            return format!("{trimmed}/responses");
        }
        format!("{trimmed}/codex/responses")
    }
}
