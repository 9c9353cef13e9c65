use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::config::CodexConfig;
use crate::error::CodexClientError;

pub const HEADER_ACCOUNT_ID: &str = "chatgpt-account-id";
pub const HEADER_OPENAI_BETA: &str = "openai-beta";
pub const HEADER_ORIGINATOR: &str = "originator";

/// Builds the deterministic header map for one responses request.
pub fn build_headers(config: &CodexConfig) -> Result<HeaderMap, CodexClientError> {
    if config.access_token.trim().is_empty() {
        return Err(CodexClientError::MissingAccessToken);
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        value(
            "authorization",
            &format!("Bearer {}", config.access_token.trim()),
        )?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_ACCOUNT_ID),
        value(HEADER_ACCOUNT_ID, config.account_id.trim())?,
    );
    headers.insert(
        HeaderName::from_static(HEADER_OPENAI_BETA),
        HeaderValue::from_static("responses=experimental"),
    );
    headers.insert(
        HeaderName::from_static(HEADER_ORIGINATOR),
        value(HEADER_ORIGINATOR, config.originator.trim())?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, value("user-agent", config.user_agent.trim())?);

    Ok(headers)
}

fn value(name: &'static str, raw: &str) -> Result<HeaderValue, CodexClientError> {
    HeaderValue::from_str(raw).map_err(|_| CodexClientError::InvalidHeader(name))
}
