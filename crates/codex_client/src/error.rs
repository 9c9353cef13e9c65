use std::path::PathBuf;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodexClientError {
    /// No persisted credential pair exists; an external login must run first.
    #[error("no stored credentials found; complete the provider login flow first")]
    MissingCredentials,

    #[error("credential file error while {operation} {path}: {source}")]
    CredentialFile {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("access token is required")]
    MissingAccessToken,

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Connection-level failure before or while reading the response.
    #[error("request error: {0}")]
    Transport(reqwest::Error),

    /// Non-success HTTP status with the extracted upstream message.
    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),

    /// The fixed whole-exchange deadline elapsed. Kept distinct from
    /// [`CodexClientError::Transport`] so callers can retry with backoff.
    #[error("request timed out")]
    Timeout,

    /// An `error` event arrived inside an otherwise successful stream.
    #[error("provider error: {message}")]
    Protocol {
        code: Option<String>,
        message: String,
    },

    #[error("response body read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CodexClientError {
    /// Maps a reqwest failure, surfacing elapsed deadlines as [`Self::Timeout`].
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error)
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

/// Extracts a display-ready message from a non-success response body.
pub(crate) fn status_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload
            .error
            .and_then(|fields| fields.message)
            .filter(|message| !message.is_empty())
        {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
