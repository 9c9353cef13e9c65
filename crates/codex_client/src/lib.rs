//! Client for the subscription-authenticated Codex responses gateway.
//!
//! Speaks the "Responses"-style wire protocol over SSE, authenticated with
//! OAuth bearer credentials that are loaded from the external login flow's
//! auth file and refreshed transparently. Buffered and streaming invocation
//! are available in both blocking and cooperative-concurrency variants; all
//! four shapes share the same frame parser and response assembler, differing
//! only in how bytes are sourced.
//!
//! Tool-call reconstruction is the delicate part: argument fragments arrive
//! under an ephemeral per-item id while calls are keyed by a stable call id,
//! so the assembler keeps a per-response resolution table between the two.

pub mod assembler;
pub mod auth;
pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod translate;

pub use assembler::ResponseAssembler;
pub use auth::{Credential, CredentialStore, CALL_REFRESH_MARGIN, STORE_REFRESH_MARGIN};
pub use blocking::{BlockingCodexClient, BlockingCodexStream};
pub use client::{CodexClient, CodexStream};
pub use config::{CodexConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::CodexClientError;
pub use events::StreamEvent;
pub use payload::{InputItem, InputPart, ResponsesRequest};
pub use sse::SseFrameParser;
pub use translate::{derive_item_id, translate_history, translate_tools};
