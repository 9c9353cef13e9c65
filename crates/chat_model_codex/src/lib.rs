//! Codex-backed implementation of the shared `chat_model` contract.
//!
//! This adapter owns credential lifetime for a long-lived model instance: a
//! cached credential is revalidated against the tight pre-call margin before
//! every invocation and reloaded through the store (which may refresh and
//! rewrite the persisted pair) once it drifts too close to expiry.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chat_model::{
    ChatMessage, ChatModel, ModelDelta, ModelError, ModelOutput, ModelProfile, ToolSpec,
};
use codex_client::{
    translate_history, translate_tools, BlockingCodexClient, CodexClientError, CodexConfig,
    Credential, CredentialStore, ResponsesRequest, CALL_REFRESH_MARGIN,
};

/// Stable provider identifier reported through [`ModelProfile`].
pub const CODEX_PROVIDER_ID: &str = "codex";

const DEFAULT_MODEL_ID: &str = "codex-mini-latest";

/// Runtime configuration for the Codex chat model.
#[derive(Debug, Clone, Default)]
pub struct CodexChatModelConfig {
    pub model_id: String,
    /// Auth-file location; defaults to the login CLI's conventional path.
    pub auth_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl CodexChatModelConfig {
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_auth_path(mut self, auth_path: impl Into<PathBuf>) -> Self {
        self.auth_path = Some(auth_path.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

trait CodexBackend: Send + Sync {
    fn complete(
        &self,
        credential: &Credential,
        request: &ResponsesRequest,
    ) -> Result<ModelOutput, CodexClientError>;

    fn complete_stream(
        &self,
        credential: &Credential,
        request: &ResponsesRequest,
        emit: &mut dyn FnMut(ModelDelta),
    ) -> Result<ModelOutput, CodexClientError>;
}

struct HttpCodexBackend {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl HttpCodexBackend {
    fn client(&self, credential: &Credential) -> Result<BlockingCodexClient, CodexClientError> {
        let mut config = CodexConfig::new(&credential.access_token, &credential.account_id);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        BlockingCodexClient::new(config)
    }
}

impl CodexBackend for HttpCodexBackend {
    fn complete(
        &self,
        credential: &Credential,
        request: &ResponsesRequest,
    ) -> Result<ModelOutput, CodexClientError> {
        self.client(credential)?.invoke(request)
    }

    fn complete_stream(
        &self,
        credential: &Credential,
        request: &ResponsesRequest,
        emit: &mut dyn FnMut(ModelDelta),
    ) -> Result<ModelOutput, CodexClientError> {
        let mut stream = self.client(credential)?.stream(request)?;
        for delta in &mut stream {
            emit(delta?);
        }
        Ok(stream.into_output())
    }
}

/// `ChatModel` adapter backed by the blocking Codex transport.
pub struct CodexChatModel {
    model_id: String,
    store: CredentialStore,
    cached: Mutex<Option<Credential>>,
    backend: Arc<dyn CodexBackend>,
}

impl CodexChatModel {
    pub fn new(config: CodexChatModelConfig) -> Result<Self, ModelError> {
        let auth_path = config
            .auth_path
            .or_else(CredentialStore::default_path)
            .ok_or_else(|| ModelError::new("could not resolve a home directory for auth.json"))?;

        Ok(Self {
            model_id: sanitize_model_id(config.model_id),
            store: CredentialStore::new(auth_path),
            cached: Mutex::new(None),
            backend: Arc::new(HttpCodexBackend {
                base_url: config.base_url,
                timeout: config.timeout,
            }),
        })
    }

    /// Returns the cached credential while it stays clear of the pre-call
    /// margin, otherwise reloads through the store.
    fn credential(&self) -> Result<Credential, ModelError> {
        let mut cached = lock_unpoisoned(&self.cached);

        if let Some(credential) = cached.as_ref() {
            if credential.usable_for(CALL_REFRESH_MARGIN) {
                return Ok(credential.clone());
            }
        }

        let fresh = self.store.obtain().map_err(map_client_error)?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    fn request(&self, history: &[ChatMessage], tools: &[ToolSpec]) -> ResponsesRequest {
        let (instructions, input) = translate_history(history);
        ResponsesRequest::new(&self.model_id, instructions, input)
            .with_tools(translate_tools(tools))
    }

    #[cfg(test)]
    fn with_backend_for_tests(
        model_id: impl Into<String>,
        credential: Credential,
        backend: Arc<dyn CodexBackend>,
    ) -> Self {
        Self {
            model_id: sanitize_model_id(model_id.into()),
            store: CredentialStore::new("/nonexistent/auth.json"),
            cached: Mutex::new(Some(credential)),
            backend,
        }
    }
}

impl ChatModel for CodexChatModel {
    fn profile(&self) -> ModelProfile {
        ModelProfile {
            provider_id: CODEX_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn complete(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelOutput, ModelError> {
        let credential = self.credential()?;
        let request = self.request(history, tools);
        self.backend
            .complete(&credential, &request)
            .map_err(map_client_error)
    }

    fn complete_stream(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSpec],
        emit: &mut dyn FnMut(ModelDelta),
    ) -> Result<ModelOutput, ModelError> {
        let credential = self.credential()?;
        let request = self.request(history, tools);
        self.backend
            .complete_stream(&credential, &request, emit)
            .map_err(map_client_error)
    }
}

fn sanitize_model_id(model_id: String) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_client_error(error: CodexClientError) -> ModelError {
    ModelError::new(format!("codex request failed: {error}"))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
