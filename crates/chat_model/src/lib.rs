//! Minimal provider-agnostic contract for chat-completion models.
//!
//! This crate intentionally defines only the shared conversation history,
//! tool declaration, and model output types plus the [`ChatModel`] invocation
//! contract. It excludes provider transport details, protocol payloads, and
//! tool execution concerns.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error raised by a model implementation, carrying a display-ready message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    message: String,
}

impl ModelError {
    /// Creates a new model error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ModelError {}

impl From<String> for ModelError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ModelError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One part of a multi-modal message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
}

/// Message body: plain text or an ordered list of typed parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenates every textual part; image parts contribute nothing.
    #[must_use]
    pub fn joined_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect(),
        }
    }

    /// Returns true when no text and no parts are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// One requested tool invocation, with arguments as a raw JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One entry of an ordered conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Tool invocations requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Originating call id for a tool-role result message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    /// Tool-role result message carrying the output for one call id.
    #[must_use]
    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(output.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Source-agnostic function-tool declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema for the tool's arguments object.
    pub parameters: Value,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Aggregated result of one completed model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Default for ModelOutput {
    fn default() -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Vec::new(),
            usage: None,
        }
    }
}

/// Incremental result emitted while a model response streams in.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    /// A fragment of assistant text, in arrival order.
    TextDelta { text: String },
    /// The provider opened a new tool invocation.
    ToolCallStarted { call_id: String, name: String },
    /// A fragment of one tool call's JSON arguments.
    ToolCallArgumentsDelta { call_id: String, delta: String },
    /// Terminal result carrying the fully assembled output.
    Completed(ModelOutput),
}

impl ModelDelta {
    /// Returns true when this delta terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Immutable metadata describing a model implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Contract implemented by chat-completion model backends.
///
/// Implementations receive an ordered history and an optional tool catalog
/// and either return one aggregated output or surface incremental deltas
/// through `emit` before returning the terminal output.
pub trait ChatModel: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ModelProfile;

    /// Runs one buffered invocation.
    fn complete(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelOutput, ModelError>;

    /// Runs one streaming invocation, emitting deltas in arrival order.
    ///
    /// The returned output matches the state carried by the final
    /// [`ModelDelta::Completed`] delta.
    fn complete_stream(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSpec],
        emit: &mut dyn FnMut(ModelDelta),
    ) -> Result<ModelOutput, ModelError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ChatMessage, ContentPart, MessageContent, ModelDelta, ModelError, ModelOutput, Role,
        TokenUsage, ToolCallRequest, ToolSpec,
    };

    #[test]
    fn joined_text_concatenates_text_parts_and_skips_images() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "see ".to_string(),
            },
            ContentPart::Image {
                url: "https://example.com/cat.png".to_string(),
            },
            ContentPart::Text {
                text: "above".to_string(),
            },
        ]);

        assert_eq!(content.joined_text(), "see above");
        assert!(!content.is_empty());
    }

    #[test]
    fn plain_constructors_set_role_and_text_content() {
        let message = ChatMessage::user("hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, MessageContent::Text("hello".to_string()));
        assert!(message.tool_calls.is_empty());
        assert!(message.tool_call_id.is_none());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let message = ChatMessage::tool_result("call-1", "42");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(message.content.joined_text(), "42");
    }

    #[test]
    fn model_delta_terminal_detection_matches_lifecycle() {
        assert!(!ModelDelta::TextDelta {
            text: "hi".to_string(),
        }
        .is_terminal());
        assert!(!ModelDelta::ToolCallStarted {
            call_id: "c".to_string(),
            name: "get_weather".to_string(),
        }
        .is_terminal());
        assert!(ModelDelta::Completed(ModelOutput::default()).is_terminal());
    }

    #[test]
    fn model_error_preserves_message() {
        let error = ModelError::new("missing token");
        assert_eq!(error.message(), "missing token");
        assert_eq!(error.to_string(), "missing token");
    }

    #[test]
    fn chat_message_round_trips_through_json() {
        let message = ChatMessage {
            role: Role::Assistant,
            content: MessageContent::Text("calling a tool".to_string()),
            tool_calls: vec![ToolCallRequest {
                id: "call-9".to_string(),
                name: "get_weather".to_string(),
                arguments: "{\"city\":\"Lyon\"}".to_string(),
            }],
            tool_call_id: None,
        };

        let encoded = serde_json::to_string(&message).expect("serialize message");
        let decoded: ChatMessage = serde_json::from_str(&encoded).expect("deserialize message");
        assert_eq!(decoded, message);
    }

    #[test]
    fn model_output_serialization_skips_empty_fields() {
        let output = ModelOutput {
            role: Role::Assistant,
            content: Some("done".to_string()),
            tool_calls: Vec::new(),
            usage: None,
        };

        let value = serde_json::to_value(&output).expect("serialize output");
        assert_eq!(value["content"], json!("done"));
        assert!(value.get("tool_calls").is_none());
        assert!(value.get("usage").is_none());
    }

    #[test]
    fn usage_defaults_to_zero_counts() {
        let usage = TokenUsage::default();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.total_tokens, 0);
    }

    #[test]
    fn tool_spec_holds_schema_value() {
        let spec = ToolSpec {
            name: "get_weather".to_string(),
            description: "Current weather for a city".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        };

        assert_eq!(spec.parameters["required"][0], "city");
    }
}
