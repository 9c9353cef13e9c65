use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// One part of a user message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPart {
    Text { text: String },
    Image { url: String },
}

impl InputPart {
    fn to_value(&self) -> Value {
        match self {
            Self::Text { text } => json!({"type": "input_text", "text": text}),
            Self::Image { url } => {
                json!({"type": "input_image", "detail": "auto", "image_url": url})
            }
        }
    }
}

/// Protocol-native request input item, in source-conversation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputItem {
    UserMessage {
        parts: Vec<InputPart>,
    },
    /// Prior assistant text, re-serialized as a completed message item.
    AssistantMessage {
        id: String,
        text: String,
    },
    /// Prior tool invocation. `item_id` is derived from `call_id` so the
    /// same call maps to the same item on every turn.
    FunctionCall {
        item_id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl InputItem {
    /// Wire shape for this item.
    pub fn to_value(&self) -> Value {
        match self {
            Self::UserMessage { parts } => json!({
                "role": "user",
                "content": parts.iter().map(InputPart::to_value).collect::<Vec<_>>(),
            }),
            Self::AssistantMessage { id, text } => json!({
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": text, "annotations": []}],
                "status": "completed",
                "id": id,
            }),
            Self::FunctionCall {
                item_id,
                call_id,
                name,
                arguments,
            } => json!({
                "type": "function_call",
                "id": item_id,
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            }),
            Self::FunctionCallOutput { call_id, output } => json!({
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            }),
        }
    }
}

impl Serialize for InputItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestText {
    pub verbosity: String,
}

impl Default for RequestText {
    fn default() -> Self {
        Self {
            verbosity: "medium".to_string(),
        }
    }
}

/// Canonical request body for the responses endpoint.
///
/// Server-side conversation persistence stays disabled and streaming stays
/// enabled; tool-choice fields appear only when tools are supplied.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<InputItem>,
    pub store: bool,
    pub stream: bool,
    pub text: RequestText,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

impl ResponsesRequest {
    pub fn new(
        model: impl Into<String>,
        instructions: impl Into<String>,
        input: Vec<InputItem>,
    ) -> Self {
        Self {
            model: model.into(),
            instructions: instructions.into(),
            input,
            store: false,
            stream: true,
            text: RequestText::default(),
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }

    /// Attaches translated tool schemas; an empty catalog leaves the
    /// tool-choice fields out of the body entirely.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        if !tools.is_empty() {
            self.tools = tools;
            self.tool_choice = Some("auto".to_string());
            self.parallel_tool_calls = Some(true);
        }
        self
    }
}
