use chat_model::TokenUsage;
use serde_json::Value;

/// Protocol event decoded from one SSE `data:` payload.
///
/// The set is closed on purpose: every downstream match is exhaustive, so a
/// new wire event type becomes a compile-time-visible change here.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `response.output_text.delta`
    OutputTextDelta { delta: String },
    /// `response.output_item.added` carrying a function-call item.
    FunctionCallAdded {
        item_id: String,
        call_id: String,
        name: String,
    },
    /// `response.function_call_arguments.delta`; carries the ephemeral
    /// `item_id`, and only sometimes the stable `call_id`.
    FunctionCallArgumentsDelta {
        item_id: String,
        call_id: Option<String>,
        delta: String,
    },
    /// `response.completed` (and its `response.done` alias).
    Completed { usage: Option<TokenUsage> },
    /// `error` event inside an otherwise successful stream.
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}

impl StreamEvent {
    /// Maps one decoded JSON payload; unrecognized types drop to `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let event_type = value.get("type")?.as_str()?;

        match event_type {
            "response.output_text.delta" => Some(Self::OutputTextDelta {
                delta: str_field(value, "delta"),
            }),
            "response.output_item.added" => {
                let item = value.get("item")?;
                if item.get("type").and_then(Value::as_str) != Some("function_call") {
                    return None;
                }
                Some(Self::FunctionCallAdded {
                    item_id: str_field(item, "id"),
                    call_id: str_field(item, "call_id"),
                    name: str_field(item, "name"),
                })
            }
            "response.function_call_arguments.delta" => Some(Self::FunctionCallArgumentsDelta {
                item_id: str_field(value, "item_id"),
                call_id: value
                    .get("call_id")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                delta: str_field(value, "delta"),
            }),
            "response.completed" | "response.done" => Some(Self::Completed {
                usage: value
                    .get("response")
                    .and_then(|response| response.get("usage"))
                    .map(usage_from_value),
            }),
            "error" => Some(Self::Error {
                code: value
                    .get("code")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            }),
            _ => None,
        }
    }
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn usage_from_value(value: &Value) -> TokenUsage {
    let count = |field: &str| value.get(field).and_then(Value::as_u64).unwrap_or(0);
    TokenUsage {
        input_tokens: count("input_tokens"),
        output_tokens: count("output_tokens"),
        total_tokens: count("total_tokens"),
    }
}
