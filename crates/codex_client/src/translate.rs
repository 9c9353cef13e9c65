use chat_model::{ChatMessage, ContentPart, MessageContent, Role, ToolSpec};
use serde_json::{json, Value};

use crate::auth::unix_now;
use crate::payload::{InputItem, InputPart};

/// Protocol ceiling on item identifier length.
const ITEM_ID_MAX_LEN: usize = 64;

/// Converts an ordered history into the instructions string plus
/// protocol-native input items.
///
/// Item order follows the source conversation. System messages overwrite the
/// instructions (last one wins). An assistant turn carrying both tool calls
/// and text emits the call items first, so every call precedes anything that
/// could reference it.
pub fn translate_history(history: &[ChatMessage]) -> (String, Vec<InputItem>) {
    let mut instructions = String::new();
    let mut items = Vec::new();

    for message in history {
        match message.role {
            Role::System => instructions = message.content.joined_text(),
            Role::User => items.push(InputItem::UserMessage {
                parts: user_parts(&message.content),
            }),
            Role::Assistant => {
                for call in &message.tool_calls {
                    items.push(InputItem::FunctionCall {
                        item_id: derive_item_id(&call.id),
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    });
                }

                let text = message.content.joined_text();
                if !text.is_empty() {
                    items.push(InputItem::AssistantMessage {
                        id: format!("msg_{}", unix_now()),
                        text,
                    });
                }
            }
            Role::Tool => items.push(InputItem::FunctionCallOutput {
                call_id: message.tool_call_id.clone().unwrap_or_default(),
                output: message.content.joined_text(),
            }),
        }
    }

    (instructions, items)
}

/// Derives the stable item identifier for a tool call.
///
/// Deterministic so the same call re-serialized on a later turn maps to the
/// same identifier: fixed prefix plus truncation to the protocol ceiling.
pub fn derive_item_id(call_id: &str) -> String {
    let mut item_id = format!("fc_{call_id}");
    if item_id.len() > ITEM_ID_MAX_LEN {
        let mut end = ITEM_ID_MAX_LEN;
        while !item_id.is_char_boundary(end) {
            end -= 1;
        }
        item_id.truncate(end);
    }
    item_id
}

fn user_parts(content: &MessageContent) -> Vec<InputPart> {
    match content {
        MessageContent::Text(text) => vec![InputPart::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => InputPart::Text { text: text.clone() },
                ContentPart::Image { url } => InputPart::Image { url: url.clone() },
            })
            .collect(),
    }
}

/// Converts a tool catalog into protocol-native function schemas.
///
/// Order-preserving; catalogs can be mixed-origin, so specs with an empty
/// name or a non-object parameter schema are skipped rather than rejected.
pub fn translate_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .filter(|tool| !tool.name.is_empty() && tool.parameters.is_object())
        .map(|tool| {
            json!({
                "type": "function",
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
                "strict": false,
            })
        })
        .collect()
}
