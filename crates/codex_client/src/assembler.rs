use std::collections::HashMap;

use chat_model::{ModelDelta, ModelOutput, Role, TokenUsage, ToolCallRequest};

use crate::error::CodexClientError;
use crate::events::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Accumulating,
    Completed,
    Errored,
}

#[derive(Debug)]
struct PendingCall {
    call_id: String,
    name: String,
    arguments: String,
}

/// Event-driven reducer turning protocol events into model results.
///
/// Shared by every transport shape: buffered callers drain the stream and
/// take [`ResponseAssembler::finish`]; streaming callers forward the deltas
/// returned from each [`ResponseAssembler::absorb`].
///
/// All state here is scoped to one request/response cycle. Argument-delta
/// events identify their call by an ephemeral `item_id`, so a resolution
/// table maps those back to stable call ids; both tables die with the
/// assembler.
#[derive(Debug)]
pub struct ResponseAssembler {
    phase: Phase,
    text: String,
    calls: Vec<PendingCall>,
    item_to_call: HashMap<String, String>,
    usage: Option<TokenUsage>,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            text: String::new(),
            calls: Vec::new(),
            item_to_call: HashMap::new(),
            usage: None,
        }
    }

    /// Absorbs one event, returning the incremental results it produced.
    ///
    /// An `Error` event is fatal to the call and transitions the assembler
    /// to its errored terminal state. Events arriving after a terminal
    /// transition are ignored.
    pub fn absorb(&mut self, event: StreamEvent) -> Result<Vec<ModelDelta>, CodexClientError> {
        if matches!(self.phase, Phase::Completed | Phase::Errored) {
            return Ok(Vec::new());
        }
        self.phase = Phase::Accumulating;

        match event {
            StreamEvent::OutputTextDelta { delta } => {
                self.text.push_str(&delta);
                Ok(vec![ModelDelta::TextDelta { text: delta }])
            }
            StreamEvent::FunctionCallAdded {
                item_id,
                call_id,
                name,
            } => {
                if !item_id.is_empty() {
                    self.item_to_call.insert(item_id, call_id.clone());
                }

                // A repeated call id restarts that call's accumulator.
                if let Some(existing) = self.call_mut(&call_id) {
                    existing.name = name.clone();
                    existing.arguments.clear();
                } else {
                    self.calls.push(PendingCall {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                    });
                }

                Ok(vec![ModelDelta::ToolCallStarted { call_id, name }])
            }
            StreamEvent::FunctionCallArgumentsDelta {
                item_id,
                call_id,
                delta,
            } => {
                let resolved = call_id
                    .filter(|id| !id.is_empty())
                    .or_else(|| self.item_to_call.get(&item_id).cloned());

                let Some(call_id) = resolved else {
                    // No identity to merge under; nothing to surface.
                    return Ok(Vec::new());
                };
                let Some(call) = self.call_mut(&call_id) else {
                    return Ok(Vec::new());
                };

                call.arguments.push_str(&delta);
                Ok(vec![ModelDelta::ToolCallArgumentsDelta { call_id, delta }])
            }
            StreamEvent::Completed { usage } => {
                self.usage = usage;
                self.phase = Phase::Completed;
                // Every call that started is surfaced here, marker or not.
                Ok(vec![ModelDelta::Completed(self.snapshot())])
            }
            StreamEvent::Error { code, message } => {
                self.phase = Phase::Errored;
                Err(CodexClientError::Protocol {
                    message: message
                        .clone()
                        .or_else(|| code.clone())
                        .unwrap_or_else(|| "unspecified provider error".to_string()),
                    code,
                })
            }
        }
    }

    /// True once the completion event has been absorbed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Final aggregated output (buffered mode, or the stream's last word).
    #[must_use]
    pub fn finish(self) -> ModelOutput {
        self.snapshot()
    }

    fn snapshot(&self) -> ModelOutput {
        ModelOutput {
            role: Role::Assistant,
            content: if self.text.is_empty() {
                None
            } else {
                Some(self.text.clone())
            },
            tool_calls: self
                .calls
                .iter()
                .map(|call| ToolCallRequest {
                    id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                })
                .collect(),
            usage: self.usage,
        }
    }

    fn call_mut(&mut self, call_id: &str) -> Option<&mut PendingCall> {
        self.calls.iter_mut().find(|call| call.call_id == call_id)
    }
}
