//! Conversation runtime: the tool dispatcher, the per-conversation session
//! state, and the turn loop that interleaves model calls with tool calls.
//!
//! Front-ends drive it through [`run_turn`] and render the [`TurnEvent`]s it
//! pushes into an unbounded channel.

pub mod session;
pub mod tools;
pub mod turn;

use serde::Serialize;
use serde_json::Value;

use tc_domain::config::Config;

pub use session::ConversationSession;
pub use tools::{build_tool_definitions, dispatch, ToolBackend, ToolInvocation, ToolOutput, Toolbox};
pub use turn::{run_turn, tools_enabled, TurnSummary};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent: what the front-end renders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn, in the order they happen.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// A text block from the assistant.
    #[serde(rename = "assistant_text")]
    AssistantText { text: String },

    /// The model is invoking a tool.
    #[serde(rename = "tool_call")]
    ToolCallEvent {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// A user-facing rendering of tool activity (also kept in the transcript).
    #[serde(rename = "tool_output")]
    ToolOutput { tool_name: String, text: String },

    /// Token usage for one model call.
    #[serde(rename = "usage")]
    UsageEvent {
        iteration: usize,
        input_tokens: u32,
        output_tokens: u32,
    },

    /// The turn finished normally.
    #[serde(rename = "done")]
    Done {
        iterations: usize,
        tool_calls: usize,
    },

    /// The turn was aborted.
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        credential_cleared: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Model configuration for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub model: String,
    pub max_iterations: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl TurnSettings {
    /// Settings from config, with an optional model override.
    pub fn from_config(config: &Config, model: Option<&str>) -> Self {
        Self {
            model: model
                .map(str::to_string)
                .unwrap_or_else(|| config.llm.default_model.clone()),
            max_iterations: config.conversation.max_iterations,
            max_output_tokens: config.llm.max_output_tokens,
            temperature: config.llm.temperature,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), None)
    }
}
