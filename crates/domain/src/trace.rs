use serde::Serialize;

/// Structured trace events emitted across the toolchat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        iteration: usize,
        tools_enabled: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolDispatched {
        tool_name: String,
        call_id: String,
        duration_ms: u64,
        context_chars: usize,
    },
    CodeExecutionSkipped {
        session_id: String,
    },
    SandboxFinished {
        outcome: String,
        install_attempted: bool,
        duration_ms: u64,
    },
    CredentialCleared {
        session_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tc_event");
    }
}
