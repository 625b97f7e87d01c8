//! Turn execution loop: call the model, run the tools it asks for, feed the
//! results back, and repeat until it stops asking or the iteration cap hits.
//!
//! The turn works on a copy of the session context. The copy replaces the
//! session context only when the turn succeeds, so a failed turn leaves the
//! model's view exactly as it was after the user's message.

use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use tc_domain::error::Result;
use tc_domain::tool::{ContentPart, ContentUnit, Message, ToolCall, Usage};
use tc_domain::trace::TraceEvent;
use tc_providers::{ChatRequest, LlmProvider};

use super::session::ConversationSession;
use super::tools::{build_tool_definitions, dispatch, ToolBackend, ToolInvocation, ToolOutput};
use super::{TurnEvent, TurnSettings};

/// Reported instead of running the same code twice in a row.
pub const ALREADY_EXECUTED: &str = "The specified code has already been executed.";

/// Outcome of a successful turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSummary {
    /// Model calls made.
    pub iterations: usize,
    pub tool_calls: usize,
    pub usage: Usage,
    /// The last model call still asked for tools.
    pub hit_iteration_cap: bool,
}

/// Whether the tool schema is sent on `iteration` (1-based).
///
/// The last two iterations go without tools so the model has to answer.
pub fn tools_enabled(iteration: usize, max_iterations: usize) -> bool {
    iteration < max_iterations.saturating_sub(1)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn: the core orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one user turn against `session`.
///
/// Events are pushed to `events` as they happen. On error the error is also
/// emitted as [`TurnEvent::Error`]; a rejected credential is cleared from the
/// session so the front-end asks for a new one.
pub async fn run_turn(
    provider: &dyn LlmProvider,
    tools: &dyn ToolBackend,
    session: &mut ConversationSession,
    settings: &TurnSettings,
    user_text: &str,
    events: &UnboundedSender<TurnEvent>,
) -> Result<TurnSummary> {
    let span = tracing::info_span!("turn", session_id = %session.id, model = %settings.model);

    async move {
        session.context.push(Message::user(user_text));
        session.transcript.push(Message::user(user_text));

        let mut working = session.context.clone();
        match run_loop(provider, tools, session, &mut working, settings, events).await {
            Ok(summary) => {
                session.context = working;
                let _ = events.send(TurnEvent::Done {
                    iterations: summary.iterations,
                    tool_calls: summary.tool_calls,
                });
                tracing::debug!(
                    iterations = summary.iterations,
                    tool_calls = summary.tool_calls,
                    "turn finished"
                );
                Ok(summary)
            }
            Err(e) => {
                let credential_cleared = e.is_credential_error() && session.clear_credential();
                tracing::warn!(error = %e, credential_cleared, "turn aborted");
                let _ = events.send(TurnEvent::Error {
                    message: e.to_string(),
                    credential_cleared,
                });
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn run_loop(
    provider: &dyn LlmProvider,
    tools: &dyn ToolBackend,
    session: &mut ConversationSession,
    working: &mut Vec<Message>,
    settings: &TurnSettings,
    events: &UnboundedSender<TurnEvent>,
) -> Result<TurnSummary> {
    let tool_defs = build_tool_definitions();
    let mut summary = TurnSummary::default();

    for iteration in 1..=settings.max_iterations {
        let with_tools = tools_enabled(iteration, settings.max_iterations);
        let req = ChatRequest {
            messages: working.clone(),
            tools: if with_tools { tool_defs.clone() } else { Vec::new() },
            temperature: Some(settings.temperature),
            max_tokens: Some(settings.max_output_tokens),
            model: Some(settings.model.clone()),
        };

        let start = Instant::now();
        let resp = provider
            .chat(req)
            .instrument(tracing::info_span!("llm.call", iteration, tools_enabled = with_tools))
            .await?;
        summary.iterations = iteration;

        TraceEvent::LlmRequest {
            provider: provider.provider_id().to_string(),
            model: resp.model.clone(),
            iteration,
            tools_enabled: with_tools,
            duration_ms: start.elapsed().as_millis() as u64,
            prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        if let Some(ref usage) = resp.usage {
            summary.usage.add(usage);
            let _ = events.send(TurnEvent::UsageEvent {
                iteration,
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }

        let asked_for_tools = resp.has_tool_calls();
        tracing::debug!(iteration, tool_calls = resp.tool_calls().count(), "model responded");

        let mut assistant_parts = Vec::new();
        let mut tool_results = Vec::new();

        for unit in resp.content {
            match unit {
                ContentUnit::Text { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    assistant_parts.push(ContentPart::text(text.clone()));
                    session.transcript.push(Message::assistant(text.clone()));
                    let _ = events.send(TurnEvent::AssistantText { text });
                }
                ContentUnit::ToolUse(call) => {
                    summary.tool_calls += 1;
                    assistant_parts.push(ContentPart::tool_use(&call));
                    let _ = events.send(TurnEvent::ToolCallEvent {
                        call_id: call.call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                    });

                    let output = run_tool(tools, session, &call).await?;
                    for text in output.display {
                        session.transcript.push(Message::assistant(text.clone()));
                        let _ = events.send(TurnEvent::ToolOutput {
                            tool_name: call.tool_name.clone(),
                            text,
                        });
                    }
                    tool_results.push(ContentPart::tool_result(call.call_id, output.context));
                }
            }
        }

        if !assistant_parts.is_empty() {
            working.push(Message::assistant_parts(assistant_parts));
        }
        if !tool_results.is_empty() {
            working.push(Message::tool_results(tool_results));
        }

        if !asked_for_tools {
            return Ok(summary);
        }
        summary.hit_iteration_cap = iteration == settings.max_iterations;
    }

    if summary.hit_iteration_cap {
        tracing::warn!(
            max_iterations = settings.max_iterations,
            "iteration cap reached with tool calls pending"
        );
    }
    Ok(summary)
}

/// Parse and run one tool call, applying the repeated-code guard.
async fn run_tool(
    tools: &dyn ToolBackend,
    session: &mut ConversationSession,
    call: &ToolCall,
) -> Result<ToolOutput> {
    let invocation = ToolInvocation::from_call(call)?;

    if let ToolInvocation::ExecuteCode { ref code } = invocation {
        if session.last_executed_code.as_deref() == Some(code.as_str()) {
            TraceEvent::CodeExecutionSkipped {
                session_id: session.id.clone(),
            }
            .emit();
            return Ok(ToolOutput {
                display: vec![ALREADY_EXECUTED.to_string()],
                context: ALREADY_EXECUTED.to_string(),
            });
        }
    }

    let start = Instant::now();
    let output = dispatch(tools, &invocation)
        .instrument(tracing::info_span!(
            "tool.call",
            tool = invocation.tool_name(),
            call_id = %call.call_id
        ))
        .await?;

    TraceEvent::ToolDispatched {
        tool_name: invocation.tool_name().to_string(),
        call_id: call.call_id.clone(),
        duration_ms: start.elapsed().as_millis() as u64,
        context_chars: output.context.chars().count(),
    }
    .emit();

    if let ToolInvocation::ExecuteCode { code } = invocation {
        session.last_executed_code = Some(code);
    }
    Ok(output)
}
