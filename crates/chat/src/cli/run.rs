//! `toolchat run`: one-shot execution command.
//!
//! Sends a single message, prints what the turn produces, and exits.
//! Useful for scripting and piping.

use std::sync::Arc;

use anyhow::Context;

use tc_domain::config::Config;
use tc_providers::{resolve_api_key, AnthropicProvider};

use crate::runtime::{run_turn, ConversationSession, Toolbox, TurnEvent, TurnSettings};

/// Execute a single turn and print the response.
pub async fn run(
    config: Arc<Config>,
    message: String,
    model: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let key = resolve_api_key(&config.llm.auth).context(
        "an API key is required; set ANTHROPIC_API_KEY or run `toolchat config set-secret`",
    )?;
    let provider = AnthropicProvider::new(&config.llm, key.clone())?;
    let toolbox = Toolbox::from_config(&config.tools)?;
    let settings = TurnSettings::from_config(&config, model.as_deref());
    let mut session = one_shot_session(key);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<TurnEvent>();

    let turn = async {
        let tx = tx;
        run_turn(&provider, &toolbox, &mut session, &settings, &message, &tx).await
    };

    let drain = async {
        let mut collected: Vec<TurnEvent> = Vec::new();
        while let Some(event) = rx.recv().await {
            if json_output {
                collected.push(event);
            } else {
                print_event(&event);
            }
        }
        collected
    };

    let (result, collected) = tokio::join!(turn, drain);

    if json_output {
        let json = serde_json::to_string_pretty(&collected).context("serializing events")?;
        println!("{json}");
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// The session holds the resolved key so a rejection is reported as cleared.
fn one_shot_session(key: String) -> ConversationSession {
    ConversationSession::new(Some(key))
}

fn print_event(event: &TurnEvent) {
    match event {
        TurnEvent::AssistantText { text } | TurnEvent::ToolOutput { text, .. } => {
            println!("{text}");
            println!();
        }
        TurnEvent::ToolCallEvent { tool_name, .. } => {
            // Dim output to stderr so it doesn't pollute stdout.
            eprintln!("\x1b[2m[tool: {tool_name}]\x1b[0m");
        }
        TurnEvent::Error { message, .. } => {
            eprintln!("error: {message}");
        }
        TurnEvent::UsageEvent { .. } | TurnEvent::Done { .. } => {}
    }
}
