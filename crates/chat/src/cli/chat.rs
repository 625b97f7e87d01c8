//! `toolchat chat`: interactive REPL command.
//!
//! Opens a readline-based loop that sends each line to the model and prints
//! the turn's output as it arrives. Supports slash-commands for model
//! switching, transcript review and starting over.

use std::sync::Arc;

use anyhow::Context;

use tc_domain::config::Config;
use tc_domain::tool::{Message, Role};
use tc_providers::{resolve_api_key, AnthropicProvider};

use crate::runtime::{run_turn, ConversationSession, Toolbox, TurnEvent, TurnSettings};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(config: Arc<Config>, model: Option<String>) -> anyhow::Result<()> {
    let toolbox = Toolbox::from_config(&config.tools)?;
    let mut settings = TurnSettings::from_config(&config, model.as_deref());

    let credential = match resolve_api_key(&config.llm.auth) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::debug!(error = %e, "no stored API key, will prompt");
            None
        }
    };
    let mut session = ConversationSession::new(credential);
    let mut provider: Option<AnthropicProvider> = None;

    // Initialize rustyline editor with persistent history.
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".toolchat")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    // Welcome banner on stderr (keep stdout clean for output).
    eprintln!("toolchat: Claude with web search, page reading and Python execution");
    eprintln!("Model: {}  |  Type /help for commands, Ctrl+D to exit", settings.model);
    eprintln!();

    loop {
        let readline = rl.readline("you> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                rl.add_history_entry(&line).ok();

                // ── Slash commands ────────────────────────────────
                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &config, &mut settings, &mut session) {
                        break;
                    }
                    continue;
                }

                // ── Credential ──────────────────────────────────
                if session.credential.is_none() {
                    provider = None;
                    match prompt_credential() {
                        Ok(Some(key)) => session.credential = Some(key),
                        Ok(None) => {
                            eprintln!("An API key is required to continue.");
                            continue;
                        }
                        Err(e) => {
                            eprintln!("\x1B[31merror: {e:#}\x1B[0m");
                            continue;
                        }
                    }
                }
                if provider.is_none() {
                    let key = session.credential.clone().unwrap_or_default();
                    provider = Some(AnthropicProvider::new(&config.llm, key)?);
                }
                let Some(active) = provider.as_ref() else {
                    continue;
                };

                // ── User message → turn ──────────────────────────
                send_message(active, &toolbox, &mut session, &settings, trimmed).await;

                if session.credential.is_none() {
                    provider = None;
                    eprintln!("The API key was rejected; you will be asked for a new one.");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();

    eprintln!("Goodbye!");
    Ok(())
}

fn prompt_credential() -> anyhow::Result<Option<String>> {
    let key = rpassword::prompt_password("Enter your Anthropic API key: ")
        .context("reading API key")?;
    let key = key.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
fn handle_slash_command(
    input: &str,
    config: &Config,
    settings: &mut TurnSettings,
    session: &mut ConversationSession,
) -> bool {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, rest)) => (cmd, Some(rest.trim()).filter(|s| !s.is_empty())),
        None => (input, None),
    };

    match cmd {
        "/exit" | "/quit" => return true,

        "/model" => {
            if let Some(name) = arg {
                settings.model = name.to_string();
                eprintln!("Model set to: {name}");
            } else {
                eprintln!("Current model: {}", settings.model);
                eprintln!("Usage: /model <name>");
            }
        }

        "/models" => {
            for name in &config.llm.models {
                let marker = if *name == settings.model { "*" } else { " " };
                eprintln!(" {marker} {name}");
            }
            eprintln!("Any other model name can be set with /model <name>.");
        }

        "/transcript" => {
            if session.transcript.is_empty() {
                eprintln!("(transcript is empty)");
            }
            for message in &session.transcript {
                println!("{}", format_transcript_entry(message));
                println!();
            }
        }

        "/clear" => {
            // ANSI escape: clear screen and move cursor to top-left.
            eprint!("\x1B[2J\x1B[1;1H");
        }

        "/reset" => {
            session.reset();
            eprintln!("Conversation reset.");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /model <name>    Set the model");
            eprintln!("  /models          List preset models");
            eprintln!("  /transcript      Show the conversation so far");
            eprintln!("  /clear           Clear the screen");
            eprintln!("  /reset           Start a fresh conversation");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    false
}

fn format_transcript_entry(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant | Role::Tool => "assistant",
    };
    format!("{who}> {}", message.content.extract_all_text())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message sending + event printing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn and print its events while it runs.
async fn send_message(
    provider: &AnthropicProvider,
    toolbox: &Toolbox,
    session: &mut ConversationSession,
    settings: &TurnSettings,
    user_message: &str,
) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<TurnEvent>();

    let turn = async {
        let tx = tx;
        run_turn(provider, toolbox, session, settings, user_message, &tx).await
    };

    let drain = async {
        while let Some(event) = rx.recv().await {
            match &event {
                TurnEvent::AssistantText { text } | TurnEvent::ToolOutput { text, .. } => {
                    println!("{text}");
                    println!();
                }
                TurnEvent::ToolCallEvent { tool_name, .. } => {
                    eprintln!("\x1B[2m[tool: {tool_name}]\x1B[0m");
                }
                TurnEvent::Error { message, .. } => {
                    eprintln!("\x1B[31mAn error occurred: {message}\x1B[0m");
                }
                TurnEvent::UsageEvent { .. } | TurnEvent::Done { .. } => {}
            }
        }
    };

    // Errors were already printed from the event stream.
    let (_result, ()) = tokio::join!(turn, drain);
}
