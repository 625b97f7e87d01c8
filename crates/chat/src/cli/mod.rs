pub mod chat;
pub mod config;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tc_domain::config::Config;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "TOOLCHAT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "toolchat.toml";

/// toolchat: chat with Claude, with web search, page reading and Python
/// execution as tools.
#[derive(Debug, Parser)]
#[command(name = "toolchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive chat (default when no subcommand is given).
    Chat {
        /// Model override (e.g. "claude-3-haiku-20240307").
        #[arg(long)]
        model: Option<String>,
    },
    /// Send a single message and print the response.
    Run {
        /// The message to send.
        message: String,
        /// Model override.
        #[arg(long)]
        model: Option<String>,
        /// Output the turn's events as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
    /// Store the API key in the OS keychain.
    SetSecret,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `$TOOLCHAT_CONFIG` (or `toolchat.toml`).
/// A missing file means defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
