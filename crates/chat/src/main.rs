use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tc_chat::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    match cli.command {
        // Default to chat when no subcommand is given.
        None => {
            let (config, _) = tc_chat::cli::load_config()?;
            tc_chat::cli::chat::chat(Arc::new(config), None).await
        }
        Some(Command::Chat { model }) => {
            let (config, _) = tc_chat::cli::load_config()?;
            tc_chat::cli::chat::chat(Arc::new(config), model).await
        }
        Some(Command::Run { message, model, json }) => {
            let (config, _) = tc_chat::cli::load_config()?;
            tc_chat::cli::run::run(Arc::new(config), message, model, json).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = tc_chat::cli::load_config()?;
            if !tc_chat::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = tc_chat::cli::load_config()?;
            tc_chat::cli::config::show(&config)
        }
        Some(Command::Config(ConfigCommand::SetSecret)) => {
            let (config, _) = tc_chat::cli::load_config()?;
            tc_chat::cli::config::set_secret(&config)
        }
        Some(Command::Version) => {
            println!("toolchat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize compact stderr-only tracing.
///
/// Defaults to `warn` so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
