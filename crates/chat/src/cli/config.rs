use anyhow::Context;

use tc_domain::config::{Config, ConfigSeverity};

/// Keychain names used when `[llm.auth]` does not set its own.
const DEFAULT_SERVICE: &str = "toolchat";
const DEFAULT_ACCOUNT: &str = "anthropic-api-key";

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when at least one error was found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
///
/// A plaintext `key` is masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.llm.auth.key.is_some() {
        shown.llm.auth.key = Some("********".into());
    }
    let output = toml::to_string_pretty(&shown).context("serializing config")?;
    print!("{output}");
    Ok(())
}

/// Prompt for the API key and store it in the OS keychain.
pub fn set_secret(config: &Config) -> anyhow::Result<()> {
    let auth = &config.llm.auth;
    let service = auth.service.as_deref().unwrap_or(DEFAULT_SERVICE);
    let account = auth.account.as_deref().unwrap_or(DEFAULT_ACCOUNT);

    let key = rpassword::prompt_password(format!("API key for {service}/{account}: "))
        .context("reading API key")?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("received empty API key");
    }

    tc_providers::util::store_in_keychain(service, account, key)?;
    println!("Stored API key in the OS keychain ({service}/{account}).");

    if auth.service.is_none() || auth.account.is_none() {
        println!("Add this to your config so toolchat reads it:");
        println!("\n[llm.auth]\nservice = \"{service}\"\naccount = \"{account}\"");
    }
    Ok(())
}
