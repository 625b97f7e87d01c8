mod conversation;
mod llm;
mod tools;

pub use conversation::*;
pub use llm::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }

        if self.llm.default_model.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.default_model".into(),
                message: "default_model must not be empty".into(),
            });
        }

        if self.llm.max_output_tokens == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.max_output_tokens".into(),
                message: "max_output_tokens must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.temperature".into(),
                message: "temperature must be between 0.0 and 1.0".into(),
            });
        }

        if self.conversation.max_iterations == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "conversation.max_iterations".into(),
                message: "max_iterations must be greater than 0".into(),
            });
        } else if self.conversation.max_iterations < 3 {
            // Tools are withheld from the last two iterations.
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "conversation.max_iterations".into(),
                message: "fewer than 3 iterations leaves no iteration with tools enabled".into(),
            });
        }

        if self.tools.search.endpoint.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.search.endpoint".into(),
                message: "endpoint must not be empty".into(),
            });
        }

        if self.tools.fetch.max_text_chars == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.fetch.max_text_chars".into(),
                message: "max_text_chars must be greater than 0".into(),
            });
        }

        if self.tools.sandbox.timeout_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "tools.sandbox.timeout_sec".into(),
                message: "0 disables the execution timeout".into(),
            });
        }

        if self.llm.auth.key.is_some() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.auth.key".into(),
                message: "plaintext API key in config; prefer 'env' or the OS keychain".into(),
            });
        }

        errors
    }
}
