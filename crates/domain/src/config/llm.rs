use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider id used in logs and error messages.
    #[serde(default = "d_provider_id")]
    pub id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Model used when the user has not picked one.
    #[serde(default = "d_default_model")]
    pub default_model: String,
    /// Presets offered by `/models`; any other name can still be set.
    #[serde(default = "d_models")]
    pub models: Vec<String>,
    #[serde(default = "d_4096")]
    pub max_output_tokens: u32,
    /// Sampling temperature. 0.0 keeps the loop deterministic.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "d_120000")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            id: d_provider_id(),
            base_url: d_base_url(),
            auth: AuthConfig::default(),
            default_model: d_default_model(),
            models: d_models(),
            max_output_tokens: 4096,
            temperature: 0.0,
            timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default = "d_auth_env")]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or the keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "toolchat").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "anthropic-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env: d_auth_env(),
            key: None,
            service: None,
            account: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_provider_id() -> String {
    "anthropic".into()
}
fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_default_model() -> String {
    "claude-3-5-sonnet-latest".into()
}
fn d_models() -> Vec<String> {
    vec![
        "claude-3-5-sonnet-latest".into(),
        "claude-3-haiku-20240307".into(),
        "claude-3-opus-latest".into(),
        "claude-3-5-haiku-latest".into(),
    ]
}
fn d_4096() -> u32 {
    4096
}
fn d_120000() -> u64 {
    120_000
}
fn d_auth_env() -> Option<String> {
    Some("ANTHROPIC_API_KEY".into())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
