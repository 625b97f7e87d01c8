use serde::{Deserialize, Serialize};

/// Desktop browser UA; the DuckDuckGo HTML endpoint rejects default agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools (search / fetch / sandbox)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the three built-in tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// HTML results endpoint; the query is sent as `q`.
    #[serde(default = "d_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    #[serde(default = "d_20")]
    pub timeout_secs: u64,
    #[serde(default = "d_5")]
    pub default_num_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: d_search_endpoint(),
            user_agent: d_user_agent(),
            timeout_secs: 20,
            default_num_results: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    #[serde(default = "d_20")]
    pub timeout_secs: u64,
    /// Hard cap on the downloaded body.
    #[serde(default = "d_5mib")]
    pub max_bytes: usize,
    /// Cap on the extracted text handed to the model.
    #[serde(default = "d_300000")]
    pub max_text_chars: usize,
    /// Characters of extracted text shown in the transcript.
    #[serde(default = "d_500")]
    pub preview_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: d_user_agent(),
            timeout_secs: 20,
            max_bytes: 5 * 1024 * 1024,
            max_text_chars: 300_000,
            preview_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter used to create each throwaway virtual environment.
    #[serde(default = "d_python")]
    pub python: String,
    /// Hard timeout for one script run (seconds, 0 = none).
    #[serde(default = "d_120")]
    pub timeout_sec: u64,
    /// Hard timeout for venv creation and `pip install` (seconds, 0 = none).
    #[serde(default = "d_300")]
    pub install_timeout_sec: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: d_python(),
            timeout_sec: 120,
            install_timeout_sec: 300,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn d_user_agent() -> String {
    BROWSER_USER_AGENT.into()
}
fn d_python() -> String {
    "python3".into()
}
fn d_5() -> usize {
    5
}
fn d_20() -> u64 {
    20
}
fn d_120() -> u64 {
    120
}
fn d_300() -> u64 {
    300
}
fn d_500() -> usize {
    500
}
fn d_300000() -> usize {
    300_000
}
fn d_5mib() -> usize {
    5 * 1024 * 1024
}
