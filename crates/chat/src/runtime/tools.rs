//! Tool dispatch for the turn loop.
//!
//! The model can call three tools. Each call is parsed into a
//! [`ToolInvocation`], executed against a [`ToolBackend`], and rendered twice:
//! once for the transcript and once for the model's context.

use serde::Deserialize;

use tc_domain::config::ToolsConfig;
use tc_domain::error::{Error, Result};
use tc_domain::tool::{ToolCall, ToolDefinition};
use tc_tools::{Sandbox, SearchResult, WebFetch, WebSearch};

pub const WEB_SEARCH: &str = "web_search";
pub const READ_WEBPAGE: &str = "read_webpage";
pub const EXECUTE_CODE: &str = "execute_code";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The tool schemas offered to the model.
pub fn build_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: WEB_SEARCH.into(),
            description: "Search the web using DuckDuckGo".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to send to DuckDuckGo"
                    },
                    "num_results": {
                        "type": "integer",
                        "description": "Number of results to return (default: 5)",
                        "default": 5
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: READ_WEBPAGE.into(),
            description: "Read and extract text content from a webpage".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL of the webpage to read" }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: EXECUTE_CODE.into(),
            description: "Execute Python code in a local virtual environment sandbox".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "The Python code to execute" }
                },
                "required": ["code"]
            }),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invocations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parsed tool call with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    WebSearch {
        query: String,
        /// `None` means the backend's default.
        num_results: Option<usize>,
    },
    ReadWebpage {
        url: String,
    },
    ExecuteCode {
        code: String,
    },
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<usize>,
}

#[derive(Deserialize)]
struct ReadWebpageArgs {
    url: String,
}

#[derive(Deserialize)]
struct ExecuteCodeArgs {
    code: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(call: &ToolCall) -> Result<T> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| Error::Tool(format!("invalid arguments for {}: {e}", call.tool_name)))
}

impl ToolInvocation {
    pub fn from_call(call: &ToolCall) -> Result<Self> {
        match call.tool_name.as_str() {
            WEB_SEARCH => {
                let args: WebSearchArgs = parse_args(call)?;
                Ok(Self::WebSearch {
                    query: args.query,
                    num_results: args.num_results,
                })
            }
            READ_WEBPAGE => {
                let args: ReadWebpageArgs = parse_args(call)?;
                Ok(Self::ReadWebpage { url: args.url })
            }
            EXECUTE_CODE => {
                let args: ExecuteCodeArgs = parse_args(call)?;
                Ok(Self::ExecuteCode { code: args.code })
            }
            other => Err(Error::Tool(format!("unknown tool: {other}"))),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::WebSearch { .. } => WEB_SEARCH,
            Self::ReadWebpage { .. } => READ_WEBPAGE,
            Self::ExecuteCode { .. } => EXECUTE_CODE,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The side-effecting operations behind the three tools.
#[async_trait::async_trait]
pub trait ToolBackend: Send + Sync {
    async fn web_search(
        &self,
        query: &str,
        num_results: Option<usize>,
    ) -> Result<Vec<SearchResult>>;

    /// Never fails; problems come back as text.
    async fn read_webpage(&self, url: &str) -> String;

    /// Never fails; returns the execution log.
    async fn execute_code(&self, code: &str) -> String;

    /// Characters of page text shown in the transcript.
    fn preview_chars(&self) -> usize {
        500
    }
}

/// Production backend: DuckDuckGo, reqwest and a Python venv.
pub struct Toolbox {
    search: WebSearch,
    fetch: WebFetch,
    sandbox: Sandbox,
}

impl Toolbox {
    pub fn from_config(cfg: &ToolsConfig) -> Result<Self> {
        Ok(Self {
            search: WebSearch::new(cfg.search.clone())?,
            fetch: WebFetch::new(cfg.fetch.clone())?,
            sandbox: Sandbox::new(cfg.sandbox.clone()),
        })
    }
}

#[async_trait::async_trait]
impl ToolBackend for Toolbox {
    async fn web_search(
        &self,
        query: &str,
        num_results: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let n = num_results.unwrap_or_else(|| self.search.default_num_results());
        self.search.search(query, n).await
    }

    async fn read_webpage(&self, url: &str) -> String {
        self.fetch.fetch(url).await
    }

    async fn execute_code(&self, code: &str) -> String {
        self.sandbox.run(code).await
    }

    fn preview_chars(&self) -> usize {
        self.fetch.preview_chars()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch + rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The two renderings of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Transcript entries, in order.
    pub display: Vec<String>,
    /// What the model gets back as the tool result.
    pub context: String,
}

/// Run one invocation. Only search failures surface as errors.
pub async fn dispatch(
    backend: &dyn ToolBackend,
    invocation: &ToolInvocation,
) -> Result<ToolOutput> {
    match invocation {
        ToolInvocation::WebSearch { query, num_results } => {
            let results = backend.web_search(query, *num_results).await?;
            let text = render_search(query, &results);
            Ok(ToolOutput {
                display: vec![text.clone()],
                context: text,
            })
        }
        ToolInvocation::ReadWebpage { url } => {
            let content = backend.read_webpage(url).await;
            Ok(ToolOutput {
                display: vec![render_webpage_preview(url, &content, backend.preview_chars())],
                context: format!("Content from {url}: {content}"),
            })
        }
        ToolInvocation::ExecuteCode { code } => {
            let log = backend.execute_code(code).await;
            let result = render_code_result(&log);
            Ok(ToolOutput {
                display: vec![render_code_block(code), result.clone()],
                context: result,
            })
        }
    }
}

pub fn render_search(query: &str, results: &[SearchResult]) -> String {
    let mut lines = vec!["🔍 **Search Results**".to_string(), format!("Query: {query}")];
    for (idx, result) in results.iter().enumerate() {
        lines.push(format!("{}. **{}**", idx + 1, result.title));
        lines.push(format!("   URL: {}", result.link));
        lines.push(format!("   {}", result.description.as_deref().unwrap_or("")));
    }
    lines.join("\n")
}

pub fn render_webpage_preview(url: &str, content: &str, preview_chars: usize) -> String {
    let preview: String = content.chars().take(preview_chars).collect();
    [
        "📄 **Webpage Content**".to_string(),
        format!("Reading: {url}"),
        "Extracted content:".to_string(),
        format!("{preview}..."),
    ]
    .join("\n")
}

pub fn render_code_block(code: &str) -> String {
    format!("💻 **Code to be Executed:**\n```python\n{code}\n```")
}

pub fn render_code_result(log: &str) -> String {
    format!("💻 **Code Execution Result**\n```\n{log}\n```")
}
