//! Built-in tool backends for toolchat.
//!
//! - `search`: DuckDuckGo HTML results scraper
//! - `fetch`: bounded webpage download and HTML-to-text reduction
//! - `sandbox`: Python execution in a throwaway venv with one-shot
//!   missing-module install

pub mod fetch;
pub mod sandbox;
pub mod search;

pub use fetch::WebFetch;
pub use sandbox::{ExecOutcome, Interpreter, PythonVenv, Sandbox};
pub use search::{SearchResult, WebSearch};
