pub mod anthropic;
pub mod traits;
pub mod util;

// Re-exports for convenience.
pub use anthropic::AnthropicProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
pub use util::resolve_api_key;
