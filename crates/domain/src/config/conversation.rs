use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Hard cap on model calls per user turn.
    #[serde(default = "d_5")]
    pub max_iterations: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { max_iterations: 5 }
    }
}

fn d_5() -> usize {
    5
}
