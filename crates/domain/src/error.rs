/// Shared error type used across all toolchat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("tool: {0}")]
    Tool(String),

    #[error("sandbox: {0}")]
    Sandbox(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Markers the Anthropic API uses when it rejects a credential.
const CREDENTIAL_MARKERS: &[&str] = &[
    "invalid_api_key",
    "invalid x-api-key",
    "authentication_error",
];

impl Error {
    /// Whether this error means the stored API credential was rejected and
    /// must be re-entered before another request is attempted.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Provider { message, .. } => {
                let lower = message.to_lowercase();
                CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}
