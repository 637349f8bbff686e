use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// `status` is set whenever the server produced a response.
    #[error("http error: {detail}")]
    Http { status: Option<u16>, detail: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            return Self::Connection(e.to_string());
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
