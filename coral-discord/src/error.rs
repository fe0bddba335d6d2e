use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("gateway protocol error: {0}")]
    Gateway(String),

    #[error("interaction is {actual}, operation requires {required}")]
    InvalidState {
        required: &'static str,
        actual: &'static str,
    },
}

impl From<reqwest::Error> for DiscordError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for DiscordError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}
