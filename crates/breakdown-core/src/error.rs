use thiserror::Error;

#[derive(Error, Debug)]
pub enum BreakdownError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type BreakdownResult<T> = Result<T, BreakdownError>;
