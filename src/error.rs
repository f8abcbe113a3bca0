use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Payload of {size} bytes exceeds the storage quota")]
    OversizedPayload { size: usize },

    #[error("Cross-origin policy rejected the request: {0}")]
    CorsPolicy(String),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
