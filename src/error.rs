
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Helper spawn error: {0}")]
    SpawnError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<toml::de::Error> for BridgeError {
    fn from(error: toml::de::Error) -> Self {
        BridgeError::ConfigError(error.to_string())
    }
}

impl From<toml::ser::Error> for BridgeError {
    fn from(error: toml::ser::Error) -> Self {
        BridgeError::SerializationError(error.to_string())
    }
}

impl BridgeError {
    /// Whether a later attempt (the next input event, the next reconnect
    /// tick) may succeed where this one failed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            BridgeError::IoError(_) | BridgeError::ConnectionError(_) | BridgeError::SpawnError(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::ConfigError(_) => "CONFIG_ERROR",
            BridgeError::ConnectionError(_) => "CONNECTION_ERROR",
            BridgeError::SpawnError(_) => "SPAWN_ERROR",
            BridgeError::ProtocolError(_) => "PROTOCOL_ERROR",
            BridgeError::IoError(_) => "IO_ERROR",
            BridgeError::JsonError(_) => "JSON_ERROR",
            BridgeError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
