use thiserror::Error;

/// Broadcasting client errors
#[derive(Error, Debug)]
pub enum EchoError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Broadcaster {broadcaster} does not support {capability}")]
    Capability {
        broadcaster: String,
        capability: String,
    },
}

impl EchoError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn capability(broadcaster: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Capability {
            broadcaster: broadcaster.into(),
            capability: capability.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_capability(&self) -> bool {
        matches!(self, Self::Capability { .. })
    }
}

impl From<serde_json::Error> for EchoError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(format!("invalid JSON configuration: {}", err))
    }
}

impl From<serde_yaml::Error> for EchoError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::configuration(format!("invalid YAML configuration: {}", err))
    }
}

/// Result type for broadcasting operations
pub type EchoResult<T> = Result<T, EchoError>;
