use thiserror::Error;

/// Errors raised while obtaining a completion.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Transport failure, non-success status, or a body that could not be read or parsed.
    #[error("Completion endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Completion endpoint returned HTTP {status_code}: {message}")]
    HttpStatus { status_code: u16, message: String },

    /// The response parsed but carried no choices.
    #[error("Completion response contained no choices")]
    Empty,

    #[error("Refusing to request a completion for an empty message list")]
    EmptyPrompt,
}

impl CompletionError {
    /// `Empty` is handled exactly like an unavailable endpoint by callers;
    /// this only distinguishes transport-level failures for logging.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::HttpStatus { .. })
    }
}

/// Configuration errors. Only raised at process start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Result type for completion operations
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
