use thiserror::Error;

/// Global error type for the event core.
#[derive(Error, Debug)]
pub enum EventError {
    /// Producers were registered but none accepted the message.
    #[error("No producer accepted the message on channel {0}")]
    PublishRejected(String),

    /// A payload could not be converted to or from its typed form.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Layered configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An elapsed-time expression such as "10 seconds" could not be parsed.
    #[error("Invalid elapsed time expression '{0}'")]
    InvalidElapsed(String),

    /// A recipient or filter expression was malformed.
    #[error(transparent)]
    Model(#[from] events::ModelError),

    /// The operation needs a global event dispatcher and none is attached.
    #[error("No global event dispatcher is attached")]
    DispatcherDetached,

    /// Global logger configuration error.
    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// A specialized Result type for event core operations.
pub type Result<T> = std::result::Result<T, EventError>;
