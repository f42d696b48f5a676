use thiserror::Error;

/// Errors raised while building or parsing the shared value types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The recipient type name is not one of the known kinds.
    #[error("Unknown recipient type: {0}")]
    UnknownRecipientType(String),

    /// A recipient expression was not of the form `TYPE:value`.
    #[error("Malformed recipient '{0}', expected TYPE:value")]
    MalformedRecipient(String),

    /// The ping filter type name is not one of the known kinds.
    #[error("Unknown ping filter type: {0}")]
    UnknownPingFilterType(String),
}
