//! Recipient filters used to constrain global delivery.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of target a recipient value identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecipientType {
    Other,
    Application,
    User,
    Session,
    Consumer,
}

impl RecipientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::Other => "OTHER",
            RecipientType::Application => "APPLICATION",
            RecipientType::User => "USER",
            RecipientType::Session => "SESSION",
            RecipientType::Consumer => "CONSUMER",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OTHER" => Ok(RecipientType::Other),
            "APPLICATION" => Ok(RecipientType::Application),
            "USER" => Ok(RecipientType::User),
            "SESSION" => Ok(RecipientType::Session),
            "CONSUMER" => Ok(RecipientType::Consumer),
            other => Err(ModelError::UnknownRecipientType(other.to_string())),
        }
    }
}

/// A (type, value) pair naming one intended target of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "type")]
    recipient_type: RecipientType,
    value: String,
}

impl Recipient {
    pub fn new(recipient_type: RecipientType, value: impl Into<String>) -> Self {
        Self {
            recipient_type,
            value: value.into(),
        }
    }

    pub fn get_type(&self) -> RecipientType {
        self.recipient_type
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.recipient_type, self.value)
    }
}

/// Parses the `TYPE:value` form, e.g. `user:1234`.
impl FromStr for Recipient {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (recipient_type, value) = s
            .split_once(':')
            .ok_or_else(|| ModelError::MalformedRecipient(s.to_string()))?;
        Ok(Recipient::new(recipient_type.parse()?, value.trim()))
    }
}

/// Returns true if `recipients` rules out the target identified by `value`.
///
/// A list with no recipient of `recipient_type` is unconstrained for that type.
/// Otherwise the target is excluded unless one recipient of that type carries
/// exactly `value`. A target without a value cannot match a constraint.
pub fn is_excluded(recipients: &[Recipient], recipient_type: RecipientType, value: Option<&str>) -> bool {
    let mut constrained = false;

    for recipient in recipients.iter().filter(|r| r.recipient_type == recipient_type) {
        if Some(recipient.value.as_str()) == value {
            return false;
        }
        constrained = true;
    }

    constrained
}
