//! Discovery request/response types.

use crate::error::ModelError;
use crate::model::recipient::Recipient;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a ping filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PingFilterType {
    /// Passes iff the responder's application name equals the value.
    AppName,
    /// Passes iff the responder has a local subscriber to the named event.
    SentinelEvent,
}

impl FromStr for PingFilterType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APP_NAME" => Ok(PingFilterType::AppName),
            "SENTINEL_EVENT" => Ok(PingFilterType::SentinelEvent),
            other => Err(ModelError::UnknownPingFilterType(other.to_string())),
        }
    }
}

/// A predicate a ping responder evaluates before replying.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PingFilter {
    #[serde(rename = "type")]
    filter_type: PingFilterType,
    value: String,
}

impl PingFilter {
    pub fn new(filter_type: PingFilterType, value: impl Into<String>) -> Self {
        Self {
            filter_type,
            value: value.into(),
        }
    }

    pub fn app_name(value: impl Into<String>) -> Self {
        Self::new(PingFilterType::AppName, value)
    }

    pub fn sentinel_event(value: impl Into<String>) -> Self {
        Self::new(PingFilterType::SentinelEvent, value)
    }

    pub fn get_type(&self) -> PingFilterType {
        self.filter_type
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

/// The payload of a `PING.REQUEST` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    response_event: String,
    #[serde(default)]
    filters: Vec<PingFilter>,
    requestor: Recipient,
}

impl PingRequest {
    /// Creates a new ping request.
    ///
    /// # Arguments
    ///
    /// * `response_event` - The event responders fire back.
    /// * `filters` - Conditions every responder must satisfy (logical AND).
    /// * `requestor` - The recipient the responses are addressed to.
    pub fn new(response_event: impl Into<String>, filters: Vec<PingFilter>, requestor: Recipient) -> Self {
        Self {
            response_event: response_event.into(),
            filters,
            requestor,
        }
    }

    pub fn get_response_event(&self) -> &str {
        &self.response_event
    }

    pub fn get_filters(&self) -> &[PingFilter] {
        &self.filters
    }

    pub fn get_requestor(&self) -> &Recipient {
        &self.requestor
    }
}
