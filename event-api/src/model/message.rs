//! The envelope for one unit of information crossing a messaging channel.

use crate::Payload;
use crate::model::recipient::Recipient;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Metadata key: identifier of the producing node.
pub const METADATA_NODE_ID: &str = "cwf-node";
/// Metadata key: channel the message was published on.
pub const METADATA_CHANNEL: &str = "cwf-channel";
/// Metadata key: unique id of one publication, used for duplicate suppression.
pub const METADATA_PUBLICATION_ID: &str = "cwf-pubid";
/// Metadata key: publish time in epoch milliseconds.
pub const METADATA_PUBLISHED: &str = "cwf-published";
/// Metadata key: array of intended recipients.
pub const METADATA_RECIPIENTS: &str = "cwf-recipients";

/// A message exchanged between producers and consumers.
///
/// The id and creation time are fixed at construction. Metadata is a mutable
/// side-channel filled in during publication. Two messages are equal iff their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    message_type: String,
    #[serde(default)]
    payload: Payload,
    id: String,
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, Payload>>,
}

impl Message {
    /// Creates a new message with a fresh id.
    ///
    /// # Arguments
    ///
    /// * `message_type` - The logical event name.
    /// * `payload` - The message body (`Payload::Null` for none).
    pub fn new(message_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            id: Uuid::new_v4().to_string(),
            created: Utc::now(),
            metadata: None,
        }
    }

    /// Wraps an event name and its data into a message.
    ///
    /// # Returns
    ///
    /// * `Ok(Message)` whose type is the event name.
    /// * `Err` if the data cannot be represented as a payload.
    pub fn event<T: Serialize>(event_name: &str, data: &T) -> serde_json::Result<Self> {
        Ok(Self::new(event_name, serde_json::to_value(data)?))
    }

    /// Returns the logical type, falling back to the channel when no type was given.
    pub fn get_type(&self) -> &str {
        if self.message_type.is_empty() {
            self.get_channel().unwrap_or("")
        } else {
            &self.message_type
        }
    }

    pub fn get_payload(&self) -> &Payload {
        &self.payload
    }

    /// Deserializes the payload into the shape the caller expects for this type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Payload> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Reads a metadata entry as a typed value. Missing or mistyped entries yield `None`.
    pub fn metadata_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_metadata(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    /// Sets a metadata entry, creating the map on first use.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Payload>) {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    pub fn get_channel(&self) -> Option<&str> {
        self.get_metadata(METADATA_CHANNEL).and_then(Payload::as_str)
    }

    pub fn get_publication_id(&self) -> Option<&str> {
        self.get_metadata(METADATA_PUBLICATION_ID)
            .and_then(Payload::as_str)
    }

    pub fn get_node_id(&self) -> Option<&str> {
        self.get_metadata(METADATA_NODE_ID).and_then(Payload::as_str)
    }

    /// Returns the intended recipients. An empty list means the message is unconstrained.
    pub fn get_recipients(&self) -> Vec<Recipient> {
        self.metadata_as(METADATA_RECIPIENTS).unwrap_or_default()
    }

    /// Encodes the message for a wire transport.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes a message received from a wire transport.
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type: {}; id: {}; created: {}; metadata: ",
            or_none(self.get_type()),
            self.id,
            self.created.to_rfc3339()
        )?;
        match &self.metadata {
            Some(metadata) if !metadata.is_empty() => write!(f, "{:?}", metadata)?,
            _ => write!(f, "none")?,
        }
        if self.payload.is_null() {
            write!(f, "; payload: none")
        } else {
            write!(f, "; payload: {}", self.payload)
        }
    }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "none" } else { value }
}
