//! Identity of the originator of an event or message.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const ATTR_PREFIX: &str = "cwf.pub.";
const ATTR_USER_ID: &str = "cwf.pub.userid";
const ATTR_USER_NAME: &str = "cwf.pub.username";
const ATTR_APP_NAME: &str = "cwf.pub.appname";
const ATTR_ENDPOINT_ID: &str = "cwf.pub.endpointid";
const ATTR_NODE_ID: &str = "cwf.pub.nodeid";
const ATTR_PRODUCER_ID: &str = "cwf.pub.producerid";
const ATTR_CONSUMER_ID: &str = "cwf.pub.consumerid";
const ATTR_SESSION_ID: &str = "cwf.pub.sessionid";

/// Describes who published an event.
///
/// Well-known fields live in the same attribute bag as free-form attributes,
/// under reserved keys. Built with the setters before first use; two instances
/// are equal iff their attribute maps are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublisherInfo {
    attributes: HashMap<String, String>,
}

impl PublisherInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Sets a free-form attribute. Keys in the reserved namespace are rejected.
    ///
    /// # Returns
    ///
    /// * `true` if the attribute was stored.
    /// * `false` if the key collides with a well-known field.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if key.starts_with(ATTR_PREFIX) {
            return false;
        }
        self.attributes.insert(key, value.into());
        true
    }

    fn set(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.attributes.insert(key.to_string(), value);
            }
            None => {
                self.attributes.remove(key);
            }
        }
    }

    pub fn get_user_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_USER_ID)
    }

    pub fn set_user_id(&mut self, value: Option<String>) {
        self.set(ATTR_USER_ID, value);
    }

    pub fn get_user_name(&self) -> Option<&str> {
        self.get_attribute(ATTR_USER_NAME)
    }

    pub fn set_user_name(&mut self, value: Option<String>) {
        self.set(ATTR_USER_NAME, value);
    }

    pub fn get_app_name(&self) -> Option<&str> {
        self.get_attribute(ATTR_APP_NAME)
    }

    pub fn set_app_name(&mut self, value: Option<String>) {
        self.set(ATTR_APP_NAME, value);
    }

    pub fn get_endpoint_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_ENDPOINT_ID)
    }

    pub fn set_endpoint_id(&mut self, value: Option<String>) {
        self.set(ATTR_ENDPOINT_ID, value);
    }

    pub fn get_node_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_NODE_ID)
    }

    pub fn set_node_id(&mut self, value: Option<String>) {
        self.set(ATTR_NODE_ID, value);
    }

    pub fn get_producer_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_PRODUCER_ID)
    }

    pub fn set_producer_id(&mut self, value: Option<String>) {
        self.set(ATTR_PRODUCER_ID, value);
    }

    pub fn get_consumer_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_CONSUMER_ID)
    }

    pub fn set_consumer_id(&mut self, value: Option<String>) {
        self.set(ATTR_CONSUMER_ID, value);
    }

    pub fn get_session_id(&self) -> Option<&str> {
        self.get_attribute(ATTR_SESSION_ID)
    }

    pub fn set_session_id(&mut self, value: Option<String>) {
        self.set(ATTR_SESSION_ID, value);
    }
}

impl fmt::Display for PublisherInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} [session={}]",
            self.get_user_name().unwrap_or("anonymous"),
            self.get_app_name().unwrap_or("unknown"),
            self.get_session_id().unwrap_or("none")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_follows_attributes() {
        let mut a = PublisherInfo::new();
        a.set_user_id(Some("42".into()));
        a.set_app_name(Some("cwf".into()));

        let mut b = PublisherInfo::new();
        b.set_app_name(Some("cwf".into()));
        assert_ne!(a, b);

        b.set_user_id(Some("42".into()));
        assert_eq!(a, b);

        a.set_user_id(None);
        assert_eq!(a.get_user_id(), None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_reserved_keys_are_protected() {
        let mut info = PublisherInfo::new();
        assert!(!info.set_attribute("cwf.pub.userid", "spoofed"));
        assert!(info.set_attribute("desk", "3"));
        assert_eq!(info.get_user_id(), None);
        assert_eq!(info.get_attribute("desk"), Some("3"));
    }
}
