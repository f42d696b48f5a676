//! Thread-safe registry of topic subscriptions with hierarchical lookup.
//!
//! Topics are dot-delimited (`ORDER.CREATED.STAT`). An event fired on a topic is
//! delivered to the subscribers of the topic itself and of every ancestor obtained
//! by stripping the last segment, most specific first.

use events::EventSubscriber;
use log::{debug, error, trace};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Subscribers<T> = Vec<Arc<dyn EventSubscriber<T>>>;

/// Maps topic names to their ordered subscriber lists.
///
/// A topic key exists iff its list is non-empty. Delivery iterates over snapshots,
/// so callbacks may subscribe or unsubscribe without deadlocking.
pub struct EventSubscriptions<T: 'static = events::Payload> {
    subscriptions: Mutex<HashMap<String, Subscribers<T>>>,
}

impl<T: 'static> Default for EventSubscriptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventSubscriptions<T> {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Subscribers<T>>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a subscriber to a topic.
    ///
    /// The same subscriber may be added more than once; it is then called once per entry.
    ///
    /// # Returns
    ///
    /// The number of subscribers on the topic after the addition.
    pub fn add_subscriber(&self, event_name: &str, subscriber: Arc<dyn EventSubscriber<T>>) -> usize {
        let mut subscriptions = self.lock();
        let subscribers = subscriptions.entry(event_name.to_string()).or_default();
        subscribers.push(subscriber);
        debug!("Subscribed to '{}' ({} subscribers)", event_name, subscribers.len());
        subscribers.len()
    }

    /// Removes one registration of `subscriber` (matched by pointer) from a topic.
    ///
    /// # Returns
    ///
    /// * `Some(count)` with the remaining number of subscribers; the topic is dropped at zero.
    /// * `None` if the topic had no subscriber list at all.
    pub fn remove_subscriber(&self, event_name: &str, subscriber: &Arc<dyn EventSubscriber<T>>) -> Option<usize> {
        let mut subscriptions = self.lock();
        let subscribers = subscriptions.get_mut(event_name)?;

        if let Some(index) = subscribers.iter().position(|s| same_instance(s, subscriber)) {
            subscribers.remove(index);
        }

        let remaining = subscribers.len();
        if remaining == 0 {
            subscriptions.remove(event_name);
        }
        debug!("Unsubscribed from '{}' ({} subscribers)", event_name, remaining);
        Some(remaining)
    }

    /// Checks for subscribers on a topic.
    ///
    /// # Arguments
    ///
    /// * `event_name` - The topic to check.
    /// * `exact` - When false, ancestor topics are checked as well.
    pub fn has_subscribers(&self, event_name: &str, exact: bool) -> bool {
        let subscriptions = self.lock();
        let mut name = event_name;

        while !name.is_empty() {
            if subscriptions.contains_key(name) {
                return true;
            }
            if exact {
                return false;
            }
            name = strip_level(name);
        }

        false
    }

    /// Returns a snapshot of a topic's subscribers, or `None` if it has none.
    pub fn get_subscribers(&self, event_name: &str) -> Option<Subscribers<T>> {
        self.lock().get(event_name).cloned()
    }

    /// Returns a snapshot of every topic that currently has subscribers.
    pub fn get_events(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Delivers `data` to the subscribers of `event_name` and of each ancestor topic.
    ///
    /// A failing or panicking subscriber is logged and skipped.
    pub fn invoke_callbacks(&self, event_name: &str, data: &T) {
        let mut name = event_name;

        while !name.is_empty() {
            if let Some(subscribers) = self.get_subscribers(name) {
                for subscriber in subscribers {
                    trace!("Firing local event '{}' on level '{}'", event_name, name);
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        subscriber.event_callback(event_name, data)
                    }));

                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Error during local event callback for '{}': {:#}", event_name, e),
                        Err(_) => error!("Subscriber panicked during local event callback for '{}'", event_name),
                    }
                }
            }
            name = strip_level(name);
        }
    }
}

/// Returns the parent topic of `event_name`, or `""` at the top of the hierarchy.
///
/// `A.B.C` yields `A.B`, `A.B` yields `A`, and `A` yields `""`. A leading separator
/// (`.A`) is not a level boundary and also yields `""`.
///
/// Any separator after the first character is a boundary, so a single-character root
/// still strips: `A.B` reaches subscribers of `A`.
pub fn strip_level(event_name: &str) -> &str {
    match event_name.rfind('.') {
        Some(i) if i > 0 => &event_name[..i],
        _ => "",
    }
}

/// Compares two handles by the address of the shared allocation.
pub(crate) fn same_instance<S: ?Sized>(a: &Arc<S>, b: &Arc<S>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::{Payload, subscriber_fn};
    use serde_json::json;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Arc<dyn EventSubscriber> {
        let log = log.clone();
        let tag = tag.to_string();
        subscriber_fn(move |event_name, _| {
            log.lock().unwrap().push(format!("{}<-{}", tag, event_name));
            Ok(())
        })
    }

    #[test]
    fn test_strip_level() {
        assert_eq!(strip_level("A.B.C"), "A.B");
        assert_eq!(strip_level("A.B"), "A");
        assert_eq!(strip_level("A"), "");
        assert_eq!(strip_level("AB"), "");
        assert_eq!(strip_level(".A"), "");
        assert_eq!(strip_level("A."), "A");
    }

    #[test]
    fn test_counts() {
        let subscriptions = EventSubscriptions::<Payload>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");

        assert_eq!(subscriptions.remove_subscriber("A", &first), None);
        assert_eq!(subscriptions.add_subscriber("A", first.clone()), 1);
        assert_eq!(subscriptions.add_subscriber("A", second.clone()), 2);
        assert_eq!(subscriptions.remove_subscriber("A", &first), Some(1));
        assert_eq!(subscriptions.remove_subscriber("A", &second), Some(0));
        assert!(!subscriptions.has_subscribers("A", true));
        assert!(subscriptions.get_events().is_empty());
        assert_eq!(subscriptions.remove_subscriber("A", &second), None);
    }

    #[test]
    fn test_removing_unknown_subscriber_keeps_list() {
        let subscriptions = EventSubscriptions::<Payload>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let known = recorder(&log, "known");
        let stranger = recorder(&log, "stranger");

        subscriptions.add_subscriber("A", known);
        assert_eq!(subscriptions.remove_subscriber("A", &stranger), Some(1));
        assert!(subscriptions.has_subscribers("A", true));
    }

    #[test]
    fn test_hierarchical_lookup() {
        let subscriptions = EventSubscriptions::<Payload>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subscriptions.add_subscriber("A", recorder(&log, "a"));

        assert!(subscriptions.has_subscribers("A", true));
        assert!(!subscriptions.has_subscribers("A.B", true));
        assert!(subscriptions.has_subscribers("A.B", false));
        assert!(subscriptions.has_subscribers("A.B.C", false));
        assert!(!subscriptions.has_subscribers("B.A", false));
        assert!(!subscriptions.has_subscribers("", false));
    }

    #[test]
    fn test_delivery_order_is_most_specific_first() {
        let subscriptions = EventSubscriptions::<Payload>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subscriptions.add_subscriber("A", recorder(&log, "a1"));
        subscriptions.add_subscriber("A.B", recorder(&log, "ab"));
        subscriptions.add_subscriber("A", recorder(&log, "a2"));
        subscriptions.add_subscriber("A.B.C.D", recorder(&log, "abcd"));

        subscriptions.invoke_callbacks("A.B.C", &json!(null));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["ab<-A.B.C", "a1<-A.B.C", "a2<-A.B.C"]
        );
    }

    #[test]
    fn test_failing_subscribers_are_isolated() {
        let subscriptions = EventSubscriptions::<Payload>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        subscriptions.add_subscriber("A.B", subscriber_fn(|_, _| anyhow::bail!("boom")));
        subscriptions.add_subscriber("A.B", subscriber_fn(|_, _| panic!("kaboom")));
        subscriptions.add_subscriber("A.B", recorder(&log, "ab"));
        subscriptions.add_subscriber("A", recorder(&log, "a"));

        subscriptions.invoke_callbacks("A.B", &json!(1));

        assert_eq!(*log.lock().unwrap(), vec!["ab<-A.B", "a<-A.B"]);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let subscriptions = Arc::new(EventSubscriptions::<Payload>::new());
        let slot: Arc<Mutex<Option<Arc<dyn EventSubscriber>>>> = Arc::new(Mutex::new(None));

        let registry = subscriptions.clone();
        let me = slot.clone();
        let once = subscriber_fn(move |event_name, _| {
            if let Some(this) = me.lock().unwrap().as_ref() {
                registry.remove_subscriber(event_name, this);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(once.clone());

        subscriptions.add_subscriber("A", once);
        subscriptions.invoke_callbacks("A", &json!(null));
        assert!(!subscriptions.has_subscribers("A", true));
    }
}
