use crate::Payload;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// Receives events delivered for a topic it subscribed to.
///
/// Subscribers are identified by the `Arc` they were registered with: unsubscribing
/// requires the same `Arc` (pointer identity), not an equal value.
pub trait EventSubscriber<T = Payload>: Send + Sync {
    /// Called once per delivered event.
    ///
    /// # Arguments
    ///
    /// * `event_name` - The name the event was fired under (not the subscribed ancestor).
    /// * `data` - The event payload.
    ///
    /// # Returns
    ///
    /// * `Err` is logged by the dispatcher and never stops delivery to other subscribers.
    fn event_callback(&self, event_name: &str, data: &T) -> anyhow::Result<()>;
}

struct FnSubscriber<F> {
    callback: F,
}

impl<F> EventSubscriber for FnSubscriber<F>
where
    F: Fn(&str, &Payload) -> anyhow::Result<()> + Send + Sync,
{
    fn event_callback(&self, event_name: &str, data: &Payload) -> anyhow::Result<()> {
        (self.callback)(event_name, data)
    }
}

/// Wraps a closure over the raw payload as a subscriber.
pub fn subscriber_fn<F>(callback: F) -> Arc<dyn EventSubscriber>
where
    F: Fn(&str, &Payload) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnSubscriber { callback })
}

struct TypedSubscriber<T, F> {
    callback: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> EventSubscriber for TypedSubscriber<T, F>
where
    T: DeserializeOwned,
    F: Fn(&str, T) -> anyhow::Result<()> + Send + Sync,
{
    fn event_callback(&self, event_name: &str, data: &Payload) -> anyhow::Result<()> {
        let typed = T::deserialize(data)?;
        (self.callback)(event_name, typed)
    }
}

/// Wraps a closure over a typed payload as a subscriber.
///
/// The payload is deserialized into `T` before each call; a payload of the wrong
/// shape surfaces as a callback error.
pub fn typed_subscriber<T, F>(callback: F) -> Arc<dyn EventSubscriber>
where
    T: DeserializeOwned + 'static,
    F: Fn(&str, T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(TypedSubscriber {
        callback,
        _marker: PhantomData,
    })
}
