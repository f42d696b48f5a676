use crate::Payload;
use crate::model::ping::PingFilter;
use crate::model::publisher::PublisherInfo;
use crate::model::recipient::Recipient;
use crate::traits::subscriber::EventSubscriber;
use std::sync::Arc;

/// The public event API offered to the rest of the application.
pub trait EventService: Send + Sync {
    /// Registers `subscriber` for `event_name` and all of its descendants.
    fn subscribe(&self, event_name: &str, subscriber: Arc<dyn EventSubscriber>);

    /// Removes a registration made with the same `Arc`.
    fn unsubscribe(&self, event_name: &str, subscriber: &Arc<dyn EventSubscriber>);

    /// Checks for subscribers on `event_name`, or on any ancestor when `exact` is false.
    fn has_subscribers(&self, event_name: &str, exact: bool) -> bool;

    /// Delivers an event inside this process only.
    fn fire_local_event(&self, event_name: &str, data: &Payload);

    /// Delivers an event locally and publishes it to other processes.
    ///
    /// Never fails from the caller's point of view; transport problems are logged.
    fn fire_remote_event(&self, event_name: &str, data: &Payload, recipients: &[Recipient]);
}

/// An event service that can bridge to a remote dispatcher.
pub trait LocalDispatcher: EventService {
    /// Attaches (or detaches with `None`) the remote dispatcher.
    fn set_global_event_dispatcher(&self, dispatcher: Option<Arc<dyn RemoteDispatcher>>);

    fn get_global_event_dispatcher(&self) -> Option<Arc<dyn RemoteDispatcher>>;
}

/// Bridges local events to a messaging transport.
pub trait RemoteDispatcher: Send + Sync {
    /// Returns a copy of the identity this process publishes under.
    fn get_publisher_info(&self) -> PublisherInfo;

    /// Starts (or stops) receiving remote events for the channel that carries `event_name`.
    fn subscribe_remote_event(&self, event_name: &str, subscribe: bool) -> anyhow::Result<()>;

    /// Publishes an event to other processes, optionally restricted to `recipients`.
    fn fire_remote_event(&self, event_name: &str, data: &Payload, recipients: &[Recipient]) -> anyhow::Result<()>;

    /// Asks peers matching `filters` to identify themselves by firing `response_event`.
    fn ping(&self, response_event: &str, filters: Vec<PingFilter>, recipients: &[Recipient]) -> anyhow::Result<()>;
}
