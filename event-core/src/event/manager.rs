//! Manages local event subscriptions and local and remote event delivery.

use crate::event::subscriptions::EventSubscriptions;
use events::{EventService, EventSubscriber, LocalDispatcher, Payload, Recipient, RemoteDispatcher};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// The per-process event facade.
///
/// Local delivery always works; when a remote dispatcher is attached, the first
/// subscriber on a topic subscribes the matching transport channel and the last
/// one unsubscribes it. Dispatcher failures are logged and never reach the caller,
/// and local bookkeeping is not rolled back when the transport side fails.
pub struct EventManager {
    subscriptions: EventSubscriptions<Payload>,
    global_event_dispatcher: RwLock<Option<Arc<dyn RemoteDispatcher>>>,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            subscriptions: EventSubscriptions::new(),
            global_event_dispatcher: RwLock::new(None),
        }
    }

    /// Drops every subscription. Used at container teardown.
    pub fn destroy(&self) {
        self.subscriptions.clear();
    }

    /// Returns the topics that currently have local subscribers.
    pub fn get_events(&self) -> Vec<String> {
        self.subscriptions.get_events()
    }

    /// Re-announces every subscribed topic to the attached dispatcher.
    pub fn host_synch(&self) {
        for event_name in self.subscriptions.get_events() {
            self.host_subscribe(&event_name, true);
        }
    }

    fn dispatcher(&self) -> Option<Arc<dyn RemoteDispatcher>> {
        self.global_event_dispatcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn host_subscribe(&self, event_name: &str, subscribe: bool) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };
        let action = if subscribe { "subscribing to" } else { "unsubscribing from" };

        match panic::catch_unwind(AssertUnwindSafe(|| dispatcher.subscribe_remote_event(event_name, subscribe))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error {} remote event '{}': {:#}", action, event_name, e),
            Err(_) => error!("Dispatcher panicked {} remote event '{}'", action, event_name),
        }
    }
}

impl EventService for EventManager {
    fn subscribe(&self, event_name: &str, subscriber: Arc<dyn EventSubscriber>) {
        if self.subscriptions.add_subscriber(event_name, subscriber) == 1 {
            self.host_subscribe(event_name, true);
        }
    }

    fn unsubscribe(&self, event_name: &str, subscriber: &Arc<dyn EventSubscriber>) {
        if self.subscriptions.remove_subscriber(event_name, subscriber) == Some(0) {
            self.host_subscribe(event_name, false);
        }
    }

    fn has_subscribers(&self, event_name: &str, exact: bool) -> bool {
        self.subscriptions.has_subscribers(event_name, exact)
    }

    fn fire_local_event(&self, event_name: &str, data: &Payload) {
        debug!("Firing local event '{}'", event_name);
        self.subscriptions.invoke_callbacks(event_name, data);
    }

    fn fire_remote_event(&self, event_name: &str, data: &Payload, recipients: &[Recipient]) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| dispatcher.fire_remote_event(event_name, data, recipients))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error during remote dispatch of '{}': {:#}", event_name, e),
            Err(_) => error!("Dispatcher panicked during remote dispatch of '{}'", event_name),
        }
    }
}

impl LocalDispatcher for EventManager {
    fn set_global_event_dispatcher(&self, dispatcher: Option<Arc<dyn RemoteDispatcher>>) {
        *self
            .global_event_dispatcher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dispatcher;
        self.host_synch();
    }

    fn get_global_event_dispatcher(&self) -> Option<Arc<dyn RemoteDispatcher>> {
        self.dispatcher()
    }
}
