//! Responder side of the ping discovery protocol.
//!
//! A requester fires a `PingRequest` on `PING.REQUEST`. Every process whose
//! handler accepts all of the request's filters answers by firing the requested
//! response event, carrying its publisher info, addressed to the requestor only.

use events::{
    EventService, EventSubscriber, Payload, PingFilter, PingFilterType, PingRequest, PublisherInfo,
};
use log::debug;
use std::sync::{Arc, Weak};

/// Well-known topic carrying ping requests.
pub const EVENT_PING_REQUEST: &str = "PING.REQUEST";

/// Answers ping requests on behalf of one process.
pub struct PingEventHandler {
    event_manager: Arc<dyn EventService>,
    publisher_info: PublisherInfo,
    weak_self: Weak<PingEventHandler>,
}

impl PingEventHandler {
    /// Creates a handler answering with `publisher_info`.
    ///
    /// The handler is inert until `init` subscribes it.
    pub fn new(event_manager: Arc<dyn EventService>, publisher_info: PublisherInfo) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            event_manager,
            publisher_info,
            weak_self: weak_self.clone(),
        })
    }

    fn as_subscriber(&self) -> Option<Arc<dyn EventSubscriber>> {
        self.weak_self
            .upgrade()
            .map(|handler| handler as Arc<dyn EventSubscriber>)
    }

    /// Starts listening for ping requests.
    pub fn init(&self) {
        if let Some(subscriber) = self.as_subscriber() {
            self.event_manager.subscribe(EVENT_PING_REQUEST, subscriber);
        }
    }

    /// Stops listening for ping requests.
    pub fn destroy(&self) {
        if let Some(subscriber) = self.as_subscriber() {
            self.event_manager.unsubscribe(EVENT_PING_REQUEST, &subscriber);
        }
    }

    /// Returns true if every filter holds for this process. No filters always pass.
    pub fn accepts(&self, filters: &[PingFilter]) -> bool {
        filters.iter().all(|filter| self.passes(filter))
    }

    fn passes(&self, filter: &PingFilter) -> bool {
        match filter.get_type() {
            PingFilterType::AppName => self.publisher_info.get_app_name() == Some(filter.get_value()),
            PingFilterType::SentinelEvent => self.event_manager.has_subscribers(filter.get_value(), true),
        }
    }
}

impl EventSubscriber for PingEventHandler {
    fn event_callback(&self, _event_name: &str, data: &Payload) -> anyhow::Result<()> {
        let request: PingRequest = serde_json::from_value(data.clone())?;

        if !self.accepts(request.get_filters()) {
            debug!("Ping for '{}' filtered out", request.get_response_event());
            return Ok(());
        }

        let response = serde_json::to_value(&self.publisher_info)?;
        self.event_manager.fire_remote_event(
            request.get_response_event(),
            &response,
            std::slice::from_ref(request.get_requestor()),
        );
        Ok(())
    }
}
