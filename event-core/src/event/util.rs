//! Naming conventions and convenience calls shared by event collaborators.

use crate::error::{EventError, Result};
use events::{EventService, LocalDispatcher, Payload, PingFilter, Recipient};
use log::error;

/// Prefix of every transport channel carrying events.
pub const CHANNEL_PREFIX: &str = "cwf-event-";

/// Local topic used to broadcast status text.
pub const STATUS_EVENT: &str = "STATUS";

/// Maps an event name to the transport channel that carries it.
///
/// Only the first dot-delimited segment is significant: `ORDER.CREATED` and
/// `ORDER.DELETED` share the channel `cwf-event-ORDER`.
pub fn channel_name(event_name: &str) -> String {
    let root = event_name.split('.').next().unwrap_or(event_name);
    format!("{}{}", CHANNEL_PREFIX, root)
}

/// Recovers the event root from a channel name; other names are returned unchanged.
pub fn event_name(channel_name: &str) -> &str {
    match channel_name.find(CHANNEL_PREFIX) {
        Some(i) => &channel_name[i + CHANNEL_PREFIX.len()..],
        None => channel_name,
    }
}

/// Fires the local status event with `text` (empty when `None`).
pub fn status(events: &dyn EventService, text: Option<&str>) {
    events.fire_local_event(STATUS_EVENT, &Payload::from(text.unwrap_or("")));
}

/// Sends a ping through the dispatcher attached to `events`.
///
/// # Returns
///
/// * `Err(EventError::DispatcherDetached)` if no dispatcher is attached.
pub fn ping(
    events: &dyn LocalDispatcher,
    response_event: &str,
    filters: Vec<PingFilter>,
    recipients: &[Recipient],
) -> Result<()> {
    let dispatcher = events
        .get_global_event_dispatcher()
        .ok_or(EventError::DispatcherDetached)?;

    if let Err(e) = dispatcher.ping(response_event, filters, recipients) {
        error!("Error sending ping for '{}': {:#}", response_event, e);
    }
    Ok(())
}
