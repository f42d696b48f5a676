use event_core::args::CommonArgs;
use event_core::comms::{MemoryBroker, MemoryTransport};
use event_core::event::util;
use event_core::{logging, MessagingContext};
use events::{EventService, PingFilter, PublisherInfo, User, subscriber_fn, typed_subscriber};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

const PING_RESPONSE_EVENT: &str = "PING.RESPONSE.DEMO";

/// One simulated desktop: a messaging context plus its loopback transport.
struct Desktop {
    context: MessagingContext,
    transport: Arc<MemoryTransport>,
}

fn desktop(args: &CommonArgs, broker: &Arc<MemoryBroker>, app_name: &str, user: User) -> anyhow::Result<Desktop> {
    let config = args.load_config()?.with_app_name(app_name);
    let context = MessagingContext::new(&config, Arc::new(Some(user)))?;
    let transport = broker.create_transport(format!("memory-{}", app_name));
    context.add_transport(transport.clone());
    context.start();
    Ok(Desktop { context, transport })
}

/// Pings peers and collects their publisher info until the timeout expires.
async fn discover(desktop: &Desktop, filters: Vec<PingFilter>, wait: Duration) -> anyhow::Result<Vec<PublisherInfo>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let responder = typed_subscriber(move |_, info: PublisherInfo| {
        tx.send(info)?;
        Ok(())
    });

    let events = desktop.context.get_event_manager();
    events.subscribe(PING_RESPONSE_EVENT, responder.clone());
    util::ping(&**events, PING_RESPONSE_EVENT, filters, &[])?;

    let deadline = Instant::now() + wait;
    let mut found = Vec::new();
    while let Ok(Some(info)) = timeout_at(deadline, rx.recv()).await {
        found.push(info);
    }

    events.unsubscribe(PING_RESPONSE_EVENT, &responder);
    Ok(found)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CommonArgs::parse_args(std::env::args().collect());
    logging::init(args.load_config()?.log_level())?;
    info!("=== Event Demo Starting ===");

    let broker = MemoryBroker::new();
    let triage = desktop(&args, &broker, "Triage", User::new("nurse-1", "Nurse Ratched"))?;
    let pharmacy = desktop(&args, &broker, "Pharmacy", User::new("pharm-1", "Dr. Pill"))?;

    // Pharmacy listens to every ORDER.* event.
    pharmacy.context.get_event_manager().subscribe(
        "ORDER",
        subscriber_fn(|event_name, data| {
            info!("[Pharmacy] received {} {}", event_name, data);
            Ok(())
        }),
    );
    triage.context.get_event_manager().subscribe(
        util::STATUS_EVENT,
        subscriber_fn(|_, data| {
            info!("[Triage] status: {}", data);
            Ok(())
        }),
    );

    util::status(&**triage.context.get_event_manager(), Some("Placing orders"));
    let events = triage.context.get_event_manager();
    events.fire_remote_event("ORDER.CREATED", &json!({"id": 42, "drug": "aspirin"}), &[]);
    events.fire_local_event("ORDER.CREATED", &json!({"id": 43, "note": "stays on this desktop"}));

    let peers = discover(&triage, Vec::new(), args.get_ping_timeout()).await?;
    info!("[Triage] {} desktop(s) answered the open ping", peers.len());
    for peer in &peers {
        info!("[Triage]   {}", peer);
    }

    let pharmacies = discover(&triage, vec![PingFilter::app_name("Pharmacy")], args.get_ping_timeout()).await?;
    info!("[Triage] {} desktop(s) answered the Pharmacy ping", pharmacies.len());

    // Messages published while the pharmacy transport is down are simply lost.
    pharmacy.transport.set_online(false);
    events.fire_remote_event("ORDER.CANCELLED", &json!({"id": 42}), &[]);
    pharmacy.transport.set_online(true);

    let unanswered = discover(&triage, vec![PingFilter::sentinel_event("LAB.RESULT")], args.get_ping_timeout()).await?;
    if !unanswered.is_empty() {
        warn!("[Triage] Unexpected answer to the lab ping");
    }

    for closing in [&triage, &pharmacy] {
        closing.context.get_dispatcher().update_connection_status(false);
        closing.context.shutdown();
    }

    if broker_has_subscriptions(&triage, &pharmacy) {
        error!("Transports still hold subscriptions after shutdown");
    }
    info!("=== Event Demo Finished ===");
    Ok(())
}

fn broker_has_subscriptions(a: &Desktop, b: &Desktop) -> bool {
    [a, b].iter().any(|d| d.transport.is_subscribed("cwf-event-ORDER") || d.transport.is_subscribed("cwf-event-PING"))
}
