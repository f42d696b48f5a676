use anyhow::Result;
use event_core::comms::MemoryBroker;
use event_core::config::MessagingConfig;
use event_core::MessagingContext;
use events::{EventService, EventSubscriber, MessageProducer, Message, Payload, User, subscriber_fn};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn desktop(app_name: &str) -> Result<MessagingContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = MessagingConfig::default().with_app_name(app_name);
    Ok(MessagingContext::new(&config, Arc::new(None::<User>))?)
}

fn collector() -> (Arc<dyn EventSubscriber>, Arc<Mutex<Vec<(String, Payload)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscriber = subscriber_fn(move |event_name, data| {
        sink.lock().unwrap().push((event_name.to_string(), data.clone()));
        Ok(())
    });
    (subscriber, seen)
}

/// Counts publishes without delivering anything.
#[derive(Default)]
struct CountingProducer {
    published: Mutex<usize>,
}

impl MessageProducer for CountingProducer {
    fn name(&self) -> &str {
        "counting"
    }

    fn publish(&self, _: &str, _: &Message) -> bool {
        *self.published.lock().unwrap() += 1;
        true
    }
}

// P subscribes to ORDER.CREATED, Q fires it remotely over the loopback broker.
#[test]
fn test_remote_event_end_to_end() -> Result<()> {
    // 1. Two processes sharing one broker
    let broker = MemoryBroker::new();
    let p = desktop("P")?;
    let q = desktop("Q")?;
    let p_transport = broker.create_transport("p");
    p.add_transport(p_transport.clone());
    q.add_transport(broker.create_transport("q"));
    p.start();
    q.start();

    // 2. P subscribes; exactly one event channel opens
    let (subscriber, seen) = collector();
    p.get_event_manager().subscribe("ORDER.CREATED", subscriber);
    assert!(p_transport.is_subscribed("cwf-event-ORDER"));
    let event_channels: Vec<String> = p
        .get_consumer_service()
        .get_channels()
        .into_iter()
        .filter(|c| c != "cwf-event-PING")
        .collect();
    assert_eq!(event_channels, vec!["cwf-event-ORDER"]);

    // 3. Q fires remotely
    q.get_event_manager()
        .fire_remote_event("ORDER.CREATED", &json!({"id": 42}), &[]);

    // 4. P receives it exactly once, under the original event name
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("ORDER.CREATED".to_string(), json!({"id": 42}))]
    );

    p.shutdown();
    q.shutdown();
    Ok(())
}

#[test]
fn test_unrelated_events_stay_off_the_channel() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P")?;
    let q = desktop("Q")?;
    p.add_transport(broker.create_transport("p"));
    q.add_transport(broker.create_transport("q"));
    p.start();
    q.start();

    let (subscriber, seen) = collector();
    p.get_event_manager().subscribe("ORDER.CREATED", subscriber);

    q.get_event_manager().fire_remote_event("ORDER.DELETED", &json!(1), &[]);
    q.get_event_manager().fire_remote_event("PATIENT.SELECTED", &json!(2), &[]);
    q.get_event_manager().fire_remote_event("ORDER.CREATED.STAT", &json!(3), &[]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("ORDER.CREATED.STAT".to_string(), json!(3))]
    );
    Ok(())
}

#[test]
fn test_local_fire_never_reaches_producers() -> Result<()> {
    let context = desktop("P")?;
    let producer = Arc::new(CountingProducer::default());
    context.add_producer(producer.clone());
    context.start();

    let (subscriber, seen) = collector();
    context.get_event_manager().subscribe("ORDER", subscriber);
    context
        .get_event_manager()
        .fire_local_event("ORDER.CREATED", &json!({"id": 1}));

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(*producer.published.lock().unwrap(), 0);

    context
        .get_event_manager()
        .fire_remote_event("ORDER.CREATED", &json!({"id": 2}), &[]);
    assert_eq!(*producer.published.lock().unwrap(), 1);
    Ok(())
}

#[test]
fn test_remote_fire_reaches_sender_through_transport_echo() -> Result<()> {
    let broker = MemoryBroker::new();
    let context = desktop("P")?;
    context.add_transport(broker.create_transport("p"));
    context.start();

    let (subscriber, seen) = collector();
    context.get_event_manager().subscribe("ORDER", subscriber);
    context
        .get_event_manager()
        .fire_remote_event("ORDER.CREATED", &json!("echo"), &[]);

    assert_eq!(seen.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn test_unsubscribe_closes_channel_and_stops_delivery() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P")?;
    let q = desktop("Q")?;
    let p_transport = broker.create_transport("p");
    p.add_transport(p_transport.clone());
    q.add_transport(broker.create_transport("q"));
    p.start();
    q.start();

    let (subscriber, seen) = collector();
    p.get_event_manager().subscribe("ORDER.CREATED", subscriber.clone());
    p.get_event_manager().unsubscribe("ORDER.CREATED", &subscriber);
    assert!(!p_transport.is_subscribed("cwf-event-ORDER"));

    q.get_event_manager()
        .fire_remote_event("ORDER.CREATED", &json!({"id": 42}), &[]);
    assert!(seen.lock().unwrap().is_empty());
    Ok(())
}
