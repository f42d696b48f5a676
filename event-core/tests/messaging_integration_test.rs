use anyhow::Result;
use event_core::comms::MemoryBroker;
use event_core::config::MessagingConfig;
use event_core::MessagingContext;
use events::{EventService, EventSubscriber, Recipient, RecipientType, User, subscriber_fn};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn desktop(app_name: &str, user: Option<User>) -> Result<MessagingContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = MessagingConfig::default().with_app_name(app_name);
    Ok(MessagingContext::new(&config, Arc::new(user))?)
}

fn counter() -> (Arc<dyn EventSubscriber>, Arc<Mutex<usize>>) {
    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let subscriber = subscriber_fn(move |_, _| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });
    (subscriber, count)
}

// Two transports on the receiving side see every publication twice.
#[test]
fn test_redundant_transports_deliver_once() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P", None)?;
    let q = desktop("Q", None)?;
    p.add_transport(broker.create_transport("p-primary"));
    p.add_transport(broker.create_transport("p-backup"));
    q.add_transport(broker.create_transport("q"));
    p.start();
    q.start();

    let (subscriber, count) = counter();
    p.get_event_manager().subscribe("ORDER.CREATED", subscriber);

    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!({"id": 1}), &[]);
    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!({"id": 2}), &[]);

    assert_eq!(*count.lock().unwrap(), 2);
    Ok(())
}

// A single receiving transport bypasses duplicate suppression entirely.
#[test]
fn test_single_transport_delivers_every_copy() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P", None)?;
    let q = desktop("Q", None)?;
    p.add_transport(broker.create_transport("p"));
    // Q publishes every message through two producers, with one publication id.
    q.add_producer(broker.create_transport("q-primary"));
    q.add_producer(broker.create_transport("q-backup"));
    p.start();
    q.start();

    let (subscriber, count) = counter();
    p.get_event_manager().subscribe("ORDER.CREATED", subscriber);
    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!({"id": 1}), &[]);

    assert_eq!(*count.lock().unwrap(), 2);
    Ok(())
}

#[test]
fn test_recipients_restrict_delivery() -> Result<()> {
    let broker = MemoryBroker::new();
    let sender = desktop("Sender", None)?;
    let pharmacy = desktop("Pharmacy", Some(User::new("u1", "One")))?;
    let triage = desktop("Triage", Some(User::new("u2", "Two")))?;
    for (context, name) in [(&sender, "s"), (&pharmacy, "p"), (&triage, "t")] {
        context.add_transport(broker.create_transport(name));
        context.start();
    }

    let (pharmacy_subscriber, pharmacy_count) = counter();
    let (triage_subscriber, triage_count) = counter();
    pharmacy.get_event_manager().subscribe("ALERT", pharmacy_subscriber);
    triage.get_event_manager().subscribe("ALERT", triage_subscriber);

    let events = sender.get_event_manager();
    events.fire_remote_event("ALERT", &json!("app"), &[Recipient::new(RecipientType::Application, "Pharmacy")]);
    events.fire_remote_event("ALERT", &json!("user"), &[Recipient::new(RecipientType::User, "u2")]);
    events.fire_remote_event("ALERT", &json!("nobody"), &[Recipient::new(RecipientType::User, "u9")]);
    events.fire_remote_event("ALERT", &json!("everyone"), &[]);

    assert_eq!(*pharmacy_count.lock().unwrap(), 2);
    assert_eq!(*triage_count.lock().unwrap(), 2);
    Ok(())
}

#[test]
fn test_offline_transport_loses_messages_without_failing_callers() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P", None)?;
    let q = desktop("Q", None)?;
    let q_transport = broker.create_transport("q");
    p.add_transport(broker.create_transport("p"));
    q.add_transport(q_transport.clone());
    p.start();
    q.start();

    let (subscriber, count) = counter();
    p.get_event_manager().subscribe("ORDER", subscriber);

    q_transport.set_online(false);
    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!(1), &[]);
    assert_eq!(*count.lock().unwrap(), 0);

    q_transport.set_online(true);
    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!(2), &[]);
    assert_eq!(*count.lock().unwrap(), 1);
    Ok(())
}

#[test]
fn test_transport_added_after_start_joins_open_channels() -> Result<()> {
    let broker = MemoryBroker::new();
    let p = desktop("P", None)?;
    let q = desktop("Q", None)?;
    q.add_transport(broker.create_transport("q"));
    p.start();
    q.start();

    let (subscriber, count) = counter();
    p.get_event_manager().subscribe("ORDER", subscriber);

    let late = broker.create_transport("p-late");
    p.add_transport(late.clone());
    assert!(late.is_subscribed("cwf-event-ORDER"));

    q.get_event_manager().fire_remote_event("ORDER.CREATED", &json!(1), &[]);
    assert_eq!(*count.lock().unwrap(), 1);
    Ok(())
}
