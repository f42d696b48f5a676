use anyhow::Result;
use event_core::comms::MemoryBroker;
use event_core::config::MessagingConfig;
use event_core::event::util;
use event_core::{EventError, MessagingContext};
use events::{EventService, PingFilter, PublisherInfo, User, subscriber_fn, typed_subscriber};
use std::sync::{Arc, Mutex};

const RESPONSE_EVENT: &str = "PING.RESPONSE.TEST";

struct Network {
    _broker: Arc<MemoryBroker>,
    desktops: Vec<MessagingContext>,
}

fn network(app_names: &[&str]) -> Result<Network> {
    let _ = env_logger::builder().is_test(true).try_init();
    let broker = MemoryBroker::new();
    let mut desktops = Vec::new();
    for app_name in app_names {
        let config = MessagingConfig::default().with_app_name(*app_name);
        let context = MessagingContext::new(&config, Arc::new(None::<User>))?;
        context.add_transport(broker.create_transport(*app_name));
        context.start();
        desktops.push(context);
    }
    Ok(Network {
        _broker: broker,
        desktops,
    })
}

fn listen(context: &MessagingContext) -> Arc<Mutex<Vec<PublisherInfo>>> {
    let responses = Arc::new(Mutex::new(Vec::new()));
    let sink = responses.clone();
    context.get_event_manager().subscribe(
        RESPONSE_EVENT,
        typed_subscriber(move |_, info: PublisherInfo| {
            sink.lock().unwrap().push(info);
            Ok(())
        }),
    );
    responses
}

fn ping(context: &MessagingContext, filters: Vec<PingFilter>) -> Result<()> {
    util::ping(&**context.get_event_manager(), RESPONSE_EVENT, filters, &[])?;
    Ok(())
}

fn app_names(responses: &Arc<Mutex<Vec<PublisherInfo>>>) -> Vec<String> {
    let mut names: Vec<String> = responses
        .lock()
        .unwrap()
        .iter()
        .filter_map(|info| info.get_app_name().map(str::to_string))
        .collect();
    names.sort();
    names
}

#[test]
fn test_open_ping_reaches_every_desktop() -> Result<()> {
    let network = network(&["Lab", "Pharmacy", "Triage"])?;
    let requester = &network.desktops[2];
    let responses = listen(requester);

    ping(requester, Vec::new())?;

    assert_eq!(app_names(&responses), vec!["Lab", "Pharmacy", "Triage"]);
    Ok(())
}

#[test]
fn test_app_name_filter_selects_one_desktop() -> Result<()> {
    let network = network(&["Lab", "Pharmacy", "Triage"])?;
    let requester = &network.desktops[2];
    let responses = listen(requester);

    ping(requester, vec![PingFilter::app_name("Pharmacy")])?;

    assert_eq!(app_names(&responses), vec!["Pharmacy"]);
    Ok(())
}

#[test]
fn test_sentinel_filter_requires_exact_subscription() -> Result<()> {
    let network = network(&["Lab", "Pharmacy", "Triage"])?;
    let requester = &network.desktops[2];
    let responses = listen(requester);

    network.desktops[0]
        .get_event_manager()
        .subscribe("RESULT.FINAL", subscriber_fn(|_, _| Ok(())));
    // An ancestor subscription does not satisfy an exact sentinel.
    network.desktops[1]
        .get_event_manager()
        .subscribe("RESULT", subscriber_fn(|_, _| Ok(())));

    ping(requester, vec![PingFilter::sentinel_event("RESULT.FINAL")])?;
    assert_eq!(app_names(&responses), vec!["Lab"]);

    responses.lock().unwrap().clear();
    ping(
        requester,
        vec![PingFilter::sentinel_event("RESULT.FINAL"), PingFilter::app_name("Pharmacy")],
    )?;
    assert!(responses.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_responses_go_to_the_requestor_only() -> Result<()> {
    let network = network(&["Lab", "Pharmacy", "Triage"])?;
    let requester = &network.desktops[2];
    let bystander = listen(&network.desktops[0]);
    let responses = listen(requester);

    ping(requester, vec![PingFilter::app_name("Pharmacy")])?;

    assert_eq!(responses.lock().unwrap().len(), 1);
    assert!(bystander.lock().unwrap().is_empty());

    let responses = responses.lock().unwrap();
    let info = &responses[0];
    let pharmacy = network.desktops[1].get_dispatcher();
    assert_eq!(info.get_session_id(), Some(pharmacy.get_session_id()));
    Ok(())
}

#[test]
fn test_ping_without_dispatcher_fails() {
    let config = MessagingConfig::default();
    let context = MessagingContext::new(&config, Arc::new(None::<User>)).unwrap();

    let result = util::ping(&**context.get_event_manager(), RESPONSE_EVENT, Vec::new(), &[]);
    assert!(matches!(result, Err(EventError::DispatcherDetached)));
}
