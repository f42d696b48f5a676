//! Hosts the event and messaging services of one application process.

use crate::config::MessagingConfig;
use crate::error::Result;
use crate::event::dispatcher::GlobalEventDispatcher;
use crate::event::manager::EventManager;
use crate::event::subscriptions::same_instance;
use crate::messaging::consumer::ConsumerService;
use crate::messaging::producer::ProducerService;
use events::{IdentityProvider, MessageConsumer, MessageProducer};
use log::info;
use std::sync::{Arc, Mutex, PoisonError};

/// Wires an `EventManager`, a `GlobalEventDispatcher` and both transport aggregators.
///
/// Transports added to the context are registered with the aggregators right away
/// and unregistered again on `shutdown`.
pub struct MessagingContext {
    event_manager: Arc<EventManager>,
    producer_service: Arc<ProducerService>,
    consumer_service: Arc<ConsumerService>,
    dispatcher: Arc<GlobalEventDispatcher>,
    producers: Mutex<Vec<Arc<dyn MessageProducer>>>,
    consumers: Mutex<Vec<Arc<dyn MessageConsumer>>>,
}

impl MessagingContext {
    /// Builds the services described by `config`.
    ///
    /// # Returns
    ///
    /// * `Err(EventError::InvalidElapsed)` if the dedup window cannot be parsed.
    pub fn new(config: &MessagingConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let event_manager = Arc::new(EventManager::new());
        let producer_service = Arc::new(ProducerService::new(config.node_id().map(str::to_string)));
        let consumer_service = ConsumerService::new(config.node_id().map(str::to_string), config.dedup_max_life()?);
        let dispatcher = GlobalEventDispatcher::new(
            config,
            event_manager.clone(),
            producer_service.clone(),
            consumer_service.clone(),
            identity,
        );

        Ok(Self {
            event_manager,
            producer_service,
            consumer_service,
            dispatcher,
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
        })
    }

    /// Adds a producer binding and registers it.
    pub fn add_producer(&self, producer: Arc<dyn MessageProducer>) {
        if self.producer_service.register_producer(producer.clone()) {
            self.producers.lock().unwrap_or_else(PoisonError::into_inner).push(producer);
        }
    }

    /// Adds a consumer binding and registers it.
    pub fn add_consumer(&self, consumer: Arc<dyn MessageConsumer>) {
        if self.consumer_service.register_consumer(consumer.clone()) {
            self.consumers.lock().unwrap_or_else(PoisonError::into_inner).push(consumer);
        }
    }

    /// Adds a binding that is both a producer and a consumer.
    pub fn add_transport<T>(&self, transport: Arc<T>)
    where
        T: MessageProducer + MessageConsumer + 'static,
    {
        self.add_producer(transport.clone());
        self.add_consumer(transport);
    }

    /// Removes a producer binding previously added to this context.
    pub fn remove_producer(&self, producer: &Arc<dyn MessageProducer>) -> bool {
        self.producers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|p| !same_instance(p, producer));
        self.producer_service.unregister_producer(producer)
    }

    /// Removes a consumer binding previously added to this context.
    pub fn remove_consumer(&self, consumer: &Arc<dyn MessageConsumer>) -> bool {
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| !same_instance(c, consumer));
        self.consumer_service.unregister_consumer(consumer)
    }

    /// Initializes the global dispatcher; events start flowing to and from the transports.
    pub fn start(&self) {
        self.dispatcher.init();
        info!("Messaging context started for {}", self.dispatcher.get_session_id());
    }

    /// Tears everything down: dispatcher, transport registrations, then local subscriptions.
    pub fn shutdown(&self) {
        self.dispatcher.destroy();

        let consumers = std::mem::take(&mut *self.consumers.lock().unwrap_or_else(PoisonError::into_inner));
        for consumer in &consumers {
            self.consumer_service.unregister_consumer(consumer);
        }
        let producers = std::mem::take(&mut *self.producers.lock().unwrap_or_else(PoisonError::into_inner));
        for producer in &producers {
            self.producer_service.unregister_producer(producer);
        }

        self.event_manager.destroy();
        info!("Messaging context for {} shut down", self.dispatcher.get_session_id());
    }

    pub fn get_event_manager(&self) -> &Arc<EventManager> {
        &self.event_manager
    }

    pub fn get_dispatcher(&self) -> &Arc<GlobalEventDispatcher> {
        &self.dispatcher
    }

    pub fn get_producer_service(&self) -> &Arc<ProducerService> {
        &self.producer_service
    }

    pub fn get_consumer_service(&self) -> &Arc<ConsumerService> {
        &self.consumer_service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::MemoryBroker;
    use events::{EventService, LocalDispatcher, Message, MessageCallback, RemoteDispatcher, User, subscriber_fn};

    fn context(app_name: &str) -> MessagingContext {
        let config = MessagingConfig::default().with_app_name(app_name);
        MessagingContext::new(&config, Arc::new(None::<User>)).unwrap()
    }

    #[test]
    fn test_invalid_dedup_window_is_rejected() {
        let config = MessagingConfig::default().with_dedup_max_life("whenever");
        assert!(MessagingContext::new(&config, Arc::new(None::<User>)).is_err());
    }

    #[test]
    fn test_transports_are_registered_and_released() {
        let broker = MemoryBroker::new();
        let context = context("app");
        let transport = broker.create_transport("memory");

        context.add_transport(transport.clone());
        context.add_transport(transport.clone());
        assert_eq!(context.get_producer_service().registered_producers().len(), 1);
        assert_eq!(context.get_consumer_service().registered_consumers().len(), 1);

        context.start();
        assert!(transport.is_subscribed("cwf-event-PING"));

        context.shutdown();
        assert!(context.get_producer_service().registered_producers().is_empty());
        assert!(context.get_consumer_service().registered_consumers().is_empty());
        assert!(!transport.is_subscribed("cwf-event-PING"));
        assert!(context.get_event_manager().get_global_event_dispatcher().is_none());
        assert!(context.get_event_manager().get_events().is_empty());
    }

    #[test]
    fn test_node_id_is_shared_by_aggregators() {
        let config = MessagingConfig::default().with_node_id("ward-3");
        let context = MessagingContext::new(&config, Arc::new(None::<User>)).unwrap();
        context.start();

        assert_eq!(context.get_producer_service().get_node_id(), "ward-3");
        assert_eq!(context.get_consumer_service().get_node_id(), "ward-3");
        assert_eq!(context.get_dispatcher().get_publisher_info().get_node_id(), Some("ward-3"));
        assert!(!context.get_event_manager().has_subscribers("ANYTHING", false));
    }

    #[test]
    fn test_panicking_transport_does_not_abort_start() {
        struct Broken;

        impl MessageConsumer for Broken {
            fn name(&self) -> &str {
                "broken"
            }

            fn set_callback(&self, _: Option<Arc<dyn MessageCallback>>) {}

            fn subscribe(&self, _: &str) -> bool {
                panic!("connection refused");
            }

            fn unsubscribe(&self, _: &str) -> bool {
                panic!("connection refused");
            }
        }

        impl MessageProducer for Broken {
            fn name(&self) -> &str {
                "broken"
            }

            fn publish(&self, _: &str, _: &Message) -> bool {
                panic!("connection refused");
            }
        }

        let broker = MemoryBroker::new();
        let context = context("app");
        let healthy = broker.create_transport("memory");
        context.add_transport(Arc::new(Broken));
        context.add_transport(healthy.clone());

        context.start();
        assert!(healthy.is_subscribed("cwf-event-PING"));

        let subscriber = subscriber_fn(|_, _| Ok(()));
        context.get_event_manager().subscribe("ORDER.CREATED", subscriber.clone());
        context.get_event_manager().fire_remote_event("ORDER.CREATED", &serde_json::json!(1), &[]);
        assert!(healthy.is_subscribed("cwf-event-ORDER"));

        context.get_event_manager().unsubscribe("ORDER.CREATED", &subscriber);
        assert!(!healthy.is_subscribed("cwf-event-ORDER"));
        context.shutdown();
        assert!(!healthy.is_subscribed("cwf-event-PING"));
    }
}
