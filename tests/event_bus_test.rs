//! Integration tests for registration, publishing and failure isolation.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use common::ListEvent;
use common::ListKeeper;
use common::Logger;
use common::MessageEvent;
use common::RecordingSink;
use common::UncopyableEvent;
use eventbus::EventBus;
use eventbus::FailureStage;
use eventbus::Handlers;
use eventbus::Subscriber;
use eventbus::ThreadPolicy;

mod common;

fn bus_with_sink(sink: Arc<RecordingSink>) -> EventBus {
    let options = EventBus::builder()
        .diagnostic_sink(sink)
        .build()
        .expect("Failed to build options");
    EventBus::with_options(options).expect("Failed to create bus")
}

#[test]
fn test_inline_handler_runs_before_publish_returns() {
    let bus = EventBus::new();
    let logger = Arc::new(Logger::default());
    bus.register(&logger);

    let routed = bus.publish(&MessageEvent::new("hi"));

    assert_eq!(routed, 1);
    let received = logger.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, "hi");
    assert_eq!(received[0].thread, std::thread::current().id());
}

#[test]
fn test_handler_gets_equal_but_distinct_payload() {
    let bus = EventBus::new();
    let logger = Arc::new(Logger::default());
    bus.register(&logger);

    let event = MessageEvent::new("payload");
    bus.publish(&event);

    let received = logger.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, event.text);
    assert_ne!(received[0].text_ptr, event.text.as_ptr() as usize);
}

#[test]
fn test_publish_without_subscribers_is_noop() {
    let bus = EventBus::new();
    assert_eq!(bus.publish(&MessageEvent::new("nobody listens")), 0);
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 0);
}

#[test]
fn test_unregistered_subscriber_is_not_invoked() {
    let bus = EventBus::new();
    let logger = Arc::new(Logger::default());
    bus.register(&logger);
    bus.unregister(&logger);

    assert_eq!(bus.publish(&MessageEvent::new("after unregister")), 0);
    assert!(logger.received.lock().unwrap().is_empty());
    assert!(!bus.is_registered(&logger));
}

#[test]
fn test_unregister_unknown_instance_is_noop() {
    let bus = EventBus::new();
    let registered = Arc::new(Logger::default());
    let stranger = Arc::new(Logger::default());
    bus.register(&registered);

    bus.unregister(&stranger);

    assert!(bus.is_registered(&registered));
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 1);
}

#[test]
fn test_register_twice_keeps_single_entry() {
    let bus = EventBus::new();
    let logger = Arc::new(Logger::default());
    bus.register(&logger);
    bus.register(&logger.clone());

    assert_eq!(bus.subscriber_count::<MessageEvent>(), 1);
    bus.publish(&MessageEvent::new("once"));
    assert_eq!(logger.texts(), vec!["once".to_string()]);
}

#[test]
fn test_instances_receive_independent_copies() {
    let bus = EventBus::new();
    let first = Arc::new(ListKeeper::default());
    let second = Arc::new(ListKeeper::default());
    bus.register(&first);
    bus.register(&second);

    let event = ListEvent {
        items: vec!["a".to_string()],
    };
    assert_eq!(bus.publish(&event), 2);

    first.kept.lock().unwrap()[0].items.push("mutated".to_string());

    assert_eq!(second.kept.lock().unwrap()[0].items, vec!["a".to_string()]);
    assert_eq!(event.items, vec!["a".to_string()]);
}

#[test]
fn test_dispatch_follows_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    struct Tagged {
        tag: usize,
        order: Arc<Mutex<Vec<usize>>>,
    }

    impl Subscriber for Tagged {
        fn declare(handlers: &mut Handlers<Self>) {
            handlers.on(ThreadPolicy::Inline, |s: &Self, _: MessageEvent| {
                s.order.lock().unwrap().push(s.tag);
                Ok(())
            });
        }
    }

    let bus = EventBus::new();
    let subs: Vec<_> = (0..5)
        .map(|tag| {
            Arc::new(Tagged {
                tag,
                order: order.clone(),
            })
        })
        .collect();
    for sub in &subs {
        bus.register(sub);
    }

    bus.publish(&MessageEvent::new("ordered"));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

// FAILURE ISOLATION

struct Faulty;

impl Subscriber for Faulty {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on(ThreadPolicy::Inline, |_: &Self, _: MessageEvent| {
            Err(anyhow::anyhow!("handler refused"))
        });
    }
}

struct Panicky;

impl Subscriber for Panicky {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on(ThreadPolicy::Inline, |_: &Self, _: MessageEvent| {
            panic!("handler exploded")
        });
    }
}

#[test]
fn test_failing_handlers_do_not_affect_siblings() {
    let sink = RecordingSink::new();
    let bus = bus_with_sink(sink.clone());
    let faulty = Arc::new(Faulty);
    let panicky = Arc::new(Panicky);
    let logger = Arc::new(Logger::default());
    bus.register(&faulty);
    bus.register(&panicky);
    bus.register(&logger);

    assert_eq!(bus.publish(&MessageEvent::new("still delivered")), 3);

    assert_eq!(logger.texts(), vec!["still delivered".to_string()]);
    let failures = sink.failures.lock().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].stage, FailureStage::Handler);
    assert!(failures[0].message.contains("handler refused"));
    assert_eq!(failures[1].stage, FailureStage::Panic);
    assert!(failures[1].message.contains("handler exploded"));
}

#[test]
fn test_isolation_failure_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));

    struct Counter {
        calls: Arc<AtomicUsize>,
    }

    impl Subscriber for Counter {
        fn declare(handlers: &mut Handlers<Self>) {
            handlers.on(ThreadPolicy::Inline, |s: &Self, _: UncopyableEvent| {
                s.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
    }

    let sink = RecordingSink::new();
    let bus = bus_with_sink(sink.clone());
    let counter = Arc::new(Counter {
        calls: calls.clone(),
    });
    bus.register(&counter);

    assert_eq!(bus.publish(&UncopyableEvent), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.failures.lock().unwrap()[0].stage, FailureStage::Isolation);
}

// MULTIPLE EVENT TYPES AND COMPOSITION

#[derive(Default)]
struct Dashboard {
    logger: Logger,
    lists: Mutex<usize>,
}

impl Subscriber for Dashboard {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers
            .inherit(|d: &Self| &d.logger)
            .on(ThreadPolicy::Inline, |d: &Self, _: ListEvent| {
                *d.lists.lock().unwrap() += 1;
                Ok(())
            });
    }
}

#[test]
fn test_inherited_handlers_are_dispatched() {
    let bus = EventBus::new();
    let dashboard = Arc::new(Dashboard::default());
    bus.register(&dashboard);

    bus.publish(&MessageEvent::new("through component"));
    bus.publish(&ListEvent { items: Vec::new() });

    assert_eq!(dashboard.logger.texts(), vec!["through component".to_string()]);
    assert_eq!(*dashboard.lists.lock().unwrap(), 1);
}

#[test]
fn test_unregister_removes_every_event_type() {
    let bus = EventBus::new();
    let dashboard = Arc::new(Dashboard::default());
    let other = Arc::new(Logger::default());
    bus.register(&dashboard);
    bus.register(&other);
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 2);
    assert_eq!(bus.subscriber_count::<ListEvent>(), 1);

    bus.unregister(&dashboard);

    assert_eq!(bus.subscriber_count::<MessageEvent>(), 1);
    assert_eq!(bus.subscriber_count::<ListEvent>(), 0);
    bus.publish(&MessageEvent::new("only other"));
    assert!(dashboard.logger.texts().is_empty());
    assert_eq!(other.texts(), vec!["only other".to_string()]);
}

#[test]
fn test_handler_may_unregister_itself() {
    struct OneShot {
        bus: Arc<EventBus>,
        me: Mutex<Option<Arc<OneShot>>>,
        calls: AtomicUsize,
    }

    impl Subscriber for OneShot {
        fn declare(handlers: &mut Handlers<Self>) {
            handlers.on(ThreadPolicy::Inline, |s: &Self, _: MessageEvent| {
                s.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = s.me.lock().unwrap().take() {
                    s.bus.unregister(&me);
                }
                Ok(())
            });
        }
    }

    let bus = Arc::new(EventBus::new());
    let one_shot = Arc::new(OneShot {
        bus: bus.clone(),
        me: Mutex::new(None),
        calls: AtomicUsize::new(0),
    });
    *one_shot.me.lock().unwrap() = Some(one_shot.clone());
    bus.register(&one_shot);

    bus.publish(&MessageEvent::new("first"));
    bus.publish(&MessageEvent::new("second"));

    assert_eq!(one_shot.calls.load(Ordering::SeqCst), 1);
    assert!(!bus.is_registered(&one_shot));
}

// CONCURRENT REGISTRATION

#[test]
fn test_concurrent_register_unregister_while_publishing() {
    let sink = RecordingSink::new();
    let bus = Arc::new(bus_with_sink(sink.clone()));
    let stop = Arc::new(AtomicBool::new(false));

    let publishers: Vec<_> = (0..4)
        .map(|p| {
            let bus = bus.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut published = 0usize;
                while !stop.load(Ordering::SeqCst) {
                    bus.publish(&MessageEvent::new(&format!("p{p}-{published}")));
                    published += 1;
                }
                published
            })
        })
        .collect();

    let registrars: Vec<_> = (0..8)
        .map(|_| {
            let bus = bus.clone();
            std::thread::spawn(move || {
                let loggers: Vec<Arc<Logger>> =
                    (0..25).map(|_| Arc::new(Logger::default())).collect();
                for _ in 0..4 {
                    for logger in &loggers {
                        bus.register(logger);
                        bus.register(logger);
                        assert!(bus.is_registered(logger));
                    }
                    for logger in &loggers {
                        bus.unregister(logger);
                        assert!(!bus.is_registered(logger));
                    }
                }
                loggers
            })
        })
        .collect();

    let loggers: Vec<Arc<Logger>> = registrars
        .into_iter()
        .flat_map(|registrar| registrar.join().expect("Registrar thread panicked"))
        .collect();
    stop.store(true, Ordering::SeqCst);
    let published: usize = publishers
        .into_iter()
        .map(|publisher| publisher.join().expect("Publisher thread panicked"))
        .sum();

    assert!(published > 0);
    assert_eq!(loggers.len(), 200);
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 0);
    assert_eq!(bus.registered_count(), 0);
    assert_eq!(sink.len(), 0);
    for logger in &loggers {
        let texts = logger.texts();
        let unique: HashSet<&String> = texts.iter().collect();
        assert_eq!(unique.len(), texts.len(), "instance received an event twice");
    }
}

#[test]
fn test_same_instance_registered_from_many_threads_once() {
    let bus = Arc::new(EventBus::new());
    let logger = Arc::new(Logger::default());

    let race = |register: bool| {
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bus = bus.clone();
                let logger = logger.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if register {
                        bus.register(&logger);
                    } else {
                        bus.unregister(&logger);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Registration thread panicked");
        }
    };

    race(true);
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 1);
    assert_eq!(bus.publish(&MessageEvent::new("once")), 1);
    assert_eq!(logger.texts(), vec!["once".to_string()]);

    race(false);
    assert_eq!(bus.subscriber_count::<MessageEvent>(), 0);
    assert_eq!(bus.registered_count(), 0);
}
