//! The event bus: registration, publishing and thread-routed delivery.
//!
//! ```text
//! register(&Arc<S>) ──► SubscriberRegistry::resolve::<S>() ──► DispatchTable::insert
//!
//! publish(&E) ──► DispatchTable::snapshot(TypeId::of::<E>())
//!                   └─ per (handler, instance), in insertion order:
//!                        E::isolate() ──► Inline     : run now, on this thread
//!                                     ├─► Main       : MainExecutor::execute
//!                                     └─► Background : WorkerPool::submit
//! ```
//!
//! Handler errors, handler panics and isolation errors stop at the dispatch
//! boundary. They go to the bus's [`DiagnosticSink`] and are never seen by the
//! publisher or by other handlers of the same event.

use std::any::TypeId;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use derive_builder::Builder;
use log::debug;
use log::trace;
use parking_lot::Mutex;

use crate::config::Config;
use crate::config::PoolConfig;
use crate::error::BusError;
use crate::event::Event;
use crate::event::diagnostics::DiagnosticSink;
use crate::event::diagnostics::DispatchFailure;
use crate::event::diagnostics::FailureStage;
use crate::event::diagnostics::LogSink;
use crate::event::dispatch_table::DispatchTable;
use crate::event::dispatch_table::Subscription;
use crate::event::dispatch_table::subscriber_key;
use crate::subscriber::Subscriber;
use crate::subscriber::handler::Subject;
use crate::subscriber::handler::ThreadPolicy;
use crate::subscriber::registry::SubscriberRegistry;
use crate::task::main_loop::MainExecutor;
use crate::task::worker_pool::WorkerPool;
use crate::task::worker_pool::panic_message;

/// Construction options for [`EventBus`].
#[derive(Builder, Clone)]
#[builder(pattern = "immutable", build_fn(error = "BusError"))]
pub struct BusOptions {
    #[builder(default)]
    pub pool: PoolConfig,
    /// Executor for [`ThreadPolicy::Main`] handlers. Without one, main-routed
    /// dispatches are reported and dropped.
    #[builder(default, setter(strip_option))]
    pub main_executor: Option<Arc<dyn MainExecutor>>,
    #[builder(default = "Arc::new(LogSink) as Arc<dyn DiagnosticSink>")]
    pub diagnostic_sink: Arc<dyn DiagnosticSink>,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            main_executor: None,
            diagnostic_sink: Arc::new(LogSink),
        }
    }
}

pub struct EventBus {
    registry: SubscriberRegistry,
    table: Mutex<DispatchTable>,
    pool: WorkerPool,
    main_executor: Option<Arc<dyn MainExecutor>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl EventBus {
    /// Creates a bus with the default pool and no main executor.
    pub fn new() -> Self {
        Self::with_options(BusOptions::default()).expect("Error spawning worker pool for EventBus")
    }

    pub fn with_options(options: BusOptions) -> Result<Self, BusError> {
        let pool = WorkerPool::new(options.pool)?;
        Ok(Self {
            registry: SubscriberRegistry::new(),
            table: Mutex::new(DispatchTable::new()),
            pool,
            main_executor: options.main_executor,
            sink: options.diagnostic_sink,
        })
    }

    /// Creates a bus sized from `config`.
    pub fn from_config(config: &Config) -> Result<Self, BusError> {
        Self::with_options(BusOptions {
            pool: config.pool.clone(),
            ..BusOptions::default()
        })
    }

    pub fn builder() -> BusOptionsBuilder {
        BusOptionsBuilder::default()
    }

    /// Subscribes every handler `S` declares, bound to this instance.
    ///
    /// Registering an instance that is already registered does nothing.
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) {
        let descriptors = self.registry.resolve::<S>();
        if descriptors.is_empty() {
            debug!(
                "{} declares no handlers, nothing to register",
                std::any::type_name::<S>()
            );
            return;
        }

        let subject: Arc<Subject> = subscriber.clone();
        let inserted = self
            .table
            .lock()
            .insert(subscriber_key(subscriber), subject, &descriptors);

        if inserted {
            debug!(
                "Registered {} with {} handler(s)",
                std::any::type_name::<S>(),
                descriptors.len()
            );
        } else {
            debug!(
                "{} instance is already registered",
                std::any::type_name::<S>()
            );
        }
    }

    /// Removes this instance from every event type it was registered for.
    /// Unknown instances are ignored.
    ///
    /// # Panics
    /// If the dispatch table still lists the instance afterwards.
    pub fn unregister<S: Subscriber>(&self, subscriber: &Arc<S>) {
        let removed = self.table.lock().remove(subscriber_key(subscriber));
        match removed {
            Some(n) => debug!(
                "Unregistered {} ({} handler(s))",
                std::any::type_name::<S>(),
                n
            ),
            None => trace!(
                "{} instance was not registered",
                std::any::type_name::<S>()
            ),
        }
    }

    pub fn is_registered<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        self.table.lock().contains(subscriber_key(subscriber))
    }

    /// Number of (handler, instance) pairs listening for `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.table.lock().count(TypeId::of::<E>())
    }

    /// Number of registered subscriber instances, across all event types.
    pub fn registered_count(&self) -> usize {
        self.table.lock().len()
    }

    /// Delivers a copy of `event` to every handler registered for `E`.
    ///
    /// Returns how many invocations were routed. Inline handlers have
    /// finished when this returns. Main and Background handlers may not
    /// have started yet.
    pub fn publish<E: Event>(&self, event: &E) -> usize {
        let subscriptions = self.table.lock().snapshot(TypeId::of::<E>());
        if subscriptions.is_empty() {
            trace!("No subscribers for {}", E::event_name());
            return 0;
        }

        let mut routed = 0;
        for subscription in subscriptions {
            let copy = match isolate(event) {
                Ok(copy) => copy,
                Err(message) => {
                    self.sink.report(&DispatchFailure {
                        event: E::event_name(),
                        handler: subscription.descriptor.handler_name(),
                        stage: FailureStage::Isolation,
                        message,
                    });
                    continue;
                }
            };
            if self.route(subscription, copy) {
                routed += 1;
            }
        }
        routed
    }

    /// Same as [`EventBus::publish`], taking the event by value.
    pub fn publish_owned<E: Event>(&self, event: E) -> usize {
        self.publish(&event)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn route<E: Event>(&self, subscription: Subscription, event: E) -> bool {
        let policy = subscription.descriptor.policy();
        let handler = subscription.descriptor.handler_name();
        trace!("Routing {} to {} ({:?})", E::event_name(), handler, policy);

        let sink = self.sink.clone();
        let job = move || deliver(&subscription, event, sink.as_ref());

        match policy {
            ThreadPolicy::Inline => {
                job();
                true
            }
            ThreadPolicy::Main => match &self.main_executor {
                Some(main) => {
                    main.execute(Box::new(job));
                    true
                }
                None => {
                    self.report_routing::<E>(handler, BusError::MissingMainExecutor);
                    false
                }
            },
            ThreadPolicy::Background => match self.pool.submit(job) {
                Ok(()) => true,
                Err(e) => {
                    self.report_routing::<E>(handler, e);
                    false
                }
            },
        }
    }

    fn report_routing<E: Event>(&self, handler: &'static str, error: BusError) {
        self.sink.report(&DispatchFailure {
            event: E::event_name(),
            handler,
            stage: FailureStage::Routing,
            message: error.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn isolate<E: Event>(event: &E) -> Result<E, String> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| event.isolate())) {
        Ok(Ok(copy)) => Ok(copy),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(format!("isolation panicked: {}", panic_message(&*panic))),
    }
}

fn deliver<E: Event>(subscription: &Subscription, event: E, sink: &dyn DiagnosticSink) {
    let descriptor = &subscription.descriptor;
    let subject = subscription.subscriber.as_ref();

    let outcome =
        std::panic::catch_unwind(AssertUnwindSafe(|| descriptor.invoke(subject, event)));
    let (stage, message) = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => (FailureStage::Handler, format!("{e:#}")),
        Err(panic) => (FailureStage::Panic, panic_message(&*panic)),
    };
    sink.report(&DispatchFailure {
        event: descriptor.event_name(),
        handler: descriptor.handler_name(),
        stage,
        message,
    });
}
