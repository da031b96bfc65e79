//! Subscribers and the handlers they declare.
//!
//! A subscriber type lists its handlers once in [`Subscriber::declare`];
//! the bus resolves that list per type and caches it.
//!
//! ```
//! use std::sync::Arc;
//!
//! use eventbus::event::DataEvent;
//! use eventbus::event::event_bus::EventBus;
//! use eventbus::subscriber::Handlers;
//! use eventbus::subscriber::Subscriber;
//! use eventbus::subscriber::handler::ThreadPolicy;
//!
//! struct Logger;
//!
//! impl Logger {
//!     fn on_msg(&self, event: DataEvent<String>) -> anyhow::Result<()> {
//!         println!("{}", event.data());
//!         Ok(())
//!     }
//! }
//!
//! impl Subscriber for Logger {
//!     fn declare(handlers: &mut Handlers<Self>) {
//!         handlers.on(ThreadPolicy::Inline, Self::on_msg);
//!     }
//! }
//!
//! let bus = EventBus::new();
//! bus.register(&Arc::new(Logger));
//! bus.publish(&DataEvent::new("hi".to_string()));
//! ```

pub mod handler;
pub mod registry;

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::event::Event;
use crate::subscriber::handler::HandlerDescriptor;
use crate::subscriber::handler::Subject;
use crate::subscriber::handler::ThreadPolicy;
use crate::subscriber::handler::projection;

/// Trait for event subscribers.
pub trait Subscriber: Send + Sync + 'static {
    /// Declares every handler of this type.
    ///
    /// Called once per concrete type for the lifetime of a bus, never per
    /// instance.
    fn declare(handlers: &mut Handlers<Self>)
    where
        Self: Sized;
}

/// Collects the handler descriptors of subscriber type `S`.
pub struct Handlers<S> {
    descriptors: Vec<HandlerDescriptor>,
    _subscriber: PhantomData<fn(&S)>,
}

impl<S> Handlers<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            _subscriber: PhantomData,
        }
    }

    /// Declares `handler` for events of type `E`, run per `policy`.
    ///
    /// A type handles each event type at most once; declaring a second
    /// handler for the same `E` replaces the first.
    pub fn on<E, F>(&mut self, policy: ThreadPolicy, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&S, E) -> Result<()> + Send + Sync + 'static,
    {
        self.push(HandlerDescriptor::new::<S, E, F>(policy, handler));
        self
    }

    /// Pulls in every handler declared by component type `P`, reached
    /// through `accessor`.
    pub fn inherit<P, F>(&mut self, accessor: F) -> &mut Self
    where
        P: Subscriber,
        F: Fn(&S) -> &P + Send + Sync + 'static,
    {
        let mut inner = Handlers::<P>::new();
        P::declare(&mut inner);

        let outer = projection(move |subject| {
            subject
                .downcast_ref::<S>()
                .map(|s| accessor(s) as &Subject)
        });
        for descriptor in inner.descriptors {
            self.push(descriptor.project(outer.clone()));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub(crate) fn into_descriptors(self) -> Vec<Arc<HandlerDescriptor>> {
        self.descriptors.into_iter().map(Arc::new).collect()
    }

    fn push(&mut self, descriptor: HandlerDescriptor) {
        let event_type: TypeId = descriptor.event_type();
        if let Some(existing) = self
            .descriptors
            .iter_mut()
            .find(|d| d.event_type() == event_type)
        {
            warn!(
                "{} declares more than one handler for {}; {} replaces {}",
                std::any::type_name::<S>(),
                descriptor.event_name(),
                descriptor.handler_name(),
                existing.handler_name()
            );
            *existing = descriptor;
            return;
        }
        self.descriptors.push(descriptor);
    }
}
