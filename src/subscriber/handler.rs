//! Handler descriptors: what runs, for which event, on which thread.

use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use anyhow::anyhow;

use crate::event::Event;

/// Type-erased subscriber instance as stored by the bus.
pub type Subject = dyn Any + Send + Sync;

/// Selects the thread a handler runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ThreadPolicy {
    /// Runs synchronously on the publishing thread.
    #[default]
    Inline,
    /// Runs on the bus's main executor.
    Main,
    /// Runs on a worker pool thread.
    Background,
}

/// Maps a subscriber instance to the component that declared a handler.
pub(crate) type Projection = Arc<dyn for<'a> Fn(&'a Subject) -> Option<&'a Subject> + Send + Sync>;

/// Per-event invoker, stored type-erased and recovered with `downcast_ref`.
type Invoker<E> = Arc<dyn Fn(&Subject, E) -> Result<()> + Send + Sync>;

pub(crate) fn projection<F>(f: F) -> Projection
where
    F: for<'a> Fn(&'a Subject) -> Option<&'a Subject> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A handler bound to one event type and thread policy.
///
/// Descriptors are built once per subscriber type and shared by every
/// registered instance of that type.
pub struct HandlerDescriptor {
    event_type: TypeId,
    event_name: &'static str,
    handler_name: &'static str,
    policy: ThreadPolicy,
    projection: Option<Projection>,
    invoker: Arc<dyn Any + Send + Sync>,
}

impl HandlerDescriptor {
    pub(crate) fn new<S, E, F>(policy: ThreadPolicy, handler: F) -> Self
    where
        S: Send + Sync + 'static,
        E: Event,
        F: Fn(&S, E) -> Result<()> + Send + Sync + 'static,
    {
        let invoker: Invoker<E> = Arc::new(move |subject: &Subject, event: E| {
            let subscriber = subject
                .downcast_ref::<S>()
                .ok_or_else(|| anyhow!("subscriber is not a {}", std::any::type_name::<S>()))?;
            handler(subscriber, event)
        });

        Self {
            event_type: TypeId::of::<E>(),
            event_name: E::event_name(),
            handler_name: std::any::type_name::<F>(),
            policy,
            projection: None,
            invoker: Arc::new(invoker),
        }
    }

    /// Re-targets this descriptor at a parent type that reaches the
    /// declaring component through `outer`.
    pub(crate) fn project(&self, outer: Projection) -> Self {
        let projection = match &self.projection {
            Some(inner) => {
                let inner = inner.clone();
                projection(move |subject| outer(subject).and_then(|part| inner(part)))
            }
            None => outer,
        };

        Self {
            event_type: self.event_type,
            event_name: self.event_name,
            handler_name: self.handler_name,
            policy: self.policy,
            projection: Some(projection),
            invoker: self.invoker.clone(),
        }
    }

    /// Calls the handler on `subject` with `event`.
    pub fn invoke<E: Event>(&self, subject: &Subject, event: E) -> Result<()> {
        let invoker = self
            .invoker
            .downcast_ref::<Invoker<E>>()
            .ok_or_else(|| anyhow!("handler {} does not accept {}", self.handler_name, E::event_name()))?;

        let target = match &self.projection {
            Some(project) => project(subject)
                .ok_or_else(|| anyhow!("handler {} could not reach its component", self.handler_name))?,
            None => subject,
        };
        invoker(target, event)
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn policy(&self) -> ThreadPolicy {
        self.policy
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("event", &self.event_name)
            .field("handler", &self.handler_name)
            .field("policy", &self.policy)
            .finish()
    }
}
