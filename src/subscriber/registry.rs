//! Per-type cache of handler descriptors.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::subscriber::Handlers;
use crate::subscriber::Subscriber;
use crate::subscriber::handler::HandlerDescriptor;

/// Descriptors of one subscriber type, in declaration order.
pub type Descriptors = Arc<[Arc<HandlerDescriptor>]>;

#[derive(Default)]
pub struct SubscriberRegistry {
    cache: Mutex<HashMap<TypeId, Descriptors>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handlers of `S`, running [`Subscriber::declare`] only
    /// the first time `S` is seen.
    pub fn resolve<S: Subscriber>(&self) -> Descriptors {
        let mut cache = self.cache.lock();
        cache
            .entry(TypeId::of::<S>())
            .or_insert_with(|| {
                let mut handlers = Handlers::<S>::new();
                S::declare(&mut handlers);
                debug!(
                    "Resolved {} handler(s) for {}",
                    handlers.len(),
                    std::any::type_name::<S>()
                );
                handlers.into_descriptors().into()
            })
            .clone()
    }

    pub fn is_cached<S: Subscriber>(&self) -> bool {
        self.cache.lock().contains_key(&TypeId::of::<S>())
    }

    /// Number of subscriber types resolved so far.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
