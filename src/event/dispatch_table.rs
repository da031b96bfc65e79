//! Event type → (handler, subscriber) lists, plus the per-instance index
//! that makes unregistration exact.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::subscriber::handler::HandlerDescriptor;
use crate::subscriber::handler::Subject;

/// Identity of a registered instance: the address of its `Arc` allocation.
pub type SubscriberKey = usize;

pub fn subscriber_key<S: ?Sized>(subscriber: &Arc<S>) -> SubscriberKey {
    Arc::as_ptr(subscriber) as *const () as usize
}

/// One (handler, instance) pair in a dispatch list.
#[derive(Clone)]
pub struct Subscription {
    pub descriptor: Arc<HandlerDescriptor>,
    pub subscriber: Arc<Subject>,
    pub key: SubscriberKey,
}

#[derive(Default)]
pub struct DispatchTable {
    entries: HashMap<TypeId, Vec<Subscription>>,
    memberships: HashMap<SubscriberKey, Vec<TypeId>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `subscriber` to the list of every descriptor's event type.
    ///
    /// Returns `false` without touching anything if the instance is already
    /// registered.
    pub fn insert(
        &mut self,
        key: SubscriberKey,
        subscriber: Arc<Subject>,
        descriptors: &[Arc<HandlerDescriptor>],
    ) -> bool {
        if self.memberships.contains_key(&key) {
            return false;
        }

        let mut joined = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let event_type = descriptor.event_type();
            self.entries.entry(event_type).or_default().push(Subscription {
                descriptor: descriptor.clone(),
                subscriber: subscriber.clone(),
                key,
            });
            joined.push(event_type);
        }
        self.memberships.insert(key, joined);
        true
    }

    /// Removes the instance from every list it joined and returns how many
    /// entries were dropped. `None` if it was not registered.
    ///
    /// # Panics
    /// If the instance is still present in any list afterwards. That means
    /// the membership index no longer matches the lists.
    pub fn remove(&mut self, key: SubscriberKey) -> Option<usize> {
        let joined = self.memberships.remove(&key)?;

        let mut removed = 0;
        for event_type in joined {
            if let Some(list) = self.entries.get_mut(&event_type) {
                let before = list.len();
                list.retain(|s| s.key != key);
                removed += before - list.len();
                if list.is_empty() {
                    self.entries.remove(&event_type);
                }
            }
        }

        let residue = self
            .entries
            .values()
            .flatten()
            .find(|s| s.key == key);
        if let Some(stale) = residue {
            panic!(
                "dispatch table corrupted: subscriber still listed for {} after unregister",
                stale.descriptor.event_name()
            );
        }
        Some(removed)
    }

    /// Copies the current list for `event_type`, in insertion order.
    pub fn snapshot(&self, event_type: TypeId) -> Vec<Subscription> {
        self.entries.get(&event_type).cloned().unwrap_or_default()
    }

    pub fn contains(&self, key: SubscriberKey) -> bool {
        self.memberships.contains_key(&key)
    }

    pub fn count(&self, event_type: TypeId) -> usize {
        self.entries.get(&event_type).map_or(0, Vec::len)
    }

    /// Number of registered instances.
    pub(crate) fn len(&self) -> usize {
        self.memberships.len()
    }

    #[cfg(test)]
    fn corrupt_membership(&mut self, key: SubscriberKey, keep: TypeId) {
        if let Some(joined) = self.memberships.get_mut(&key) {
            joined.retain(|t| *t == keep);
        }
    }
}
