//! Events, isolation and the bus that dispatches them.

pub mod diagnostics;
pub mod dispatch_table;
pub mod event_bus;

use crate::error::BusError;

/// Marker trait for events that can be dispatched through the event bus.
///
/// The concrete type's `TypeId` is the dispatch key, so publishing a
/// `MessageEvent` only reaches handlers declared for `MessageEvent`.
///
/// Every handler invocation receives its own copy produced by
/// [`Event::isolate`]. The default copies through `Clone`, which is enough
/// for payloads made of owned data. Payloads holding shared handles
/// (`Arc<Mutex<_>>` and the like) must override it and copy what is behind
/// the handle, otherwise concurrent handlers would share that state.
pub trait Event: Clone + Send + Sync + 'static {
    /// Produces an independent copy of this event for one handler.
    fn isolate(&self) -> Result<Self, BusError> {
        Ok(self.clone())
    }

    /// Get the name of the event type.
    fn event_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Event carrying a single data payload.
///
/// Isolation uses the default [`Event::isolate`], i.e. `T::clone`. A payload
/// holding shared handles such as `Arc<Mutex<_>>` is therefore shared
/// between handlers, not copied. Wrap such state in a
/// dedicated event type that overrides `isolate` instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataEvent<T> {
    data: T,
}

impl<T> DataEvent<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Event for DataEvent<T> where T: Clone + Send + Sync + 'static {}
