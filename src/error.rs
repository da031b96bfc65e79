//! Error types for the event bus.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BusError {
    #[error("Invalid configuration: {msg}")]
    InvalidConfig { msg: String },

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Failed to spawn worker thread: {source}")]
    WorkerSpawn {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to isolate event `{event}`: {reason}")]
    Isolation { event: &'static str, reason: String },

    #[error("No main executor configured for main-thread dispatch")]
    MissingMainExecutor,

    #[error("Logging setup failed: {msg}")]
    LoggingSetup { msg: String },
}

impl BusError {
    /// Builds an [`BusError::Isolation`] for event type `E`.
    pub fn isolation<E: ?Sized>(reason: impl Into<String>) -> Self {
        Self::Isolation {
            event: std::any::type_name::<E>(),
            reason: reason.into(),
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for BusError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Self::InvalidConfig { msg: e.to_string() }
    }
}
