//! Where dispatch failures go.
//!
//! Failures never reach the publisher. They are handed to a
//! [`DiagnosticSink`] and dropped.

use std::fmt;

use log::error;

/// Point in the dispatch pipeline where a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStage {
    /// Copying the event for one handler failed.
    Isolation,
    /// The handler returned an error.
    Handler,
    /// The handler panicked.
    Panic,
    /// The invocation could not be handed to its executor.
    Routing,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Isolation => "isolation",
            FailureStage::Handler => "handler",
            FailureStage::Panic => "panic",
            FailureStage::Routing => "routing",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct DispatchFailure {
    pub event: &'static str,
    pub handler: &'static str,
    pub stage: FailureStage,
    pub message: String,
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, failure: &DispatchFailure);
}

/// Default sink: writes failures to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, failure: &DispatchFailure) {
        error!(
            "Dispatch of {} to {} failed at {}: {}",
            failure.event, failure.handler, failure.stage, failure.message
        );
    }
}
