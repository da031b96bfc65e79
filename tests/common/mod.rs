//! Common test utilities and subscriber fixtures.

use std::sync::Arc;
use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::Duration;
use std::time::Instant;

use eventbus::BusError;
use eventbus::DiagnosticSink;
use eventbus::DispatchFailure;
use eventbus::Event;
use eventbus::Handlers;
use eventbus::Subscriber;
use eventbus::ThreadPolicy;

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

// EVENTS

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub text: String,
}

impl Event for MessageEvent {}

#[allow(dead_code)]
impl MessageEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEvent {
    pub items: Vec<String>,
}

impl Event for ListEvent {}

/// Event whose copy step always fails.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct UncopyableEvent;

impl Event for UncopyableEvent {
    fn isolate(&self) -> Result<Self, BusError> {
        Err(BusError::isolation::<Self>("refusing to copy"))
    }
}

// SUBSCRIBERS

/// Inline `MessageEvent` handler recording what it saw and where.
#[derive(Default)]
pub struct Logger {
    pub received: Mutex<Vec<Received>>,
}

#[derive(Clone, Debug)]
pub struct Received {
    pub text: String,
    pub text_ptr: usize,
    pub thread: ThreadId,
}

impl Logger {
    fn on_msg(&self, event: MessageEvent) -> anyhow::Result<()> {
        self.received.lock().unwrap().push(Received {
            text_ptr: event.text.as_ptr() as usize,
            text: event.text,
            thread: std::thread::current().id(),
        });
        Ok(())
    }

    #[allow(dead_code)]
    pub fn texts(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }
}

impl Subscriber for Logger {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on(ThreadPolicy::Inline, Self::on_msg);
    }
}

/// Keeps every `ListEvent` copy it receives.
#[allow(dead_code)]
#[derive(Default)]
pub struct ListKeeper {
    pub kept: Mutex<Vec<ListEvent>>,
}

impl Subscriber for ListKeeper {
    fn declare(handlers: &mut Handlers<Self>) {
        handlers.on(ThreadPolicy::Inline, |s: &Self, event: ListEvent| {
            s.kept.lock().unwrap().push(event);
            Ok(())
        });
    }
}

/// Sink that keeps failures for inspection.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    pub failures: Mutex<Vec<DispatchFailure>>,
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, failure: &DispatchFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}
