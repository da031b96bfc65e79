//! eventbus - An in-process publish/subscribe event bus.
//!
//! This crate provides typed event dispatch with features including:
//! - Per-type handler declaration, resolved once and cached
//! - Delivery inline, on a host main thread, or on a bounded worker pool
//! - A fresh copy of the event for every handler invocation
//! - Handler failures isolated from publishers and sibling handlers

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod subscriber;
pub mod task;

pub use config::Config;
pub use config::PoolConfig;
pub use error::BusError;
pub use event::DataEvent;
pub use event::Event;
pub use event::diagnostics::DiagnosticSink;
pub use event::diagnostics::DispatchFailure;
pub use event::diagnostics::FailureStage;
pub use event::diagnostics::LogSink;
pub use event::event_bus::BusOptions;
pub use event::event_bus::BusOptionsBuilder;
pub use event::event_bus::EventBus;
pub use logging::setup_logging;
pub use subscriber::Handlers;
pub use subscriber::Subscriber;
pub use subscriber::handler::HandlerDescriptor;
pub use subscriber::handler::ThreadPolicy;
pub use task::main_loop::MainExecutor;
pub use task::main_loop::MainHandle;
pub use task::main_loop::MainLoop;
pub use task::worker_pool::WorkerPool;
