//! Testing utilities for Chainring.
//!
//! This module provides handlers and fault sinks that make chain and
//! pipeline behaviour observable in tests.
//!
//! # Features
//!
//! - [`RecordingHandler`]: records every invocation, shared across clones
//! - [`FailingHandler`]: always fails, with an I/O or a generic error
//! - [`GuardHandler`]: a chaining handler that can block the rest of the chain
//! - [`CollectingFaultHandler`]: a fault handler that keeps every reported fault

use crate::bus::FaultHandler;
use chainring_core::{BoxError, ChainHandler, Delivery, EventHandler, HandleError, Next, Routable};
use parking_lot::Mutex;
use std::io;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

// ============================================================================
// Recording Handler
// ============================================================================

/// One recorded handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Name the handler was registered under.
    pub handler: String,
    /// Routing key of the event.
    pub routing_key: String,
    /// Delivery sequence.
    pub sequence: i64,
    /// Delivery end-of-batch flag.
    pub end_of_batch: bool,
}

/// A terminal handler that records every invocation.
///
/// Clones share one log, so the same recorder can be registered under
/// several names to observe the execution order of a whole chain.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = RecordingHandler::new();
/// registry.register_terminal("validate", recorder.clone())?;
/// registry.register_terminal("persist", recorder.clone())?;
///
/// chain.execute(&mut event, &Delivery::standalone())?;
/// assert_eq!(recorder.names(), vec!["validate", "persist"]);
/// ```
#[derive(Clone, Default)]
pub struct RecordingHandler {
    name: String,
    log: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingHandler {
    /// Create a recorder with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the recorded invocations.
    pub fn records(&self) -> Vec<Invocation> {
        self.log.lock().clone()
    }

    /// Names of the invoked handlers, in invocation order.
    pub fn names(&self) -> Vec<String> {
        self.log.lock().iter().map(|r| r.handler.clone()).collect()
    }

    /// Invocations of the handler registered as `handler`.
    pub fn records_for(&self, handler: &str) -> Vec<Invocation> {
        self.log
            .lock()
            .iter()
            .filter(|r| r.handler == handler)
            .cloned()
            .collect()
    }

    /// Get the number of recorded invocations.
    pub fn count(&self) -> usize {
        self.log.lock().len()
    }

    /// Clear the log.
    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl<E: Routable> EventHandler<E> for RecordingHandler {
    fn handle(&self, event: &mut E, delivery: &Delivery) -> Result<(), BoxError> {
        self.log.lock().push(Invocation {
            handler: self.name.clone(),
            routing_key: event.routing_key().to_string(),
            sequence: delivery.sequence,
            end_of_batch: delivery.end_of_batch,
        });
        Ok(())
    }

    fn bind_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

// ============================================================================
// Failing Handler
// ============================================================================

#[derive(Debug, Clone)]
enum FailureMode {
    Io(io::ErrorKind, String),
    Generic(String),
}

/// A terminal handler that fails on every invocation.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    mode: FailureMode,
    calls: Arc<AtomicUsize>,
}

impl FailingHandler {
    /// Fail with a `std::io::Error` of the given kind.
    pub fn io(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Io(kind, message.into()),
            calls: Arc::default(),
        }
    }

    /// Fail with a generic, non-I/O error.
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Generic(message.into()),
            calls: Arc::default(),
        }
    }

    /// Number of invocations so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

impl<E: Send + 'static> EventHandler<E> for FailingHandler {
    fn handle(&self, _event: &mut E, _delivery: &Delivery) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let err: BoxError = match &self.mode {
            FailureMode::Io(kind, message) => Box::new(io::Error::new(*kind, message.clone())),
            FailureMode::Generic(message) => message.clone().into(),
        };
        Err(err)
    }
}

// ============================================================================
// Guard Handler
// ============================================================================

/// A chaining handler that proceeds only while open.
///
/// A closed guard short-circuits: the handlers after it never run.
#[derive(Debug, Clone)]
pub struct GuardHandler {
    open: Arc<AtomicBool>,
    passed: Arc<AtomicUsize>,
    blocked: Arc<AtomicUsize>,
}

impl GuardHandler {
    /// An open guard.
    pub fn open() -> Self {
        Self::with_state(true)
    }

    /// A closed guard.
    pub fn closed() -> Self {
        Self::with_state(false)
    }

    fn with_state(open: bool) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(open)),
            passed: Arc::default(),
            blocked: Arc::default(),
        }
    }

    /// Open or close the guard. Shared across clones.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// Events that were allowed through.
    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::Acquire)
    }

    /// Events that were stopped.
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::Acquire)
    }
}

impl<E: Send + 'static> ChainHandler<E> for GuardHandler {
    fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<(), BoxError> {
        if self.open.load(Ordering::Acquire) {
            self.passed.fetch_add(1, Ordering::AcqRel);
            next.proceed(event)?;
        } else {
            self.blocked.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

// ============================================================================
// Collecting Fault Handler
// ============================================================================

/// One fault reported to a [`CollectingFaultHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Sequence of the failed event.
    pub sequence: i64,
    /// Failing handler, for non-I/O failures.
    pub handler: Option<String>,
    /// Error kind, for I/O failures.
    pub io_kind: Option<io::ErrorKind>,
    /// Display of the original cause.
    pub message: String,
}

/// A fault handler that keeps every event fault for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingFaultHandler {
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl CollectingFaultHandler {
    /// An empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the collected faults.
    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().clone()
    }

    /// Number of collected faults.
    pub fn count(&self) -> usize {
        self.faults.lock().len()
    }

    /// Returns `true` if no fault was collected.
    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl<E> FaultHandler<E> for CollectingFaultHandler {
    fn handle_event_fault(&self, error: &HandleError, sequence: i64, _event: &E) {
        let fault = match error {
            HandleError::Io(io) => Fault {
                sequence,
                handler: None,
                io_kind: Some(io.kind()),
                message: io.to_string(),
            },
            HandleError::Failure(failure) => Fault {
                sequence,
                handler: Some(failure.handler().to_string()),
                io_kind: None,
                message: failure.cause().to_string(),
            },
        };
        self.faults.lock().push(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainring_core::{Chain, EnabledHandle, Event, HandlerEntry, HandlerKind};

    fn entry(name: &str, kind: HandlerKind<Event>) -> Arc<HandlerEntry<Event>> {
        Arc::new(HandlerEntry::new(name, kind, EnabledHandle::default()))
    }

    #[test]
    fn closed_guard_short_circuits() {
        let recorder = RecordingHandler::new();
        let guard = GuardHandler::closed();
        let chain = Chain::new(
            "guarded",
            vec![
                entry("before", HandlerKind::terminal(recorder.clone())),
                entry("guard", HandlerKind::chaining(guard.clone())),
                entry("after", HandlerKind::terminal(recorder.clone())),
            ],
        );
        let mut event = Event::routed("/x");
        chain.execute(&mut event, &Delivery::standalone()).unwrap();
        assert_eq!(recorder.names(), vec!["before"]);
        assert_eq!(guard.blocked(), 1);

        guard.set_open(true);
        recorder.clear();
        chain.execute(&mut event, &Delivery::standalone()).unwrap();
        assert_eq!(recorder.names(), vec!["before", "after"]);
        assert_eq!(guard.passed(), 1);
    }

    #[test]
    fn guard_propagates_downstream_failure() {
        let failing = FailingHandler::generic("downstream broke");
        let chain = Chain::new(
            "guarded",
            vec![
                entry("guard", HandlerKind::chaining(GuardHandler::open())),
                entry("broken", HandlerKind::terminal(failing.clone())),
            ],
        );
        let err = chain
            .execute(&mut Event::routed("/x"), &Delivery::standalone())
            .unwrap_err();
        // the failure names the handler that raised it, not the guard
        assert_eq!(err.as_failure().unwrap().handler(), "broken");
        assert_eq!(failing.calls(), 1);
    }

    #[test]
    fn collects_both_fault_kinds() {
        let sink = CollectingFaultHandler::new();
        let io = HandleError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let generic = HandleError::from_handler("persist", "nope".into());
        FaultHandler::<()>::handle_event_fault(&sink, &io, 1, &());
        FaultHandler::<()>::handle_event_fault(&sink, &generic, 2, &());

        let faults = sink.faults();
        assert_eq!(faults[0].io_kind, Some(io::ErrorKind::TimedOut));
        assert_eq!(faults[1].handler.as_deref(), Some("persist"));
        assert_eq!(faults[1].message, "nope");
    }
}
