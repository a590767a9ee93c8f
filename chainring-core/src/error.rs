//! Error types for Chainring.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`ChainringError`] - Top-level error type for startup operations
//! - [`RegistryError`] - Errors while registering or looking up handlers
//! - [`CompileError`] - Errors while compiling routing rules into chains
//! - [`HandleError`] - The single failure type produced by chain execution
//! - [`BusError`] - Errors raised by the event bus lifecycle
//!
//! Startup errors (registry, compile, bus construction) are fatal: a pipeline
//! is never partially initialized. Per-event errors ([`HandleError`]) are
//! isolated to the event that caused them and reported to a fault handler.

use std::io;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all startup operations.
#[derive(Error, Debug)]
pub enum ChainringError {
    /// An error occurred while building the handler registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// An error occurred while compiling routing rules.
    #[error("rule compilation error: {0}")]
    Compile(#[from] CompileError),

    /// An error occurred in the event bus.
    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors that can occur in the handler registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler with this name is already registered.
    #[error("a handler named `{0}` is already registered")]
    DuplicateHandlerName(String),

    /// No handler with this name is registered.
    #[error("no handler named `{0}` is registered")]
    NotFound(String),
}

/// Errors that can occur while compiling rules into chains.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A rule references a handler name the registry does not know.
    #[error("rule `{pattern}` references unknown handler `{handler}`")]
    UnresolvedHandlerReference {
        /// The missing handler name.
        handler: String,
        /// The pattern of the offending rule.
        pattern: String,
    },

    /// A line of a textual rule block is not of the form `pattern = handlers`.
    #[error("malformed rule on line {line}: `{content}`")]
    MalformedRule {
        /// 1-based line number within the rule block.
        line: usize,
        /// The offending line, trimmed.
        content: String,
    },

    /// A rule line has an empty pattern.
    #[error("empty pattern on line {line}")]
    EmptyPattern {
        /// 1-based line number within the rule block.
        line: usize,
    },

    /// A rule declares no handler names.
    #[error("rule `{pattern}` declares no handlers")]
    EmptyChainDefinition {
        /// The pattern of the offending rule.
        pattern: String,
    },
}

/// A non-I/O failure raised while executing a chain.
///
/// Wraps the original cause together with the name of the handler that
/// produced it, so a dispatch stage sees one failure shape regardless of
/// which handler failed.
#[derive(Error, Debug)]
#[error("event handling failed in handler `{handler}`")]
pub struct EventHandleFailure {
    handler: String,
    #[source]
    cause: BoxError,
}

impl EventHandleFailure {
    /// Wrap `cause` as a failure of `handler`.
    pub fn new(handler: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            handler: handler.into(),
            cause: cause.into(),
        }
    }

    /// Name of the handler that failed.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// The original error.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }

    /// Consume the failure, returning the original error.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

/// The failure type returned by chain execution and dispatch stages.
#[derive(Error, Debug)]
pub enum HandleError {
    /// An I/O failure, passed through unchanged so callers can apply
    /// transport-specific recovery.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Any other failure.
    #[error(transparent)]
    Failure(#[from] EventHandleFailure),
}

impl HandleError {
    /// Classify an error raised by the handler named `handler`.
    ///
    /// Errors that already are a [`HandleError`] or an [`EventHandleFailure`]
    /// (typically propagated from a continuation) are returned unchanged.
    /// `std::io::Error` maps to [`HandleError::Io`]. Everything else is
    /// wrapped into an [`EventHandleFailure`].
    pub fn from_handler(handler: &str, err: BoxError) -> Self {
        let err = match err.downcast::<HandleError>() {
            Ok(handled) => return *handled,
            Err(err) => err,
        };
        let err = match err.downcast::<EventHandleFailure>() {
            Ok(failure) => return HandleError::Failure(*failure),
            Err(err) => err,
        };
        match err.downcast::<io::Error>() {
            Ok(io) => HandleError::Io(*io),
            Err(cause) => HandleError::Failure(EventHandleFailure::new(handler, cause)),
        }
    }

    /// Returns `true` for I/O failures.
    pub fn is_io(&self) -> bool {
        matches!(self, HandleError::Io(_))
    }

    /// Returns the wrapped failure, if this is not an I/O error.
    pub fn as_failure(&self) -> Option<&EventHandleFailure> {
        match self {
            HandleError::Failure(failure) => Some(failure),
            HandleError::Io(_) => None,
        }
    }
}

/// Errors raised by the event bus.
#[derive(Error, Debug)]
pub enum BusError {
    /// The ring capacity is zero or not a power of two.
    #[error("ring buffer size must be a power of two, got {0}")]
    InvalidCapacity(usize),

    /// The bus was already started; consumers can no longer be attached.
    #[error("event bus has already been started")]
    AlreadyStarted,

    /// The bus has not been started yet.
    #[error("event bus has not been started")]
    NotStarted,

    /// The bus is shutting down or has shut down; no new events are accepted.
    #[error("event bus has been shut down")]
    ShutDown,

    /// The translator panicked while filling the slot at `sequence`.
    ///
    /// The slot is still published, marked discarded, so consumers skip it
    /// and the bus keeps running.
    #[error("translator panicked while filling sequence {sequence}: {message}")]
    TranslatorPanicked {
        /// Sequence of the discarded slot.
        sequence: i64,
        /// The panic message.
        message: String,
    },
}

// Convenience conversions
impl From<BoxError> for ChainringError {
    fn from(err: BoxError) -> Self {
        ChainringError::Custom(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn io_errors_pass_through_unchanged() {
        let err: BoxError = Box::new(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        match HandleError::from_handler("persist", err) {
            HandleError::Io(io) => assert_eq!(io.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_are_wrapped_with_handler_name() {
        let err = HandleError::from_handler("validate", Box::new(Boom));
        let failure = err.as_failure().expect("wrapped failure");
        assert_eq!(failure.handler(), "validate");
        assert_eq!(failure.cause().to_string(), "boom");
    }

    #[test]
    fn already_classified_errors_are_not_wrapped_twice() {
        let inner = HandleError::from_handler("inner", Box::new(Boom));
        let outer = HandleError::from_handler("outer", Box::new(inner));
        assert_eq!(outer.as_failure().map(|f| f.handler()), Some("inner"));

        let failure = EventHandleFailure::new("deep", Boom);
        let outer = HandleError::from_handler("outer", Box::new(failure));
        assert_eq!(outer.as_failure().map(|f| f.handler()), Some("deep"));
    }
}
