//! # Chains
//!
//! A [`Chain`] is an ordered, immutable sequence of registered handlers
//! produced by compiling one rule. Chains hold shared references to the
//! registry's [`HandlerEntry`] values; cloning a chain is cheap.
//!
//! # Execution
//!
//! ```text
//! validate (terminal) ──▶ guard (chaining) ──next.proceed()──▶ persist (terminal)
//!                              │
//!                              └── returns without proceeding: persist never runs
//! ```
//!
//! - Terminal handlers run in order; the chain continues after each one.
//! - A chaining handler receives a [`Next`] for the remaining handlers and
//!   owns the decision to run them.
//! - Disabled handlers are skipped.
//! - Failures are classified by [`HandleError::from_handler`]: I/O errors
//!   pass through, everything else becomes an `EventHandleFailure`.

use crate::{
    error::HandleError,
    event::Delivery,
    handler::{HandlerEntry, HandlerKind},
};
use std::fmt;
use std::sync::Arc;

/// An ordered, immutable sequence of handlers.
pub struct Chain<E> {
    name: Arc<str>,
    handlers: Arc<[Arc<HandlerEntry<E>>]>,
}

impl<E> Chain<E> {
    /// Create a chain. `name` identifies it in logs, usually the rule pattern.
    pub fn new(name: impl Into<Arc<str>>, handlers: Vec<Arc<HandlerEntry<E>>>) -> Self {
        Self {
            name: name.into(),
            handlers: handlers.into(),
        }
    }

    /// A chain with no handlers.
    pub fn empty(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Vec::new())
    }

    /// The chain's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of handlers, including disabled ones.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in execution order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Handler entries in execution order.
    pub fn handlers(&self) -> &[Arc<HandlerEntry<E>>] {
        &self.handlers
    }

    /// Execute the chain against `event`.
    pub fn execute(&self, event: &mut E, delivery: &Delivery) -> Result<(), HandleError> {
        self.run_from(0, event, delivery)
    }

    fn run_from(
        &self,
        mut position: usize,
        event: &mut E,
        delivery: &Delivery,
    ) -> Result<(), HandleError> {
        while let Some(entry) = self.handlers.get(position) {
            position += 1;
            if !entry.is_enabled() {
                tracing::trace!(chain = %self.name, handler = %entry.name(), "skipping disabled handler");
                continue;
            }
            match entry.kind() {
                HandlerKind::Terminal(handler) => handler
                    .handle(event, delivery)
                    .map_err(|e| HandleError::from_handler(entry.name(), e))?,
                HandlerKind::Chaining(handler) => {
                    let next = Next {
                        chain: self,
                        position,
                        delivery,
                    };
                    return handler
                        .handle(event, next)
                        .map_err(|e| HandleError::from_handler(entry.name(), e));
                }
            }
        }
        Ok(())
    }
}

impl<E> Clone for Chain<E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<E> fmt::Debug for Chain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("handlers", &self.handler_names())
            .finish()
    }
}

/// The continuation handed to a [`ChainHandler`](crate::ChainHandler):
/// "invoke the remaining handlers".
pub struct Next<'a, E> {
    chain: &'a Chain<E>,
    position: usize,
    delivery: &'a Delivery,
}

impl<'a, E> Next<'a, E> {
    /// Run the rest of the chain. Consumes the continuation.
    pub fn proceed(self, event: &mut E) -> Result<(), HandleError> {
        self.chain.run_from(self.position, event, self.delivery)
    }

    /// Delivery metadata of the current event.
    pub fn delivery(&self) -> &'a Delivery {
        self.delivery
    }

    /// Index of the first handler `proceed` would run.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of handlers left in the chain, including disabled ones.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.position)
    }

    /// The chain being executed.
    pub fn chain(&self) -> &'a Chain<E> {
        self.chain
    }
}
