//! # chainring-core
//!
//! Core traits for the Chainring staged event dispatch engine.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! handler libraries that don't need the registry, compiler or event bus
//! provided by `chainring-std`.
//!
//! # Building Blocks
//!
//! ## Events ([`Routable`], [`Event`])
//!
//! Anything carrying a routing key can be dispatched. [`Event`] is the
//! general-purpose record; its routing key defaults to `/{event}/{tag}/{key}`.
//!
//! ## Handlers ([`EventHandler`], [`ChainHandler`])
//!
//! Named units of work. Terminal handlers just process the event; chaining
//! handlers receive a [`Next`] continuation and may short-circuit.
//!
//! ## Chains ([`Chain`])
//!
//! Immutable, ordered handler sequences compiled from rules. Executing a
//! chain yields one failure type, [`HandleError`].
//!
//! ## Resolution ([`ChainResolver`])
//!
//! Picks the chain for a routing key, falling back to a default chain.
//!
//! # Error Types
//!
//! - [`ChainringError`] - Top-level startup error type
//! - [`RegistryError`] / [`CompileError`] - Fatal configuration errors
//! - [`HandleError`] / [`EventHandleFailure`] - Per-event failures
//! - [`BusError`] - Event bus lifecycle errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod chain;
mod error;
mod event;
mod handler;
mod resolver;

// Re-exports
pub use chain::{Chain, Next};
pub use error::{
    BoxError, BusError, ChainringError, CompileError, EventHandleFailure, HandleError,
    RegistryError,
};
pub use event::{Delivery, Event, Routable};
pub use handler::{ChainHandler, EnabledHandle, EventHandler, HandlerEntry, HandlerKind};
pub use resolver::ChainResolver;
