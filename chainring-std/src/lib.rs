//! # chainring-std
//!
//! Standard implementations for the Chainring staged event dispatch engine.
//!
//! This crate provides:
//! - **Registry**: [`registry::HandlerRegistry`], the owner of every named handler
//! - **Rules**: Ant-style [`pattern`]s, [`rules::RuleSet`] and the [`rules::RuleCompiler`]
//! - **Resolution**: [`resolver::PathMatchingResolver`], first match in declaration order
//! - **Dispatch**: [`stage::DispatchStage`], the consumer attached to the bus
//! - **Event bus**: the ring buffer in [`bus`], with translators and fault handlers
//! - **Pipeline**: [`pipeline::PipelineBuilder`] and the [`pipeline::Pipeline`] lifecycle
//! - **Bootstrap**: [`config`], [`discovery`] and [`engine::Engine`]
//! - **Handlers**: ready-made [`handlers`] and [`testing`] utilities

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use chainring_core;

pub mod bus;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod handlers;
pub mod pattern;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod stage;
pub mod testing;
