//! # chainring - Staged Event Dispatch
//!
//! `chainring` routes events published into a ring buffer to named, ordered
//! handler chains. Chains are compiled at startup from declarative
//! `pattern = handler, handler` rules; each event's routing key selects the
//! first matching pattern in declaration order.
//!
//! Dispatch stages run as dependent consumer groups over the same buffer:
//! every event passes through every stage, in priority order.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chainring::prelude::*;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     [[stages]]
//!     name = "main"
//!     definitions = """
//!     [rules]
//!     /order/** = validate, persist
//!     """
//! "#)?;
//!
//! let mut engine = Engine::<Event>::builder(config)
//!     .terminal("validate", Validate)
//!     .terminal("persist", Persist)
//!     .terminal("notify", Notify)
//!     .build()?;
//!
//! engine.start()?;
//! // runs validate, persist
//! engine.publisher().publish_event(&Event::new("order", "created", "42"))?;
//! // no rule matches: runs validate, persist, notify
//! engine.publisher().publish_event(&Event::new("user", "created", "7"))?;
//! engine.stop()?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use chainring_core::{
    // Error types
    BoxError,
    BusError,
    // Chains
    Chain,
    // Handlers
    ChainHandler,
    // Resolution
    ChainResolver,
    ChainringError,
    CompileError,
    // Events
    Delivery,
    EnabledHandle,
    Event,
    EventHandleFailure,
    EventHandler,
    HandleError,
    HandlerEntry,
    HandlerKind,
    Next,
    RegistryError,
    Routable,
};

pub use chainring_std::{
    config::{ConfigError, EngineConfig, RuleEntry, StageDefinition},
    discovery::{Component, EventRule, HandlerDescriptor},
    engine::{Engine, EngineBuilder},
    pattern::{AntPattern, ant_match},
    pipeline::{Pipeline, PipelineBuilder, StageInfo},
    registry::HandlerRegistry,
    resolver::PathMatchingResolver,
    rules::{CompiledRules, Rule, RuleCompiler, RuleSet},
    stage::DispatchStage,
};

/// The ring-buffer event bus.
pub mod bus {
    pub use chainring_std::bus::{
        Consumer, ConsumerGroup, CopyTranslator, EventBus, EventTagKeyTranslator,
        EventTagTranslator, EventTranslator, EventTranslatorOneArg, EventTranslatorThreeArg,
        EventTranslatorTwoArg, FaultHandler, LoggingFaultHandler, ProducerType, Publisher,
        WaitStrategy,
    };
}

/// Standard handler implementations.
pub mod handlers {
    pub use chainring_std::handlers::LoggingHandler;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use chainring_std::testing::*;
}

/// Prelude module - common imports for Chainring.
///
/// # Usage
///
/// ```rust,ignore
/// use chainring::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bus::{FaultHandler, ProducerType, Publisher, WaitStrategy};
    pub use crate::{
        BoxError, ChainHandler, ChainringError, Delivery, Engine, EngineConfig, Event,
        EventHandler, HandleError, HandlerDescriptor, Next, Routable, StageDefinition,
    };
}
