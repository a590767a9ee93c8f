//! Dispatch stages.
//!
//! A [`DispatchStage`] is the consumer the bus invokes for every delivered
//! slot. It resolves the event's routing key to a chain and executes it.

use crate::bus::Consumer;
use chainring_core::{Chain, ChainResolver, Delivery, HandleError, Routable};
use std::fmt;

/// One dispatch unit of a pipeline.
///
/// Without a resolver every event runs the default chain, which the engine
/// builds from all registered handlers in registration order.
pub struct DispatchStage<E> {
    name: String,
    priority: i32,
    resolver: Option<Box<dyn ChainResolver<E>>>,
    default_chain: Chain<E>,
}

impl<E: Routable> DispatchStage<E> {
    /// A stage that runs `default_chain` for every event.
    pub fn new(name: impl Into<String>, priority: i32, default_chain: Chain<E>) -> Self {
        Self {
            name: name.into(),
            priority,
            resolver: None,
            default_chain,
        }
    }

    /// Resolve chains through `resolver`, falling back to the default chain.
    pub fn with_resolver(mut self, resolver: impl ChainResolver<E> + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower priorities run first in a sequential pipeline.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Chain run when no route matches.
    pub fn default_chain(&self) -> &Chain<E> {
        &self.default_chain
    }

    /// The chain `routing_key` resolves to.
    pub fn resolve(&self, routing_key: &str) -> &Chain<E> {
        match &self.resolver {
            Some(resolver) => resolver.resolve(routing_key, &self.default_chain),
            None => &self.default_chain,
        }
    }

    /// Resolve and execute the chain for `event`.
    ///
    /// The routing key is read once, before the chain runs.
    pub fn dispatch(&self, event: &mut E, delivery: &Delivery) -> Result<(), HandleError> {
        let chain = self.resolve(event.routing_key());
        tracing::trace!(
            stage = %self.name,
            sequence = delivery.sequence,
            chain = %chain.name(),
            "dispatching event"
        );
        chain.execute(event, delivery)
    }
}

impl<E: Routable> Consumer<E> for DispatchStage<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(
        &mut self,
        event: &mut E,
        sequence: i64,
        end_of_batch: bool,
    ) -> Result<(), HandleError> {
        self.dispatch(event, &Delivery::new(sequence, end_of_batch))
    }

    fn on_start(&mut self) -> Result<(), HandleError> {
        tracing::info!(stage = %self.name, priority = self.priority, "dispatch stage started");
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), HandleError> {
        tracing::info!(stage = %self.name, "dispatch stage stopped");
        Ok(())
    }
}

impl<E> fmt::Debug for DispatchStage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchStage")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("has_resolver", &self.resolver.is_some())
            .field("default_chain", &self.default_chain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::HandlerRegistry,
        resolver::PathMatchingResolver,
        rules::{RuleCompiler, RuleSet},
        testing::RecordingHandler,
    };
    use chainring_core::Event;

    #[test]
    fn executes_resolved_chain_or_default() {
        let recorder = RecordingHandler::new();
        let mut registry = HandlerRegistry::new();
        for name in ["validate", "persist", "notify"] {
            registry.register_terminal(name, recorder.clone()).unwrap();
        }
        let rules = RuleSet::from_pairs([("/order/**", "validate,persist")]).unwrap();
        let compiled = RuleCompiler::new(&registry).compile(&rules).unwrap();
        let mut stage = DispatchStage::new("main", 0, registry.default_chain())
            .with_resolver(PathMatchingResolver::new(compiled));

        let mut order = Event::new("order", "create", "1");
        stage.on_event(&mut order, 0, true).unwrap();
        assert_eq!(recorder.names(), vec!["validate", "persist"]);

        recorder.clear();
        let mut user = Event::new("user", "create", "1");
        stage.on_event(&mut user, 1, true).unwrap();
        assert_eq!(recorder.names(), vec!["validate", "persist", "notify"]);
    }

    #[test]
    fn without_resolver_runs_default_chain() {
        let recorder = RecordingHandler::new();
        let mut registry = HandlerRegistry::new();
        registry.register_terminal("only", recorder.clone()).unwrap();
        let stage = DispatchStage::new("plain", 3, registry.default_chain());
        assert_eq!(stage.resolve("/anything").name(), "default");

        let mut event = Event::routed("/anything");
        stage.dispatch(&mut event, &Delivery::new(4, false)).unwrap();
        assert_eq!(recorder.records()[0].sequence, 4);
        assert!(!recorder.records()[0].end_of_batch);
    }
}
