//! # Engine bootstrap
//!
//! [`Engine::builder`] runs the startup sequence in one place:
//!
//! 1. validate the configuration
//! 2. register every announced handler
//! 3. seed stage rule sets from handler rules and stage definitions
//! 4. compile each stage's rules against the registry
//! 5. build the pipeline, stages ordered by priority
//!
//! Any failure aborts the sequence with a [`ChainringError`] before a
//! single worker is spawned. The returned engine is stopped; call
//! [`Engine::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = Engine::<Event>::builder(EngineConfig::default())
//!     .handler(HandlerDescriptor::terminal("validate", Validate).with_rule("/order/**"))
//!     .handler(HandlerDescriptor::terminal("persist", Persist).with_rule("/order/**"))
//!     .build()?;
//! engine.start()?;
//! engine.publisher().publish_event(&Event::new("order", "created", "42"))?;
//! engine.stop()?;
//! ```

use crate::bus::{FaultHandler, LoggingFaultHandler, Publisher};
use crate::config::{ConfigError, EngineConfig, StageDefinition};
use crate::discovery::{Component, EventRule, HandlerDescriptor, plan_stages};
use crate::pipeline::{Pipeline, PipelineBuilder, StageInfo};
use crate::registry::HandlerRegistry;
use crate::resolver::PathMatchingResolver;
use crate::rules::RuleCompiler;
use crate::stage::DispatchStage;
use chainring_core::{
    BusError, ChainHandler, ChainringError, EnabledHandle, EventHandler, RegistryError, Routable,
};
use std::sync::Arc;

/// A configured dispatch engine.
pub struct Engine<E> {
    registry: HandlerRegistry<E>,
    pipeline: Pipeline<E>,
}

impl<E: Routable + Default> Engine<E> {
    /// Start building an engine whose slots are created with `E::default`.
    pub fn builder(config: EngineConfig) -> EngineBuilder<E> {
        EngineBuilder::new(config, E::default)
    }
}

impl<E: Routable> Engine<E> {
    /// Start one worker per stage.
    pub fn start(&mut self) -> Result<(), BusError> {
        self.pipeline.start()
    }

    /// Drain in-flight events and stop every worker.
    pub fn stop(&mut self) -> Result<(), BusError> {
        self.pipeline.stop()
    }

    /// Whether the workers are running.
    pub fn is_running(&self) -> bool {
        self.pipeline.is_running()
    }

    /// A handle for publishing events.
    pub fn publisher(&self) -> Publisher<E> {
        self.pipeline.publisher()
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageInfo] {
        self.pipeline.stages()
    }

    /// The handle toggling the handler registered as `name`.
    pub fn enabled_handle(&self, name: &str) -> Result<EnabledHandle, RegistryError> {
        self.registry.enabled_handle(name)
    }

    /// Registered handler names, in registration order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline<E> {
        &self.pipeline
    }

    /// The underlying pipeline, mutably.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline<E> {
        &mut self.pipeline
    }
}

/// Collects components and builds an [`Engine`].
pub struct EngineBuilder<E> {
    config: EngineConfig,
    factory: Box<dyn FnMut() -> E>,
    components: Vec<Component<E>>,
    fault_handler: Arc<dyn FaultHandler<E>>,
}

impl<E: Routable> EngineBuilder<E> {
    /// Start building an engine whose slots are created by `factory`.
    pub fn new(config: EngineConfig, factory: impl FnMut() -> E + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            components: Vec::new(),
            fault_handler: Arc::new(LoggingFaultHandler),
        }
    }

    /// Announce a component.
    pub fn component(mut self, component: impl Into<Component<E>>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Announce several components.
    pub fn components<I>(mut self, components: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Component<E>>,
    {
        self.components
            .extend(components.into_iter().map(Into::into));
        self
    }

    /// Announce a handler.
    pub fn handler(self, descriptor: HandlerDescriptor<E>) -> Self {
        self.component(Component::Handler(descriptor))
    }

    /// Announce a terminal handler without a routing rule.
    pub fn terminal<H: EventHandler<E> + 'static>(self, name: impl Into<String>, handler: H) -> Self {
        self.handler(HandlerDescriptor::terminal(name, handler))
    }

    /// Announce a chaining handler without a routing rule.
    pub fn chaining<H: ChainHandler<E> + 'static>(self, name: impl Into<String>, handler: H) -> Self {
        self.handler(HandlerDescriptor::chaining(name, handler))
    }

    /// Announce a stage definition, after those of the configuration.
    pub fn dispatcher(self, definition: StageDefinition) -> Self {
        self.component(Component::Dispatcher(definition))
    }

    /// Where event failures are reported. Defaults to logging.
    pub fn fault_handler(mut self, handler: impl FaultHandler<E> + 'static) -> Self {
        self.fault_handler = Arc::new(handler);
        self
    }

    /// Run the startup sequence.
    pub fn build(self) -> Result<Engine<E>, ChainringError> {
        let Self {
            config,
            factory,
            components,
            fault_handler,
        } = self;
        config.validate()?;

        let mut registry = HandlerRegistry::new();
        let mut rules: Vec<(EventRule, String)> = Vec::new();
        let mut definitions = config.stages.clone();
        for component in components {
            match component {
                Component::Handler(descriptor) => {
                    registry.register_with_state(
                        descriptor.name.as_str(),
                        descriptor.handler,
                        descriptor.enabled,
                    )?;
                    if let Some(rule) = descriptor.rule {
                        rules.push((rule, descriptor.name));
                    }
                }
                Component::Dispatcher(definition) => {
                    if definitions.iter().any(|d| d.name == definition.name) {
                        return Err(ConfigError::DuplicateStage(definition.name).into());
                    }
                    definitions.push(definition);
                }
            }
        }
        tracing::info!(handlers = registry.len(), "handler registry built");

        let plans = plan_stages(&rules, &definitions)?;
        let default_chain = registry.default_chain();
        let compiler = RuleCompiler::new(&registry);
        let mut stages = Vec::with_capacity(plans.len());
        for plan in plans {
            let compiled = compiler.compile(&plan.rules)?;
            tracing::info!(
                stage = %plan.name,
                priority = plan.priority,
                rules = compiled.len(),
                "compiled stage"
            );
            stages.push(
                DispatchStage::new(plan.name, plan.priority, default_chain.clone())
                    .with_resolver(PathMatchingResolver::new(compiled)),
            );
        }

        let pipeline = PipelineBuilder::from_config(&config, factory)
            .shared_fault_handler(fault_handler)
            .stages(stages)
            .build()?;
        Ok(Engine { registry, pipeline })
    }
}
