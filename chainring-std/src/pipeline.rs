//! # Stage pipeline
//!
//! [`PipelineBuilder`] orders dispatch stages by priority and attaches them
//! to an event bus as a chain of dependent consumer groups:
//!
//! ```text
//! cursor ──▶ stage (priority 0) ──then──▶ stage (priority 1) ──then──▶ ...
//! ```
//!
//! Every event passes through every stage in priority order; a stage never
//! sees sequence N before the previous stage has finished N. Ties keep
//! declaration order.
//!
//! [`Pipeline`] is the lifecycle object: nothing runs until
//! [`start`](Pipeline::start), and [`stop`](Pipeline::stop) drains
//! in-flight events before joining the workers.

use crate::bus::{EventBus, FaultHandler, LoggingFaultHandler, ProducerType, Publisher, WaitStrategy};
use crate::config::{DEFAULT_ENGINE_NAME, DEFAULT_RING_BUFFER_SIZE, EngineConfig};
use crate::stage::DispatchStage;
use chainring_core::{BusError, Routable};
use std::sync::Arc;

/// Name and priority of an attached stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Stage name.
    pub name: String,
    /// Lower runs first.
    pub priority: i32,
}

/// Builds a [`Pipeline`] from dispatch stages.
pub struct PipelineBuilder<E> {
    name: String,
    capacity: usize,
    producer: ProducerType,
    wait_strategy: WaitStrategy,
    factory: Box<dyn FnMut() -> E>,
    fault_handler: Arc<dyn FaultHandler<E>>,
    stages: Vec<DispatchStage<E>>,
}

impl<E: Routable> PipelineBuilder<E> {
    /// Create a builder whose slots are pre-allocated by `factory`.
    pub fn new(factory: impl FnMut() -> E + 'static) -> Self {
        Self {
            name: DEFAULT_ENGINE_NAME.to_string(),
            capacity: DEFAULT_RING_BUFFER_SIZE,
            producer: ProducerType::default(),
            wait_strategy: WaitStrategy::default(),
            factory: Box::new(factory),
            fault_handler: Arc::new(LoggingFaultHandler),
            stages: Vec::new(),
        }
    }

    /// Take name, capacity, producer type and wait strategy from `config`.
    pub fn from_config(config: &EngineConfig, factory: impl FnMut() -> E + 'static) -> Self {
        Self::new(factory)
            .name(config.name.as_str())
            .capacity(config.ring_buffer_size)
            .producer(config.producer)
            .wait_strategy(config.wait_strategy)
    }

    /// Bus name, used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of ring slots. Must be a power of two.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Single or multiple concurrent publishers.
    pub fn producer(mut self, producer: ProducerType) -> Self {
        self.producer = producer;
        self
    }

    /// How idle consumers wait for the next sequence.
    pub fn wait_strategy(mut self, wait_strategy: WaitStrategy) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    /// Where event failures are reported. Defaults to [`LoggingFaultHandler`].
    pub fn fault_handler(mut self, handler: impl FaultHandler<E> + 'static) -> Self {
        self.fault_handler = Arc::new(handler);
        self
    }

    /// Report event failures to a fault handler shared with other owners.
    pub fn shared_fault_handler(mut self, handler: Arc<dyn FaultHandler<E>>) -> Self {
        self.fault_handler = handler;
        self
    }

    /// Add a stage.
    pub fn stage(mut self, stage: DispatchStage<E>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Add several stages.
    pub fn stages(mut self, stages: impl IntoIterator<Item = DispatchStage<E>>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Create the bus and attach the stages in priority order.
    ///
    /// The pipeline is returned stopped.
    pub fn build(self) -> Result<Pipeline<E>, BusError> {
        let Self {
            name,
            capacity,
            producer,
            wait_strategy,
            factory,
            fault_handler,
            mut stages,
        } = self;

        // stable: equal priorities keep declaration order
        stages.sort_by_key(|s| s.priority());
        let infos: Vec<StageInfo> = stages
            .iter()
            .map(|s| StageInfo {
                name: s.name().to_string(),
                priority: s.priority(),
            })
            .collect();

        let mut bus = EventBus::new(factory, capacity, producer, wait_strategy)?.with_name(name);
        bus.set_fault_handler(fault_handler);

        let mut stages = stages.into_iter();
        if let Some(first) = stages.next() {
            tracing::info!(stage = first.name(), priority = first.priority(), "attaching stage");
            let mut group = bus.handle_events_with(first)?;
            for stage in stages {
                tracing::info!(
                    stage = stage.name(),
                    priority = stage.priority(),
                    "attaching dependent stage"
                );
                group = group.then(stage)?;
            }
        }

        Ok(Pipeline { bus, stages: infos })
    }
}

/// A built pipeline: the event bus with its stages attached.
///
/// Dropping a running pipeline stops it.
pub struct Pipeline<E> {
    bus: EventBus<E>,
    stages: Vec<StageInfo>,
}

impl<E: Send + 'static> Pipeline<E> {
    /// Start one worker per stage.
    pub fn start(&mut self) -> Result<(), BusError> {
        self.bus.start()
    }

    /// Stop accepting events, drain in-flight events and join the workers.
    pub fn stop(&mut self) -> Result<(), BusError> {
        self.bus.shutdown()
    }

    /// A handle for publishing events.
    pub fn publisher(&self) -> Publisher<E> {
        self.bus.publisher()
    }

    /// Attached stages, in execution order.
    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    /// Whether the workers are running.
    pub fn is_running(&self) -> bool {
        self.bus.is_running()
    }

    /// Highest published sequence.
    pub fn cursor(&self) -> i64 {
        self.bus.cursor()
    }
}
