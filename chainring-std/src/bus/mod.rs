//! # Event bus
//!
//! The ring buffer and its sequencing come from the [`disruptor`] crate.
//! This module adapts it to the dispatch engine's lifecycle:
//!
//! ```text
//! Publisher ──▶ producer ──▶ ring (capacity = 2^n slots)
//!                               │ cursor
//!                               ▼
//!               handle_events_with(a) ──then──▶ b ──then──▶ c
//! ```
//!
//! - Every consumer runs on its own worker thread.
//! - A consumer sees sequences strictly in publish order.
//! - A consumer attached with [`ConsumerGroup::then`] never sees sequence N
//!   before the consumer attached ahead of it has finished N.
//! - Producers wait while the ring is full.
//! - Nothing runs before [`EventBus::start`]. [`EventBus::shutdown`] stops
//!   intake, lets every consumer drain the ring, then joins the workers.
//!   Dropping a running bus does the same.
//!
//! Consumer failures and panics are reported to the bus's
//! [`FaultHandler`]; they never stop a worker. A translator that panics
//! discards its slot and the publisher gets
//! [`BusError::TranslatorPanicked`].

mod fault;
mod translator;
mod wait;

pub use fault::{FaultHandler, LoggingFaultHandler};
pub use translator::{
    CopyTranslator, EventTagKeyTranslator, EventTagTranslator, EventTranslator,
    EventTranslatorOneArg, EventTranslatorThreeArg, EventTranslatorTwoArg,
};
pub use wait::WaitStrategy;

use chainring_core::{BusError, Event, EventHandleFailure, HandleError};
use disruptor::{BusySpin, BusySpinWithSpinLoopHint, Producer, Sequence};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::thread;

/// Whether one or many threads publish concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerType {
    /// Publishers take turns on one producer handle.
    #[default]
    Single,
    /// Every publish claims its slot through its own producer handle.
    Multi,
}

/// A consumer attached to the bus.
///
/// `on_event` receives exclusive access to the slot for the duration of the
/// call. An `Err` is reported to the fault handler and processing moves on.
pub trait Consumer<E>: Send {
    /// Name used in logs and fault reports.
    fn name(&self) -> &str;

    /// Process the event at `sequence`.
    fn on_event(&mut self, event: &mut E, sequence: i64, end_of_batch: bool)
    -> Result<(), HandleError>;

    /// Called once by [`EventBus::start`], before the first event.
    fn on_start(&mut self) -> Result<(), HandleError> {
        Ok(())
    }

    /// Called once after the last event, when the worker stops.
    fn on_shutdown(&mut self) -> Result<(), HandleError> {
        Ok(())
    }
}

// ============================================================================
// Ring slots and producer handles
// ============================================================================

/// One ring entry.
struct Slot<E> {
    event: Mutex<E>,
    /// Set when the translator panicked; consumers skip the slot.
    discarded: bool,
}

/// Publishes one slot, returning its sequence.
type Sink<E> = Box<dyn Fn(&mut dyn FnMut(&mut Slot<E>)) -> Sequence + Send + Sync>;

/// Claim the next slot and fill it, retrying while the ring is full.
macro_rules! publish_into {
    ($producer:ident, $fill:ident) => {
        loop {
            match $producer.try_publish(|slot| $fill(slot)) {
                Ok(sequence) => break sequence,
                Err(_) => thread::yield_now(),
            }
        }
    };
}

/// Publishers share one single-producer handle, taking turns.
macro_rules! single_sink {
    ($producer:expr) => {{
        let producer = Mutex::new($producer);
        let sink: Sink<E> = Box::new(move |fill: &mut dyn FnMut(&mut Slot<E>)| {
            let mut producer = producer.lock();
            publish_into!(producer, fill)
        });
        sink
    }};
}

/// Every publish runs on its own clone of a multi-producer handle.
macro_rules! multi_sink {
    ($producer:expr) => {{
        let template = Mutex::new($producer);
        let sink: Sink<E> = Box::new(move |fill: &mut dyn FnMut(&mut Slot<E>)| {
            let mut producer = template.lock().clone();
            publish_into!(producer, fill)
        });
        sink
    }};
}

/// Attach the workers as a chain of dependent consumers and build the
/// producer side.
macro_rules! launch {
    ($builder:expr, $workers:ident, $sink:ident) => {{
        let mut workers = $workers.into_iter();
        match workers.next() {
            None => $sink!($builder.handle_events_with(|_, _, _| {}).build()),
            Some(first) => {
                let builder = $builder.handle_events_with(first.into_processor());
                match workers.next() {
                    None => $sink!(builder.build()),
                    Some(second) => {
                        let mut builder = builder
                            .and_then()
                            .handle_events_with(second.into_processor());
                        for worker in workers {
                            builder = builder
                                .and_then()
                                .handle_events_with(worker.into_processor());
                        }
                        $sink!(builder.build())
                    }
                }
            }
        }
    }};
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// State shared by the bus and its publishers.
struct Shared<E> {
    state: AtomicU8,
    /// `Some` while running. Dropping it drains and joins the workers.
    sink: RwLock<Option<Sink<E>>>,
    /// Highest sequence handed out to a publisher.
    cursor: AtomicI64,
}

impl<E> Shared<E> {
    fn state(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    fn closed(&self) -> BusError {
        match self.state() {
            IDLE => BusError::NotStarted,
            _ => BusError::ShutDown,
        }
    }

    /// Wait for publishers in progress, then drop the producer.
    fn close(&self) {
        let sink = self.sink.write().take();
        drop(sink);
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// A cloneable handle for publishing into the bus.
///
/// Publishing is fire-and-forget: failures raised while handling the event
/// go to the fault handler, never back to the publisher. Errors returned
/// here only describe the bus lifecycle or a failed translator.
pub struct Publisher<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for Publisher<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for Publisher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("cursor", &self.cursor())
            .finish()
    }
}

impl<E> Publisher<E> {
    fn publish_with(&self, fill: impl FnOnce(&mut E)) -> Result<i64, BusError> {
        let guard = self.shared.sink.read();
        let Some(sink) = guard.as_ref() else {
            return Err(self.shared.closed());
        };

        let mut fill = Some(fill);
        let mut panicked = None;
        let sequence = sink(&mut |slot: &mut Slot<E>| {
            slot.discarded = false;
            if let Some(fill) = fill.take() {
                let event = slot.event.get_mut();
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| fill(event))) {
                    slot.discarded = true;
                    panicked = Some(panic_message(payload));
                }
            }
        });
        drop(guard);
        self.shared.cursor.fetch_max(sequence, Ordering::AcqRel);

        match panicked {
            None => Ok(sequence),
            Some(message) => {
                tracing::error!(sequence, panic = %message, "translator panicked; slot discarded");
                Err(BusError::TranslatorPanicked { sequence, message })
            }
        }
    }

    /// Publish using a translator. Returns the assigned sequence.
    pub fn publish<T>(&self, translator: &T) -> Result<i64, BusError>
    where
        T: EventTranslator<E> + ?Sized,
    {
        self.publish_with(|event| EventTranslator::translate_to(translator, event))
    }

    /// Publish using a one-argument translator.
    pub fn publish_one<A, T>(&self, translator: &T, arg0: A) -> Result<i64, BusError>
    where
        T: EventTranslatorOneArg<E, A> + ?Sized,
    {
        self.publish_with(|event| EventTranslatorOneArg::translate_to(translator, event, arg0))
    }

    /// Publish using a two-argument translator.
    pub fn publish_two<A, B, T>(&self, translator: &T, arg0: A, arg1: B) -> Result<i64, BusError>
    where
        T: EventTranslatorTwoArg<E, A, B> + ?Sized,
    {
        self.publish_with(|event| {
            EventTranslatorTwoArg::translate_to(translator, event, arg0, arg1)
        })
    }

    /// Publish using a three-argument translator.
    pub fn publish_three<A, B, C, T>(
        &self,
        translator: &T,
        arg0: A,
        arg1: B,
        arg2: C,
    ) -> Result<i64, BusError>
    where
        T: EventTranslatorThreeArg<E, A, B, C> + ?Sized,
    {
        self.publish_with(|event| {
            EventTranslatorThreeArg::translate_to(translator, event, arg0, arg1, arg2)
        })
    }

    /// Highest published sequence, `-1` before the first publish.
    pub fn cursor(&self) -> i64 {
        self.shared.cursor.load(Ordering::Acquire)
    }
}

impl Publisher<Event> {
    /// Copy `event` into the next slot.
    pub fn publish_event(&self, event: &Event) -> Result<i64, BusError> {
        self.publish_one(&CopyTranslator, event)
    }
}

// ============================================================================
// Event bus
// ============================================================================

/// The ring-buffer event bus.
///
/// # Example
/// ```ignore
/// let mut bus = EventBus::new(Event::default, 1024, ProducerType::Multi, WaitStrategy::BusySpin)?;
/// bus.handle_events_with(validate)?.then(persist)?;
/// bus.start()?;
/// bus.publisher().publish_event(&Event::new("order", "created", "42"))?;
/// bus.shutdown()?;
/// ```
pub struct EventBus<E> {
    name: String,
    capacity: usize,
    producer: ProducerType,
    wait: WaitStrategy,
    factory: Option<Box<dyn FnMut() -> E>>,
    consumers: Vec<Box<dyn Consumer<E>>>,
    fault_handler: Arc<dyn FaultHandler<E>>,
    shared: Arc<Shared<E>>,
}

impl<E: Send + 'static> EventBus<E> {
    /// Create a bus whose slots will be pre-allocated by `factory` on
    /// [`start`](Self::start).
    ///
    /// Fails with [`BusError::InvalidCapacity`] unless `capacity` is a
    /// non-zero power of two.
    pub fn new(
        factory: impl FnMut() -> E + 'static,
        capacity: usize,
        producer: ProducerType,
        wait: WaitStrategy,
    ) -> Result<Self, BusError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(BusError::InvalidCapacity(capacity));
        }
        Ok(Self {
            name: "chainring".to_string(),
            capacity,
            producer,
            wait,
            factory: Some(Box::new(factory)),
            consumers: Vec::new(),
            fault_handler: Arc::new(LoggingFaultHandler),
            shared: Arc::new(Shared {
                state: AtomicU8::new(IDLE),
                sink: RwLock::new(None),
                cursor: AtomicI64::new(-1),
            }),
        })
    }

    /// Name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the fault handler. Must be called before [`start`](Self::start).
    pub fn with_fault_handler(mut self, handler: impl FaultHandler<E> + 'static) -> Self {
        self.fault_handler = Arc::new(handler);
        self
    }

    /// Replace the fault handler with a shared one.
    pub fn set_fault_handler(&mut self, handler: Arc<dyn FaultHandler<E>>) {
        self.fault_handler = handler;
    }

    /// Attach a consumer that processes every published event.
    ///
    /// Each attached consumer depends on the one attached before it, so
    /// calling this on a bus that already has consumers appends to the chain.
    pub fn handle_events_with<C>(&mut self, consumer: C) -> Result<ConsumerGroup<'_, E>, BusError>
    where
        C: Consumer<E> + 'static,
    {
        self.attach(Box::new(consumer))?;
        Ok(ConsumerGroup { bus: self })
    }

    fn attach(&mut self, consumer: Box<dyn Consumer<E>>) -> Result<(), BusError> {
        if self.shared.state() != IDLE {
            return Err(BusError::AlreadyStarted);
        }
        tracing::debug!(
            bus = %self.name,
            consumer = consumer.name(),
            position = self.consumers.len(),
            "attaching consumer"
        );
        self.consumers.push(consumer);
        Ok(())
    }

    /// Allocate the ring, start one worker per attached consumer and begin
    /// accepting events.
    pub fn start(&mut self) -> Result<(), BusError> {
        if self.shared.state() != IDLE {
            return Err(BusError::AlreadyStarted);
        }
        let Some(mut factory) = self.factory.take() else {
            return Err(BusError::AlreadyStarted);
        };

        let fault_handler = &self.fault_handler;
        let workers: Vec<Worker<E>> = self
            .consumers
            .drain(..)
            .map(|consumer| Worker::start(consumer, Arc::clone(fault_handler)))
            .collect();
        let count = workers.len();
        let capacity = self.capacity;
        let slots = move || Slot {
            event: Mutex::new(factory()),
            discarded: false,
        };

        let sink = match (self.producer, self.wait) {
            (ProducerType::Single, WaitStrategy::BusySpin) => launch!(
                disruptor::build_single_producer(capacity, slots, BusySpin),
                workers,
                single_sink
            ),
            (ProducerType::Single, WaitStrategy::SpinLoopHint) => launch!(
                disruptor::build_single_producer(capacity, slots, BusySpinWithSpinLoopHint),
                workers,
                single_sink
            ),
            (ProducerType::Multi, WaitStrategy::BusySpin) => launch!(
                disruptor::build_multi_producer(capacity, slots, BusySpin),
                workers,
                multi_sink
            ),
            (ProducerType::Multi, WaitStrategy::SpinLoopHint) => launch!(
                disruptor::build_multi_producer(capacity, slots, BusySpinWithSpinLoopHint),
                workers,
                multi_sink
            ),
        };

        *self.shared.sink.write() = Some(sink);
        self.shared.state.store(RUNNING, Ordering::SeqCst);
        tracing::info!(
            bus = %self.name,
            workers = count,
            capacity,
            producer = ?self.producer,
            wait_strategy = ?self.wait,
            "event bus started"
        );
        Ok(())
    }

    /// Stop intake, drain every consumer and join the workers.
    ///
    /// Events already published are processed to completion. Calling
    /// `shutdown` on a stopped bus is a no-op.
    pub fn shutdown(&mut self) -> Result<(), BusError> {
        match self.shared.state.compare_exchange(
            RUNNING,
            STOPPED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(IDLE) => return Err(BusError::NotStarted),
            Err(_) => return Ok(()),
        }
        tracing::info!(bus = %self.name, cursor = self.cursor(), "draining event bus");
        self.shared.close();
        tracing::info!(bus = %self.name, "event bus stopped");
        Ok(())
    }

    /// A handle for publishing into this bus.
    pub fn publisher(&self) -> Publisher<E> {
        Publisher {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest published sequence.
    pub fn cursor(&self) -> i64 {
        self.shared.cursor.load(Ordering::Acquire)
    }

    /// Returns `true` between `start` and `shutdown`.
    pub fn is_running(&self) -> bool {
        self.shared.state() == RUNNING
    }
}

impl<E> Drop for EventBus<E> {
    fn drop(&mut self) {
        // publishers may outlive the bus; they see `ShutDown` from here on
        if self.shared.state.swap(STOPPED, Ordering::SeqCst) == RUNNING {
            tracing::info!(bus = %self.name, "draining dropped event bus");
        }
        self.shared.close();
    }
}

/// The consumer attached last, used to chain the next one.
pub struct ConsumerGroup<'a, E> {
    bus: &'a mut EventBus<E>,
}

impl<'a, E: Send + 'static> ConsumerGroup<'a, E> {
    /// Attach a consumer that only sees an event after this group's
    /// consumer has processed it.
    pub fn then<C>(self, consumer: C) -> Result<ConsumerGroup<'a, E>, BusError>
    where
        C: Consumer<E> + 'static,
    {
        let ConsumerGroup { bus } = self;
        bus.attach(Box::new(consumer))?;
        Ok(ConsumerGroup { bus })
    }
}

// ============================================================================
// Worker
// ============================================================================

/// A consumer as run by its worker thread.
///
/// Every call into user code is guarded, so a panic never takes the worker
/// thread down and the bus can always drain.
struct Worker<E> {
    name: String,
    consumer: Box<dyn Consumer<E>>,
    fault_handler: Arc<dyn FaultHandler<E>>,
}

impl<E: Send + 'static> Worker<E> {
    fn start(mut consumer: Box<dyn Consumer<E>>, fault_handler: Arc<dyn FaultHandler<E>>) -> Self {
        let name = consumer.name().to_string();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| consumer.on_start()));
        if let Some(error) = failure(&name, outcome) {
            guarded(&name, || fault_handler.handle_start_fault(&name, &error));
        }
        tracing::debug!(consumer = %name, "worker started");
        Self {
            name,
            consumer,
            fault_handler,
        }
    }

    fn into_processor(mut self) -> impl FnMut(&Slot<E>, Sequence, bool) + Send + 'static {
        move |slot: &Slot<E>, sequence: Sequence, end_of_batch: bool| {
            self.process(slot, sequence, end_of_batch)
        }
    }
}

impl<E> Worker<E> {
    fn process(&mut self, slot: &Slot<E>, sequence: Sequence, end_of_batch: bool) {
        if slot.discarded {
            tracing::trace!(consumer = %self.name, sequence, "skipping discarded slot");
            return;
        }
        let mut event = slot.event.lock();
        let consumer = &mut self.consumer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            consumer.on_event(&mut *event, sequence, end_of_batch)
        }));
        if let Some(error) = failure(&self.name, outcome) {
            let fault_handler = &self.fault_handler;
            guarded(&self.name, || {
                fault_handler.handle_event_fault(&error, sequence, &*event)
            });
        }
    }
}

impl<E> Drop for Worker<E> {
    fn drop(&mut self) {
        let consumer = &mut self.consumer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| consumer.on_shutdown()));
        if let Some(error) = failure(&self.name, outcome) {
            let fault_handler = &self.fault_handler;
            let name = &self.name;
            guarded(name, || fault_handler.handle_shutdown_fault(name, &error));
        }
        tracing::debug!(consumer = %self.name, "worker stopped");
    }
}

/// The error of a guarded consumer call; a panic is reported as a failure
/// of the consumer.
fn failure(
    consumer: &str,
    outcome: std::thread::Result<Result<(), HandleError>>,
) -> Option<HandleError> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(payload) => Some(HandleError::Failure(EventHandleFailure::new(
            consumer,
            panic_message(payload),
        ))),
    }
}

/// Run a fault handler callback; a panic is logged instead of unwinding
/// into the worker.
fn guarded(consumer: &str, report: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(report)) {
        tracing::error!(consumer, panic = %panic_message(payload), "fault handler panicked");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(message) => (*message).to_string(),
            None => "panicked".to_string(),
        },
    }
}
