//! # Handlers
//!
//! A handler is a named, independently registrable unit of work. Handlers
//! come in two shapes:
//!
//! - [`EventHandler`]: a **terminal** handler that reads and writes the
//!   event. After it returns `Ok`, the chain moves on to the next handler.
//! - [`ChainHandler`]: a **chaining** handler that also receives the rest of
//!   the chain as a [`Next`] continuation and decides whether to invoke it.
//!   Not invoking it short-circuits the chain.
//!
//! The registry stores either shape as a [`HandlerKind`], tagged explicitly
//! at registration. Every registered handler carries an [`EnabledHandle`];
//! a disabled handler is skipped without counting as an execution.

use crate::{chain::Next, error::BoxError, event::Delivery};
use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A terminal handler.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle events of type `{E}`",
    label = "missing `EventHandler<{E}>` implementation",
    note = "Terminal handlers implement `handle`; use `ChainHandler` to control the rest of the chain."
)]
pub trait EventHandler<E>: Send + Sync {
    /// Process the event.
    fn handle(&self, event: &mut E, delivery: &Delivery) -> Result<(), BoxError>;

    /// Receives the name the handler was registered under.
    ///
    /// Called once, before the handler becomes shared. Override to
    /// self-identify in logs or metrics.
    fn bind_name(&mut self, _name: &str) {}
}

/// A chaining handler that controls whether the rest of the chain runs.
///
/// Implementations must propagate errors returned by [`Next::proceed`]
/// rather than swallowing them. `Next` is consumed on use, so the rest of
/// the chain can be invoked at most once.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot wrap chains over events of type `{E}`",
    label = "missing `ChainHandler<{E}>` implementation",
    note = "Chaining handlers implement `handle` and decide whether to call `next.proceed(event)`."
)]
pub trait ChainHandler<E>: Send + Sync {
    /// Process the event, optionally invoking the rest of the chain.
    fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<(), BoxError>;

    /// See [`EventHandler::bind_name`].
    fn bind_name(&mut self, _name: &str) {}
}

// Blanket impls for closures
impl<E, F> EventHandler<E> for F
where
    F: Fn(&mut E, &Delivery) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, event: &mut E, delivery: &Delivery) -> Result<(), BoxError> {
        (self)(event, delivery)
    }
}

impl<E, F> ChainHandler<E> for F
where
    F: Fn(&mut E, Next<'_, E>) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<(), BoxError> {
        (self)(event, next)
    }
}

/// The shape of a registered handler.
pub enum HandlerKind<E> {
    /// A terminal handler.
    Terminal(Box<dyn EventHandler<E>>),
    /// A chaining handler.
    Chaining(Box<dyn ChainHandler<E>>),
}

impl<E> HandlerKind<E> {
    /// Wrap a terminal handler.
    pub fn terminal<H: EventHandler<E> + 'static>(handler: H) -> Self {
        HandlerKind::Terminal(Box::new(handler))
    }

    /// Wrap a chaining handler.
    pub fn chaining<H: ChainHandler<E> + 'static>(handler: H) -> Self {
        HandlerKind::Chaining(Box::new(handler))
    }

    /// Returns `true` for chaining handlers.
    pub fn is_chaining(&self) -> bool {
        matches!(self, HandlerKind::Chaining(_))
    }

    pub(crate) fn bind_name(&mut self, name: &str) {
        match self {
            HandlerKind::Terminal(h) => h.bind_name(name),
            HandlerKind::Chaining(h) => h.bind_name(name),
        }
    }
}

impl<E> fmt::Debug for HandlerKind<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Terminal(_) => f.write_str("Terminal"),
            HandlerKind::Chaining(_) => f.write_str("Chaining"),
        }
    }
}

/// A handle for toggling a handler's enabled state at runtime.
#[derive(Debug, Clone)]
pub struct EnabledHandle(Arc<AtomicBool>);

impl EnabledHandle {
    /// Create a new enabled handle with the given initial state.
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// Check if the handler is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Enable the handler.
    pub fn enable(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Disable the handler.
    pub fn disable(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Set the handler's enabled state.
    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

impl Default for EnabledHandle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// A named handler as stored by the registry and referenced by chains.
pub struct HandlerEntry<E> {
    name: Arc<str>,
    kind: HandlerKind<E>,
    enabled: EnabledHandle,
}

impl<E> HandlerEntry<E> {
    /// Create an entry, injecting `name` into the handler.
    pub fn new(name: impl Into<Arc<str>>, mut kind: HandlerKind<E>, enabled: EnabledHandle) -> Self {
        let name = name.into();
        kind.bind_name(&name);
        Self {
            name,
            kind,
            enabled,
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped handler.
    pub fn kind(&self) -> &HandlerKind<E> {
        &self.kind
    }

    /// Check if this handler is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.is_enabled()
    }

    /// Get a handle for toggling this handler's enabled state.
    pub fn enabled_handle(&self) -> EnabledHandle {
        self.enabled.clone()
    }
}

impl<E> fmt::Debug for HandlerEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Named {
        seen: Arc<Mutex<String>>,
    }

    impl EventHandler<()> for Named {
        fn handle(&self, _event: &mut (), _delivery: &Delivery) -> Result<(), BoxError> {
            Ok(())
        }

        fn bind_name(&mut self, name: &str) {
            *self.seen.lock().unwrap() = name.to_string();
        }
    }

    #[test]
    fn entry_injects_registered_name() {
        let seen = Arc::new(Mutex::new(String::new()));
        let entry = HandlerEntry::new(
            "audit",
            HandlerKind::terminal(Named { seen: seen.clone() }),
            EnabledHandle::default(),
        );
        assert_eq!(entry.name(), "audit");
        assert_eq!(*seen.lock().unwrap(), "audit");
    }

    #[test]
    fn enabled_handle_is_shared() {
        let entry: HandlerEntry<()> = HandlerEntry::new(
            "noop",
            HandlerKind::terminal(|_: &mut (), _: &Delivery| Ok::<(), BoxError>(())),
            EnabledHandle::new(true),
        );
        let handle = entry.enabled_handle();
        handle.disable();
        assert!(!entry.is_enabled());
        handle.enable();
        assert!(entry.is_enabled());
    }
}
