//! Handler registry.
//!
//! The registry owns every named handler available for chaining. It is
//! populated once at startup and then only read: compiled chains hold
//! shared references to its entries, so no locking is needed on the hot
//! path.

use chainring_core::{
    Chain, ChainHandler, EnabledHandle, EventHandler, HandlerEntry, HandlerKind, RegistryError,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the chain built from every registered handler.
pub const DEFAULT_CHAIN_NAME: &str = "default";

/// Registry of named handlers, in insertion order.
///
/// # Example
/// ```ignore
/// let mut registry = HandlerRegistry::new();
/// registry.register_terminal("validate", Validate)?;
/// registry.register_chaining("guard", Guard::default())?;
/// let persist = registry.register_terminal("persist", Persist)?;
/// persist.disable();
/// ```
pub struct HandlerRegistry<E> {
    entries: Vec<Arc<HandlerEntry<E>>>,
    index: HashMap<Arc<str>, usize>,
}

impl<E> HandlerRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a handler under `name`, enabled.
    ///
    /// The name is injected into the handler via `bind_name`. Returns the
    /// handle that toggles the handler on and off.
    pub fn register(
        &mut self,
        name: impl Into<Arc<str>>,
        kind: HandlerKind<E>,
    ) -> Result<EnabledHandle, RegistryError> {
        self.register_with_state(name, kind, true)
    }

    /// Register a handler with an explicit initial enabled state.
    pub fn register_with_state(
        &mut self,
        name: impl Into<Arc<str>>,
        kind: HandlerKind<E>,
        enabled: bool,
    ) -> Result<EnabledHandle, RegistryError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateHandlerName(name.to_string()));
        }
        let handle = EnabledHandle::new(enabled);
        let entry = HandlerEntry::new(Arc::clone(&name), kind, handle.clone());
        tracing::debug!(handler = %name, chaining = entry.kind().is_chaining(), "registered handler");
        self.index.insert(name, self.entries.len());
        self.entries.push(Arc::new(entry));
        Ok(handle)
    }

    /// Register a terminal handler.
    pub fn register_terminal<H: EventHandler<E> + 'static>(
        &mut self,
        name: impl Into<Arc<str>>,
        handler: H,
    ) -> Result<EnabledHandle, RegistryError> {
        self.register(name, HandlerKind::terminal(handler))
    }

    /// Register a chaining handler.
    pub fn register_chaining<H: ChainHandler<E> + 'static>(
        &mut self,
        name: impl Into<Arc<str>>,
        handler: H,
    ) -> Result<EnabledHandle, RegistryError> {
        self.register(name, HandlerKind::chaining(handler))
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Result<&Arc<HandlerEntry<E>>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All handlers in registration order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &Arc<HandlerEntry<E>>)> {
        self.entries.iter().map(|e| (e.name(), e))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    /// The enabled handle of a registered handler.
    pub fn enabled_handle(&self, name: &str) -> Result<EnabledHandle, RegistryError> {
        self.get(name).map(|e| e.enabled_handle())
    }

    /// A chain of every registered handler, in registration order.
    ///
    /// Dispatch stages execute this chain when no rule matches.
    pub fn default_chain(&self) -> Chain<E> {
        Chain::new(DEFAULT_CHAIN_NAME, self.entries.clone())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainring_core::{BoxError, Delivery};

    fn noop() -> impl EventHandler<()> {
        |_: &mut (), _: &Delivery| -> Result<(), BoxError> { Ok(()) }
    }

    #[test]
    fn preserves_insertion_order() {
        let mut registry = HandlerRegistry::new();
        for name in ["validate", "persist", "notify"] {
            registry.register_terminal(name, noop()).unwrap();
        }
        assert_eq!(registry.names(), vec!["validate", "persist", "notify"]);
        assert_eq!(
            registry.default_chain().handler_names(),
            vec!["validate", "persist", "notify"]
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = HandlerRegistry::new();
        registry.register_terminal("validate", noop()).unwrap();
        let err = registry.register_terminal("validate", noop()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateHandlerName("validate".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_reports_missing_names() {
        let mut registry = HandlerRegistry::new();
        let handle = registry.register_with_state("audit", HandlerKind::terminal(noop()), false).unwrap();
        assert!(!registry.get("audit").unwrap().is_enabled());
        handle.enable();
        assert!(registry.enabled_handle("audit").unwrap().is_enabled());
        assert_eq!(
            registry.get("missing").unwrap_err(),
            RegistryError::NotFound("missing".into())
        );
    }
}
