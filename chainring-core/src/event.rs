//! Events and per-delivery metadata.
//!
//! The engine is generic over the event type: anything that implements
//! [`Routable`] can flow through a chain. [`Event`] is the general-purpose
//! record used when no custom type is needed.
//!
//! Events live in recycled bus slots. A handler receives `&mut E` for the
//! duration of one call and must not retain it beyond that call.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// An event that carries a routing key.
///
/// The routing key is matched against rule patterns to select a chain. It
/// must be set before the chain is resolved and must not change while the
/// chain runs.
pub trait Routable: Send + 'static {
    /// The key used to resolve a chain for this event.
    fn routing_key(&self) -> &str;
}

/// Metadata describing one delivery of an event to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Bus sequence number of the slot being processed.
    pub sequence: i64,
    /// Whether this is the last event of the batch currently available to
    /// the stage. Useful for flush-on-batch-end behaviour.
    pub end_of_batch: bool,
}

impl Delivery {
    /// Create delivery metadata.
    pub const fn new(sequence: i64, end_of_batch: bool) -> Self {
        Self {
            sequence,
            end_of_batch,
        }
    }

    /// Delivery metadata for executing a chain outside of a bus.
    pub const fn standalone() -> Self {
        Self::new(0, true)
    }
}

/// The default event record.
///
/// An event is classified by `event` (its type), `tag` and `key`. Unless an
/// explicit route is given, its routing key is the route expression
/// `/{event}/{tag}/{key}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    event: String,
    tag: String,
    key: String,
    route: String,
    body: Option<String>,
    attributes: BTreeMap<String, String>,
    timestamp: u64,
}

impl Event {
    /// Create an event routed by its route expression.
    pub fn new(event: impl Into<String>, tag: impl Into<String>, key: impl Into<String>) -> Self {
        let mut this = Self {
            timestamp: now_millis(),
            ..Self::default()
        };
        this.retarget(event, tag, key);
        this
    }

    /// Create an event with an explicit routing key.
    pub fn routed(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            timestamp: now_millis(),
            ..Self::default()
        }
    }

    /// Build the route expression for the given classifiers.
    pub fn route_expression(event: &str, tag: &str, key: &str) -> String {
        let mut route = String::with_capacity(event.len() + tag.len() + key.len() + 3);
        route.push('/');
        route.push_str(event);
        route.push('/');
        route.push_str(tag);
        route.push('/');
        route.push_str(key);
        route
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Re-classify the event and recompute its routing key.
    ///
    /// Intended for translators filling a slot before publication. Handlers
    /// must not call this while a chain is running.
    pub fn retarget(
        &mut self,
        event: impl Into<String>,
        tag: impl Into<String>,
        key: impl Into<String>,
    ) {
        self.event = event.into();
        self.tag = tag.into();
        self.key = key.into();
        self.route = Self::route_expression(&self.event, &self.tag, &self.key);
    }

    /// Replace the routing key.
    ///
    /// Same restriction as [`retarget`](Self::retarget).
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = route.into();
    }

    /// Overwrite this slot with a copy of `other`, reusing allocations.
    pub fn copy_from(&mut self, other: &Event) {
        self.clone_from(other);
    }

    /// Reset the slot to a blank state, stamping the current time.
    pub fn reset(&mut self) {
        self.event.clear();
        self.tag.clear();
        self.key.clear();
        self.route.clear();
        self.body = None;
        self.attributes.clear();
        self.timestamp = now_millis();
    }

    /// Event type.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Event tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Business key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Payload, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }

    /// Value of the attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes, ordered by name.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Mutable access to the attributes.
    pub fn attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.attributes
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl Routable for Event {
    fn routing_key(&self) -> &str {
        &self.route
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
