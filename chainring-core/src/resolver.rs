//! # Chain resolution
//!
//! A [`ChainResolver`] selects the chain to execute for an event's routing
//! key. It sits between a dispatch stage and the compiled rules, in the
//! same way a router sits between a listener and its handlers: from the
//! stage's point of view it is a single lookup.

use crate::chain::Chain;

/// Selects the chain for a routing key.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot resolve chains over events of type `{E}`",
    label = "missing `ChainResolver` implementation",
    note = "Implement `ChainResolver<{E}>` to select a chain per routing key."
)]
pub trait ChainResolver<E>: Send + Sync {
    /// Return the chain for `routing_key`, or `default` when nothing matches.
    fn resolve<'a>(&'a self, routing_key: &str, default: &'a Chain<E>) -> &'a Chain<E>;
}

impl<E, R: ChainResolver<E> + ?Sized> ChainResolver<E> for Box<R> {
    fn resolve<'a>(&'a self, routing_key: &str, default: &'a Chain<E>) -> &'a Chain<E> {
        (**self).resolve(routing_key, default)
    }
}
