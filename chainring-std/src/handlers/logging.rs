//! Logging handler for chain observation.

use chainring_core::{BoxError, ChainHandler, Next, Routable};

/// A chaining handler that wraps the rest of the chain in a `tracing` span.
///
/// Logs entry and completion of every event and returns the result of the
/// continuation unchanged. Register it first in a rule to trace the whole
/// chain:
///
/// ```text
/// /orders/** = trace, validate, persist
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler {
    name: String,
}

impl LoggingHandler {
    /// An unnamed handler; the registry binds its name.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Routable> ChainHandler<E> for LoggingHandler {
    fn handle(&self, event: &mut E, next: Next<'_, E>) -> Result<(), BoxError> {
        let delivery = *next.delivery();
        let span = tracing::info_span!(
            "chain",
            handler = %self.name,
            chain = %next.chain().name(),
            routing_key = %event.routing_key(),
            sequence = delivery.sequence,
        );
        let _enter = span.enter();
        tracing::debug!(remaining = next.remaining(), "processing event");
        match next.proceed(event) {
            Ok(()) => {
                tracing::debug!("event processed");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "chain failed");
                Err(err.into())
            }
        }
    }

    fn bind_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingHandler, RecordingHandler};
    use chainring_core::{Chain, Delivery, EnabledHandle, Event, HandlerEntry, HandlerKind};
    use std::io;
    use std::sync::Arc;

    fn chain(tail: HandlerKind<Event>) -> Chain<Event> {
        Chain::new(
            "/traced/**",
            vec![
                Arc::new(HandlerEntry::new(
                    "trace",
                    HandlerKind::chaining(LoggingHandler::new()),
                    EnabledHandle::default(),
                )),
                Arc::new(HandlerEntry::new("tail", tail, EnabledHandle::default())),
            ],
        )
    }

    #[test]
    fn proceeds_and_preserves_result() {
        let recorder = RecordingHandler::new();
        let mut event = Event::routed("/traced/a");
        chain(HandlerKind::terminal(recorder.clone()))
            .execute(&mut event, &Delivery::standalone())
            .unwrap();
        assert_eq!(recorder.names(), vec!["tail"]);

        let err = chain(HandlerKind::terminal(FailingHandler::io(
            io::ErrorKind::ConnectionReset,
            "reset",
        )))
        .execute(&mut event, &Delivery::standalone())
        .unwrap_err();
        assert!(err.is_io());
    }
}
