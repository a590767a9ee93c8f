//! Fault handling for bus consumers.
//!
//! Errors returned by a consumer never stop its worker. They are reported
//! to the bus's [`FaultHandler`] and the worker moves on to the next
//! sequence.

use chainring_core::HandleError;

/// Receives failures raised by consumers.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle faults for events of type `{E}`",
    label = "missing `FaultHandler<{E}>` implementation",
    note = "Closures of the form `Fn(&HandleError, i64)` are fault handlers too."
)]
pub trait FaultHandler<E>: Send + Sync {
    /// A consumer failed to process the event at `sequence`.
    fn handle_event_fault(&self, error: &HandleError, sequence: i64, event: &E);

    /// A consumer failed while starting. The worker still runs.
    fn handle_start_fault(&self, consumer: &str, error: &HandleError) {
        tracing::error!(consumer, error = %error, "consumer failed to start");
    }

    /// A consumer failed while shutting down.
    fn handle_shutdown_fault(&self, consumer: &str, error: &HandleError) {
        tracing::error!(consumer, error = %error, "consumer failed to shut down");
    }
}

impl<E, F> FaultHandler<E> for F
where
    F: Fn(&HandleError, i64) + Send + Sync + 'static,
{
    fn handle_event_fault(&self, error: &HandleError, sequence: i64, _event: &E) {
        (self)(error, sequence)
    }
}

/// Logs every fault and continues. The default fault handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFaultHandler;

impl<E> FaultHandler<E> for LoggingFaultHandler {
    fn handle_event_fault(&self, error: &HandleError, sequence: i64, _event: &E) {
        match error {
            HandleError::Io(io) => {
                tracing::error!(sequence, kind = ?io.kind(), error = %io, "I/O failure while handling event");
            }
            HandleError::Failure(failure) => {
                tracing::error!(
                    sequence,
                    handler = failure.handler(),
                    cause = %failure.cause(),
                    "event handling failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainring_core::EventHandleFailure;
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_receive_error_and_sequence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |err: &HandleError, seq: i64| {
                seen.lock().unwrap().push((seq, err.to_string()));
            }
        };
        let err = HandleError::Failure(EventHandleFailure::new("persist", "disk full"));
        FaultHandler::<()>::handle_event_fault(&sink, &err, 9, &());
        LoggingFaultHandler.handle_event_fault(&err, 9, &());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 9);
        assert!(seen[0].1.contains("persist"));
    }
}
