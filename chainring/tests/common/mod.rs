#![allow(dead_code)]

use chainring::{BoxError, Delivery, Event, EventHandler};
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a test-writer fmt subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Stage timers
// ============================================================================

/// Start and end ticks of one timed invocation.
#[derive(Clone, Debug)]
pub struct Span {
    pub stage: &'static str,
    pub key: String,
    pub start: usize,
    pub end: usize,
}

/// A handler that stamps its start and end on a shared clock.
pub struct StageTimer {
    pub stage: &'static str,
    pub clock: Arc<AtomicUsize>,
    pub spans: Arc<Mutex<Vec<Span>>>,
}

impl EventHandler<Event> for StageTimer {
    fn handle(&self, event: &mut Event, _delivery: &Delivery) -> Result<(), BoxError> {
        let start = self.clock.fetch_add(1, Ordering::SeqCst);
        // give a downstream stage the chance to overtake if ordering were broken
        std::thread::sleep(Duration::from_micros(200));
        let end = self.clock.fetch_add(1, Ordering::SeqCst);
        self.spans.lock().unwrap().push(Span {
            stage: self.stage,
            key: event.key().to_string(),
            start,
            end,
        });
        Ok(())
    }
}

/// Two timers sharing one clock and one log.
pub fn stage_timers(a: &'static str, b: &'static str) -> (StageTimer, StageTimer, Arc<Mutex<Vec<Span>>>) {
    let clock = Arc::new(AtomicUsize::new(0));
    let spans = Arc::new(Mutex::new(Vec::new()));
    let timer = |stage| StageTimer {
        stage,
        clock: clock.clone(),
        spans: spans.clone(),
    };
    (timer(a), timer(b), spans.clone())
}
