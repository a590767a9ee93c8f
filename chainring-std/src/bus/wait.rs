//! Wait strategies.
//!
//! A wait strategy decides how an idle worker waits for the next sequence
//! to become available. Both strategies spin; they trade latency against
//! how politely the spinning core behaves towards its sibling threads.
//!
//! | Strategy       | Latency | Idle worker |
//! |----------------|---------|-------------|
//! | `BusySpin`     | lowest  | one core per worker, no hint |
//! | `SpinLoopHint` | low     | one core per worker, CPU spin-loop hint |

use serde::{Deserialize, Serialize};

/// How idle workers wait on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// Spin on the sequence without yielding the core.
    BusySpin,
    /// Spin with a spin-loop hint, freeing pipeline resources for a sibling
    /// hyper-thread.
    #[default]
    SpinLoopHint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        strategy: WaitStrategy,
    }

    #[test]
    fn deserializes_kebab_case_names() {
        let holder: Holder = toml::from_str("strategy = \"busy-spin\"").unwrap();
        assert_eq!(holder.strategy, WaitStrategy::BusySpin);
        let holder: Holder = toml::from_str("strategy = \"spin-loop-hint\"").unwrap();
        assert_eq!(holder.strategy, WaitStrategy::SpinLoopHint);
        assert!(toml::from_str::<Holder>("strategy = \"sleeping\"").is_err());
    }
}
