//! Signal-driven lifecycle of the managed unit.
//!
//! ```text
//! Uninstalled --install--> Installed --config-changed--> Configured --start--> Started
//! ```
//!
//! `enabled` is tracked separately and set once the service is registered
//! for automatic start.

mod controller;

pub use controller::{DEPENDENCIES, LifecycleController, UNIT_FILE_MODE};

use crate::error::AgentError;
use crate::types::Signal;

/// What happened to a delivered signal.
#[derive(Debug)]
pub enum SignalOutcome {
    /// Transition applied.
    Completed,
    /// Nothing to do.
    Skipped,
    /// Precondition unmet; queued for one retry.
    Deferred(AgentError),
    /// Precondition still unmet on retry; discarded.
    Dropped(AgentError),
    /// Operator intervention required; see the unit status.
    Blocked(AgentError),
}

impl SignalOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SignalOutcome::Completed => "completed",
            SignalOutcome::Skipped => "skipped",
            SignalOutcome::Deferred(_) => "deferred",
            SignalOutcome::Dropped(_) => "dropped",
            SignalOutcome::Blocked(_) => "blocked",
        }
    }

    pub fn error(&self) -> Option<&AgentError> {
        match self {
            SignalOutcome::Deferred(e) | SignalOutcome::Dropped(e) | SignalOutcome::Blocked(e) => {
                Some(e)
            }
            SignalOutcome::Completed | SignalOutcome::Skipped => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SignalOutcome::Completed)
    }
}

/// Result of [`LifecycleController::dispatch`]: the delivered signal and
/// the deferred signals replayed after it.
#[derive(Debug)]
pub struct DispatchReport {
    pub replayed: Vec<(Signal, SignalOutcome)>,
    pub signal: Signal,
    pub outcome: SignalOutcome,
}
