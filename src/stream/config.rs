//! Per-stream configuration.

use crate::scheduler::Scheduler;

/// What happens when a listener panics during dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Catch the panic, log it, and keep delivering to the remaining
    /// listeners of the same dispatch.
    #[default]
    Isolate,
    /// Let the panic unwind through `update_state`, aborting delivery to
    /// later listeners.
    Propagate,
}

/// Stream configuration.
///
/// Derived streams inherit the configuration of the stream they were built
/// from, with the operator name appended to the label.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Name used in log fields. Unlabelled streams log as `"-"`.
    pub label: Option<String>,

    /// Listener fault handling.
    /// Default: `FaultPolicy::Isolate`
    pub fault_policy: FaultPolicy,

    /// Timer queue for debounce-style operators.
    /// Default: the calling thread's `Scheduler::current()`
    pub scheduler: Scheduler,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            label: None,
            fault_policy: FaultPolicy::default(),
            scheduler: Scheduler::current(),
        }
    }
}

impl StreamConfig {
    /// Default configuration with a label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Configuration for a stream derived by `operator`.
    pub(crate) fn derive(&self, operator: &str) -> Self {
        Self {
            label: self.label.as_ref().map(|label| format!("{label}.{operator}")),
            fault_policy: self.fault_policy,
            scheduler: self.scheduler.clone(),
        }
    }
}
