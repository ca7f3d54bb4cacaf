//! Ordered handler pipeline.
//!
//! Handlers run in registration order on every first-seen event. A veto stops
//! the pipeline. A fault (error or panic) is counted and logged; whether it
//! also stops the pipeline depends on the handler's [`FaultPolicy`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use shared_types::Event;
use tracing::warn;
use vr_telemetry::HANDLER_FAULTS;

use crate::ports::{EventHandler, HandlerVerdict};

/// What a handler fault does to the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Record the fault and run the next handler.
    #[default]
    Continue,
    /// Treat the fault as a rejection.
    FailFast,
}

/// Result of running the pipeline on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every handler accepted, or faulted under [`FaultPolicy::Continue`].
    Accepted { faults: usize },
    Rejected { handler: String, reason: String },
}

struct Stage {
    handler: Arc<dyn EventHandler>,
    policy: FaultPolicy,
}

/// Ordered list of handlers.
#[derive(Default)]
pub struct HandlerPipeline {
    stages: Vec<Stage>,
}

impl HandlerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>, policy: FaultPolicy) -> Self {
        self.push(handler, policy);
        self
    }

    pub fn push(&mut self, handler: Arc<dyn EventHandler>, policy: FaultPolicy) {
        self.stages.push(Stage { handler, policy });
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Handler names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.handler.name()).collect()
    }

    /// Run every handler on `event`, stopping at the first rejection.
    pub fn run(&self, event: &Event) -> PipelineOutcome {
        let mut faults = 0;

        for stage in &self.stages {
            let name = stage.handler.name();
            let fault = match catch_unwind(AssertUnwindSafe(|| stage.handler.handle(event))) {
                Ok(Ok(HandlerVerdict::Accept)) => continue,
                Ok(Ok(HandlerVerdict::Reject(reason))) => {
                    return PipelineOutcome::Rejected {
                        handler: name.to_string(),
                        reason,
                    };
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            faults += 1;
            HANDLER_FAULTS.with_label_values(&[name]).inc();
            warn!(handler = name, ivorn = %event.ivorn(), error = %fault, "handler fault");

            if stage.policy == FaultPolicy::FailFast {
                return PipelineOutcome::Rejected {
                    handler: name.to_string(),
                    reason: format!("handler {name} failed: {fault}"),
                };
            }
        }

        PipelineOutcome::Accepted { faults }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
