//! Router: dedup, handler pipeline, fan-out.
//!
//! Every receiving session calls [`Router::accept`] from its own task. The
//! duplicate check is a single atomic step, handlers run synchronously, and
//! fan-out only queues the event on each subscriber's link.

use std::sync::Arc;

use shared_types::{Decision, Event, EventSink, SessionId};
use tracing::{debug, info, warn};
use vr_02_dedup::DuplicateFilter;
use vr_telemetry::{HistogramTimer, FAN_OUT_DURATION, ROUTER_EVENTS, SUBSCRIBER_SEND_FAILURES};

use crate::domain::{HandlerPipeline, PipelineOutcome, SubscriptionRegistry};

/// Counts from one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub filtered: usize,
    pub failed: usize,
    /// Subscribers dropped for repeated send failures.
    pub dropped: usize,
}

/// Central coordinator shared by every session.
pub struct Router {
    filter: Arc<DuplicateFilter>,
    pipeline: HandlerPipeline,
    registry: Arc<SubscriptionRegistry>,
}

impl Router {
    pub fn new(
        filter: Arc<DuplicateFilter>,
        pipeline: HandlerPipeline,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            filter,
            pipeline,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn duplicate_filter(&self) -> &Arc<DuplicateFilter> {
        &self.filter
    }

    pub fn pipeline(&self) -> &HandlerPipeline {
        &self.pipeline
    }

    /// Queue `event` to every live subscriber except `source`.
    ///
    /// A failed submission never affects other subscribers. A subscriber that
    /// fails too many times in a row is asked to close and unregistered.
    pub fn fan_out(&self, event: &Event, source: SessionId) -> FanOutReport {
        let _timer = HistogramTimer::new(&FAN_OUT_DURATION);
        let mut report = FanOutReport::default();

        for subscriber in self.registry.active_subscribers() {
            let id = subscriber.session_id();
            if id == source {
                continue;
            }
            if !subscriber.wants(event) {
                report.filtered += 1;
                continue;
            }

            match subscriber.link.submit(event.clone()) {
                Ok(()) => {
                    self.registry.record_send_success(id);
                    report.delivered += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    SUBSCRIBER_SEND_FAILURES.inc();
                    warn!(session = %id, ivorn = %event.ivorn(), error = %e, "send to subscriber failed");

                    if self.registry.record_send_failure(id) {
                        warn!(session = %id, "dropping subscriber after repeated send failures");
                        subscriber.link.request_close();
                        self.registry.unregister(id);
                        report.dropped += 1;
                    }
                }
            }
        }

        report
    }
}

impl EventSink for Router {
    fn accept(&self, event: Event, source: SessionId) -> Decision {
        if !self.filter.seen_or_record(event.ivorn()) {
            debug!(ivorn = %event.ivorn(), source = %source, "duplicate event");
            ROUTER_EVENTS.with_label_values(&["duplicate"]).inc();
            return Decision::Duplicate;
        }

        if let PipelineOutcome::Rejected { handler, reason } = self.pipeline.run(&event) {
            info!(ivorn = %event.ivorn(), handler = %handler, reason = %reason, "event rejected");
            ROUTER_EVENTS.with_label_values(&["rejected"]).inc();
            return Decision::Rejected { reason };
        }

        let report = self.fan_out(&event, source);
        info!(
            ivorn = %event.ivorn(),
            role = %event.role(),
            source = %source,
            delivered = report.delivered,
            failed = report.failed,
            "event forwarded"
        );
        ROUTER_EVENTS.with_label_values(&["forwarded"]).inc();
        Decision::Forwarded
    }
}
