//! Reconnection supervisor: one task per enabled feed.
//!
//! Each task dials its feed, runs the session to completion, then waits out
//! the backoff delay and dials again. Tasks share nothing but the session
//! context, so a failing feed never delays another.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{SessionId, SubscriberLink};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vr_01_transport::{
    run_session, PeerIdentity, SessionContext, SessionObserver, SessionRole, SessionState,
};
use vr_telemetry::RECONNECT_ATTEMPTS;

use crate::domain::{BackoffConfig, FeedConfig, FeedStatus, RetryState};
use crate::error::SupervisorError;
use crate::ports::Connector;

/// Shared view of one feed, written by its task.
#[derive(Debug)]
struct FeedHandle {
    status: RwLock<FeedStatus>,
    failures: AtomicU32,
}

impl FeedHandle {
    fn new(status: FeedStatus) -> Self {
        Self {
            status: RwLock::new(status),
            failures: AtomicU32::new(0),
        }
    }

    fn set(&self, status: FeedStatus) {
        *self.status.write() = status;
    }

    fn get(&self) -> FeedStatus {
        *self.status.read()
    }
}

/// Marks the feed active once its session is authorized, then delegates.
struct FeedObserver {
    handle: Arc<FeedHandle>,
    inner: Arc<dyn SessionObserver>,
}

impl SessionObserver for FeedObserver {
    fn on_authorized(&self, link: Arc<dyn SubscriberLink>, role: SessionRole, peer: &PeerIdentity) {
        self.handle.set(FeedStatus::Active);
        self.inner.on_authorized(link, role, peer);
    }

    fn on_terminated(&self, session: SessionId, role: SessionRole, state: SessionState) {
        self.inner.on_terminated(session, role, state);
    }
}

/// Keeps one outbound session alive per enabled feed.
pub struct ReconnectionSupervisor {
    feeds: BTreeMap<String, Arc<FeedHandle>>,
    tasks: JoinSet<()>,
}

impl ReconnectionSupervisor {
    /// Validate the feed list and spawn a task for every enabled feed.
    ///
    /// Must be called inside a tokio runtime. Tasks stop when `shutdown`
    /// turns `true`; their live sessions close gracefully.
    pub fn start(
        feeds: Vec<FeedConfig>,
        backoff: BackoffConfig,
        ctx: Arc<SessionContext>,
        connector: Arc<dyn Connector>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, SupervisorError> {
        backoff.validate()?;

        let mut handles = BTreeMap::new();
        for feed in &feeds {
            if feed.address.trim().is_empty() {
                return Err(SupervisorError::EmptyAddress);
            }
            if handles.contains_key(&feed.address) {
                return Err(SupervisorError::DuplicateFeed(feed.address.clone()));
            }
            let initial = if feed.enabled {
                FeedStatus::Connecting
            } else {
                FeedStatus::PermanentlyFailed
            };
            handles.insert(feed.address.clone(), Arc::new(FeedHandle::new(initial)));
        }

        let mut tasks = JoinSet::new();
        for feed in feeds {
            if !feed.enabled {
                info!(feed = %feed.address, "feed disabled");
                continue;
            }
            let Some(handle) = handles.get(&feed.address).cloned() else {
                continue;
            };
            let feed_ctx = Arc::new(SessionContext {
                local_identity: ctx.local_identity.clone(),
                config: ctx.config.clone(),
                sink: Arc::clone(&ctx.sink),
                authorizer: Arc::clone(&ctx.authorizer),
                observer: Arc::new(FeedObserver {
                    handle: Arc::clone(&handle),
                    inner: Arc::clone(&ctx.observer),
                }),
            });
            tasks.spawn(run_feed(
                feed,
                handle,
                RetryState::new(backoff.clone()),
                feed_ctx,
                Arc::clone(&connector),
                shutdown.clone(),
            ));
        }

        Ok(Self {
            feeds: handles,
            tasks,
        })
    }

    /// Current status of the feed at `address`.
    pub fn feed_status(&self, address: &str) -> Option<FeedStatus> {
        self.feeds.get(address).map(|h| h.get())
    }

    /// Consecutive failures since the feed was last stable.
    pub fn consecutive_failures(&self, address: &str) -> Option<u32> {
        self.feeds
            .get(address)
            .map(|h| h.failures.load(Ordering::Relaxed))
    }

    /// Every feed with its status, in address order.
    pub fn statuses(&self) -> Vec<(String, FeedStatus)> {
        self.feeds
            .iter()
            .map(|(address, h)| (address.clone(), h.get()))
            .collect()
    }

    /// Wait for every feed task to stop. Returns once shutdown has been
    /// signalled and all sessions have ended.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "feed task ended abnormally");
            }
        }
    }
}

async fn run_feed(
    feed: FeedConfig,
    handle: Arc<FeedHandle>,
    mut retry: RetryState,
    ctx: Arc<SessionContext>,
    connector: Arc<dyn Connector>,
    mut shutdown: watch::Receiver<bool>,
) {
    let role = SessionRole::UpstreamClient(feed.direction);

    loop {
        if *shutdown.borrow() {
            break;
        }

        handle.set(FeedStatus::Connecting);
        RECONNECT_ATTEMPTS
            .with_label_values(&[feed.address.as_str()])
            .inc();
        debug!(feed = %feed.address, role = %role, "connecting");

        let connected = tokio::select! {
            result = connector.connect(&feed.address) => result,
            _ = shutdown.changed() => break,
        };

        let connected_for = match connected {
            Ok(stream) => {
                let outcome = run_session(
                    stream,
                    role,
                    feed.expected_identity.clone(),
                    Arc::clone(&ctx),
                    shutdown.clone(),
                )
                .await;
                info!(
                    feed = %feed.address,
                    session = %outcome.session_id,
                    state = %outcome.final_state,
                    "feed session ended"
                );
                outcome.authorized_for()
            }
            Err(e) => {
                warn!(feed = %feed.address, error = %e, "connect failed");
                None
            }
        };

        if *shutdown.borrow() {
            break;
        }

        let delay = retry.on_failure(connected_for);
        handle
            .failures
            .store(retry.consecutive_failures(), Ordering::Relaxed);
        let next_attempt_at = (tokio::time::Instant::now() + delay).into_std();
        handle.set(FeedStatus::BackingOff { next_attempt_at });
        debug!(
            feed = %feed.address,
            delay_ms = delay.as_millis() as u64,
            failures = retry.consecutive_failures(),
            "backing off"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!(feed = %feed.address, "feed task stopped");
}
