//! Session driver: runs one [`TransportSession`] over an async byte stream.
//!
//! The driver owns the connection and the session's outbound queue. It feeds
//! the state machine with frames, queued events, close requests and timer
//! wake-ups, and writes whatever the machine answers with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use shared_types::{Event, EventSink, SessionId, SubscriberLink};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use vr_telemetry::{SESSIONS_ENDED, SESSIONS_LIVE, SESSIONS_OPENED};

use crate::adapters::{framed, FrameStream, SessionLink};
use crate::domain::wire;
use crate::domain::{
    LocalEndpoint, PeerIdentity, SessionAction, SessionConfig, SessionRole, SessionState,
    TransportSession,
};
use crate::ports::{PeerAuthorizer, SessionObserver};

/// Everything a session needs from the node, shared by all sessions.
pub struct SessionContext {
    /// Local broker identity, sent as `Origin`.
    pub local_identity: String,
    pub config: SessionConfig,
    pub sink: Arc<dyn EventSink>,
    pub authorizer: Arc<dyn PeerAuthorizer>,
    pub observer: Arc<dyn SessionObserver>,
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub role: SessionRole,
    pub final_state: SessionState,
    pub peer: Option<PeerIdentity>,
    pub authorized_at: Option<Instant>,
    pub ended_at: Instant,
    pub fault_reason: Option<String>,
}

impl SessionOutcome {
    /// Time between authorization and the end of the session.
    pub fn authorized_for(&self) -> Option<Duration> {
        self.authorized_at
            .map(|at| self.ended_at.saturating_duration_since(at))
    }
}

/// Drives one session to a terminal state.
pub struct SessionDriver<S> {
    machine: TransportSession,
    frames: FrameStream<S>,
    link: Arc<SessionLink>,
    outbound: mpsc::Receiver<Event>,
    ctx: Arc<SessionContext>,
    reported_live: bool,
}

impl<S> SessionDriver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: S,
        role: SessionRole,
        expected_peer: Option<String>,
        ctx: Arc<SessionContext>,
    ) -> Self {
        let id = SessionId::next();
        let local = LocalEndpoint::new(ctx.local_identity.clone(), role)
            .with_expected_peer(expected_peer);
        let machine = TransportSession::new(
            id,
            local,
            ctx.config.clone(),
            Arc::clone(&ctx.authorizer),
            now(),
        );
        let (link, outbound) = SessionLink::new(id, ctx.config.outbound_queue);
        Self {
            machine,
            frames: framed(stream, ctx.config.max_frame_bytes),
            link: Arc::new(link),
            outbound,
            ctx,
            reported_live: false,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.machine.id()
    }

    pub fn link(&self) -> Arc<SessionLink> {
        Arc::clone(&self.link)
    }

    /// Run until CLOSED or FAULTED. A `true` on `shutdown` starts CLOSING.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionOutcome {
        let id = self.machine.id();
        let role = self.machine.role();
        SESSIONS_OPENED.with_label_values(&[role.label()]).inc();
        debug!(session = %id, role = %role, "session opened");

        let actions = self.machine.open(now());
        self.execute(actions).await;
        self.sync_state();

        let mut shutdown_seen = *shutdown.borrow();
        if shutdown_seen {
            let actions = self.machine.begin_close(now());
            self.execute(actions).await;
        }

        while !self.machine.state().is_terminal() {
            let deadline = self.machine.next_deadline();
            let wake_at = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                incoming = self.frames.next() => self.on_incoming(incoming).await,
                Some(event) = self.outbound.recv() => self.on_outbound(event).await,
                _ = self.link.close_requested() => {
                    debug!(session = %id, "close requested");
                    let actions = self.machine.begin_close(now());
                    self.execute(actions).await;
                }
                _ = shutdown.changed(), if !shutdown_seen => {
                    shutdown_seen = true;
                    let actions = self.machine.begin_close(now());
                    self.execute(actions).await;
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    let actions = self.machine.on_tick(now());
                    self.execute(actions).await;
                }
            }
            self.sync_state();
        }

        self.finish().await
    }

    async fn on_incoming(&mut self, incoming: Option<Result<BytesMut, std::io::Error>>) {
        match incoming {
            Some(Ok(bytes)) => {
                let sink = self.ctx.sink.as_ref();
                let machine = &mut self.machine;
                let actions = run_inline(|| machine.on_message(&bytes, now(), sink));
                self.execute(actions).await;
            }
            Some(Err(e)) => {
                warn!(session = %self.machine.id(), error = %e, "read failed");
                self.machine.on_connection_lost();
            }
            None => {
                debug!(session = %self.machine.id(), "peer closed the connection");
                self.machine.on_connection_lost();
            }
        }
    }

    async fn on_outbound(&mut self, event: Event) {
        match self.machine.send_event(&event, now()) {
            Ok(actions) => self.execute(actions).await,
            Err(e) => {
                debug!(
                    session = %self.machine.id(),
                    ivorn = %event.ivorn(),
                    error = %e,
                    "dropping queued event"
                );
            }
        }
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Send(frame) => {
                    let body = Bytes::from(wire::encode(&frame));
                    match timeout(self.ctx.config.write_timeout, self.frames.send(body)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            self.machine.fail(format!("write failed: {e}"));
                            return;
                        }
                        Err(_) => {
                            self.machine.fail("write timed out");
                            return;
                        }
                    }
                }
                SessionAction::Close => return,
            }
        }
    }

    /// Mirror the machine state into the link and report authorization once.
    fn sync_state(&mut self) {
        let state = self.machine.state();
        self.link.set_state(state);

        if state.is_live() && !self.reported_live {
            self.reported_live = true;
            SESSIONS_LIVE.inc();
            if let Some(peer) = self.machine.peer() {
                let link: Arc<dyn SubscriberLink> = self.link.clone();
                self.ctx
                    .observer
                    .on_authorized(link, self.machine.role(), peer);
            }
        }
    }

    async fn finish(mut self) -> SessionOutcome {
        self.sync_state();
        let state = self.machine.state();
        let id = self.machine.id();
        let role = self.machine.role();

        if self.reported_live {
            SESSIONS_LIVE.dec();
        }
        let ended_label = state.as_str().to_lowercase();
        SESSIONS_ENDED
            .with_label_values(&[ended_label.as_str()])
            .inc();

        let _ = timeout(
            self.ctx.config.write_timeout,
            SinkExt::<Bytes>::close(&mut self.frames),
        )
        .await;
        self.ctx.observer.on_terminated(id, role, state);

        info!(
            session = %id,
            role = %role,
            state = %state,
            reason = self.machine.fault_reason().unwrap_or(""),
            "session ended"
        );

        SessionOutcome {
            session_id: id,
            role,
            final_state: state,
            peer: self.machine.peer().cloned(),
            authorized_at: self.machine.authorized_at(),
            ended_at: now(),
            fault_reason: self.machine.fault_reason().map(str::to_string),
        }
    }
}

/// Run a session over `stream` to completion.
pub async fn run_session<S>(
    stream: S,
    role: SessionRole,
    expected_peer: Option<String>,
    ctx: Arc<SessionContext>,
    shutdown: watch::Receiver<bool>,
) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    SessionDriver::new(stream, role, expected_peer, ctx)
        .run(shutdown)
        .await
}

/// Current time on the tokio clock, so paused-time tests drive the machine.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Run sink work that may block (handlers touch disk) without stalling the
/// other tasks on this worker. A current-thread runtime has no spare worker
/// to hand off to, so the work runs in place there.
fn run_inline<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}
