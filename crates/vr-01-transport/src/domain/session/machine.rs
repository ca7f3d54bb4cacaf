use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use shared_types::{AckToken, Decision, Event, EventSink, Ivorn, SessionId};
use tracing::{debug, info, warn};
use vr_telemetry::{MALFORMED_FRAMES, NAKS_RECEIVED};

use super::{SessionConfig, SessionState};
use crate::domain::handshake::{
    local_handshake, verify_handshake, HandshakeResult, LocalEndpoint, PeerIdentity,
    RejectReason,
};
use crate::domain::wire::{self, AckStatus, Acknowledgement, EventDocument, Frame, Handshake};
use crate::domain::SessionRole;
use crate::error::{FrameError, SessionError};
use crate::ports::PeerAuthorizer;

/// What the driver must do after feeding the machine an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this frame.
    Send(Frame),
    /// The session reached a terminal state; drop the connection.
    Close,
}

#[derive(Debug, Clone)]
struct PendingAck {
    ivorn: Ivorn,
    sent_at: Instant,
}

/// State machine for one connection.
pub struct TransportSession {
    id: SessionId,
    local: LocalEndpoint,
    config: SessionConfig,
    authorizer: Arc<dyn PeerAuthorizer>,
    state: SessionState,
    peer: Option<PeerIdentity>,
    pending_acks: HashMap<AckToken, PendingAck>,
    opened_at: Option<Instant>,
    authorized_at: Option<Instant>,
    last_activity: Instant,
    probe_sent_at: Option<Instant>,
    closing_since: Option<Instant>,
    malformed_streak: u32,
    fault_reason: Option<String>,
}

impl TransportSession {
    pub fn new(
        id: SessionId,
        local: LocalEndpoint,
        config: SessionConfig,
        authorizer: Arc<dyn PeerAuthorizer>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            local,
            config,
            authorizer,
            state: SessionState::Connecting,
            peer: None,
            pending_acks: HashMap::new(),
            opened_at: None,
            authorized_at: None,
            last_activity: now,
            probe_sent_at: None,
            closing_since: None,
            malformed_streak: 0,
            fault_reason: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> SessionRole {
        self.local.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn authorized_at(&self) -> Option<Instant> {
        self.authorized_at
    }

    pub fn fault_reason(&self) -> Option<&str> {
        self.fault_reason.as_deref()
    }

    pub fn pending_ack_count(&self) -> usize {
        self.pending_acks.len()
    }

    /// Connection established: send our handshake.
    pub fn open(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.opened_at = Some(now);
        self.last_activity = now;
        self.transition(SessionState::Handshaking);
        vec![SessionAction::Send(Frame::Handshake(local_handshake(
            &self.local,
        )))]
    }

    /// One complete frame body arrived.
    pub fn on_message(
        &mut self,
        bytes: &[u8],
        now: Instant,
        sink: &dyn EventSink,
    ) -> Vec<SessionAction> {
        match self.state {
            SessionState::Connecting => self.fault("frame received before the session opened"),
            SessionState::Handshaking => match wire::decode(bytes) {
                Ok(Frame::Handshake(remote)) => self.complete_handshake(&remote, now),
                Ok(other) => self.fault(format!("expected handshake, got {}", other.kind())),
                Err(err) => self.fault(format!("malformed handshake: {err}")),
            },
            SessionState::Authorized | SessionState::Active => {
                self.on_live_message(bytes, now, sink)
            }
            SessionState::Closing => self.on_closing_message(bytes, now),
            SessionState::Closed | SessionState::Faulted => Vec::new(),
        }
    }

    /// Queue an event for the remote. Only for roles that send events.
    pub fn send_event(
        &mut self,
        event: &Event,
        now: Instant,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if !self.local.role.sends_events() {
            return Err(SessionError::WrongDirection);
        }
        if !self.state.is_live() {
            return Err(SessionError::NotReady(self.state));
        }
        self.mark_active();

        let token = AckToken::for_ivorn(event.ivorn());
        self.pending_acks.insert(
            token,
            PendingAck {
                ivorn: event.ivorn().clone(),
                sent_at: now,
            },
        );
        Ok(vec![SessionAction::Send(Frame::Event(EventDocument {
            ivorn: event.ivorn().clone(),
            role: event.role(),
            raw: event.shared_payload(),
        }))])
    }

    /// Timer wake-up: handshake deadline, idle probe, ack expiry, close grace.
    pub fn on_tick(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.state {
            SessionState::Handshaking => {
                let opened = self.opened_at.unwrap_or(self.last_activity);
                if now.saturating_duration_since(opened) >= self.config.handshake_timeout {
                    return self.fault("handshake timed out");
                }
                Vec::new()
            }
            SessionState::Authorized | SessionState::Active => {
                self.expire_pending_acks(now);
                if let Some(probe) = self.probe_sent_at {
                    if now.saturating_duration_since(probe) >= self.config.keepalive_interval {
                        return self.fault("peer did not answer keepalive probe");
                    }
                    return Vec::new();
                }
                if now.saturating_duration_since(self.last_activity) >= self.config.idle_timeout {
                    debug!(session = %self.id, "idle, probing peer");
                    self.probe_sent_at = Some(now);
                    self.mark_active();
                    return vec![SessionAction::Send(Frame::keepalive(&self.local.identity))];
                }
                Vec::new()
            }
            SessionState::Closing => {
                let since = self.closing_since.unwrap_or(now);
                if self.pending_acks.is_empty()
                    || now.saturating_duration_since(since) >= self.config.close_grace
                {
                    return self.finish_close();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Earliest instant at which [`on_tick`](Self::on_tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SessionState::Handshaking => self
                .opened_at
                .map(|opened| opened + self.config.handshake_timeout),
            SessionState::Authorized | SessionState::Active => {
                let liveness = match self.probe_sent_at {
                    Some(probe) => probe + self.config.keepalive_interval,
                    None => self.last_activity + self.config.idle_timeout,
                };
                let ack_expiry = self
                    .pending_acks
                    .values()
                    .map(|p| p.sent_at + self.config.ack_timeout)
                    .min();
                Some(ack_expiry.map_or(liveness, |expiry| expiry.min(liveness)))
            }
            SessionState::Closing => self
                .closing_since
                .map(|since| since + self.config.close_grace),
            _ => None,
        }
    }

    /// Begin an orderly shutdown.
    pub fn begin_close(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.state {
            SessionState::Connecting | SessionState::Handshaking => {
                self.transition(SessionState::Closed);
                vec![SessionAction::Close]
            }
            SessionState::Authorized | SessionState::Active => {
                self.closing_since = Some(now);
                self.transition(SessionState::Closing);
                if self.pending_acks.is_empty() {
                    return self.finish_close();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// The connection is gone (EOF, reset, read error).
    pub fn on_connection_lost(&mut self) {
        match self.state {
            SessionState::Closing => {
                self.transition(SessionState::Closed);
            }
            state if !state.is_terminal() => {
                let _ = self.fault("connection lost");
            }
            _ => {}
        }
    }

    /// Transport-level failure detected by the driver (write timeout, oversized frame).
    pub fn fail(&mut self, reason: impl Into<String>) -> Vec<SessionAction> {
        self.fault(reason)
    }

    fn complete_handshake(&mut self, remote: &Handshake, now: Instant) -> Vec<SessionAction> {
        let peer = match verify_handshake(&self.local, remote) {
            HandshakeResult::Accept(peer) => peer,
            HandshakeResult::Reject(reason) => return self.fault(reason.to_string()),
        };
        if let Err(why) = self.authorizer.authorize(&peer, self.local.role) {
            return self.fault(RejectReason::Unauthorized(why).to_string());
        }

        info!(session = %self.id, role = %self.local.role, peer = %peer, "session authorized");
        self.peer = Some(peer);
        self.authorized_at = Some(now);
        self.touch(now);
        self.transition(SessionState::Authorized);
        Vec::new()
    }

    fn on_live_message(
        &mut self,
        bytes: &[u8],
        now: Instant,
        sink: &dyn EventSink,
    ) -> Vec<SessionAction> {
        self.touch(now);
        let frame = match wire::decode(bytes) {
            Ok(frame) => frame,
            Err(err) => return self.on_malformed(bytes, err),
        };
        self.malformed_streak = 0;

        match frame {
            Frame::Handshake(_) => self.fault("handshake repeated mid-session"),
            Frame::Event(document) => self.on_event(document, sink),
            Frame::Ack(ack) => {
                self.resolve_ack(ack);
                Vec::new()
            }
            Frame::KeepAlive(_) => {
                self.mark_active();
                vec![SessionAction::Send(Frame::keepalive_ack(
                    &self.local.identity,
                ))]
            }
            Frame::KeepAliveAck(_) => Vec::new(),
        }
    }

    fn on_closing_message(&mut self, bytes: &[u8], now: Instant) -> Vec<SessionAction> {
        self.touch(now);
        match wire::decode(bytes) {
            Ok(Frame::Ack(ack)) => {
                self.resolve_ack(ack);
                if self.pending_acks.is_empty() {
                    return self.finish_close();
                }
                Vec::new()
            }
            Ok(Frame::KeepAlive(_)) => vec![SessionAction::Send(Frame::keepalive_ack(
                &self.local.identity,
            ))],
            Ok(Frame::Event(document)) => vec![SessionAction::Send(Frame::nak(
                &self.local.identity,
                AckToken::for_ivorn(&document.ivorn),
                "session closing",
            ))],
            Ok(_) => Vec::new(),
            Err(err) => vec![SessionAction::Send(Frame::nak(
                &self.local.identity,
                malformed_token(bytes, &err),
                err.to_string(),
            ))],
        }
    }

    fn on_event(&mut self, document: EventDocument, sink: &dyn EventSink) -> Vec<SessionAction> {
        let token = AckToken::for_ivorn(&document.ivorn);
        if !self.local.role.receives_events() {
            debug!(session = %self.id, ivorn = %document.ivorn, "event on a sending session");
            return vec![SessionAction::Send(Frame::nak(
                &self.local.identity,
                token,
                format!("events are not accepted on {} sessions", self.local.role),
            ))];
        }
        self.mark_active();

        let event = Event::new(
            document.ivorn,
            document.role,
            document.raw,
            Utc::now(),
            self.id,
        );
        let ivorn = event.ivorn().clone();
        let decision = sink.accept(event, self.id);
        debug!(session = %self.id, ivorn = %ivorn, decision = decision.label(), "event routed");

        let reply = match decision {
            Decision::Rejected { reason } => Frame::nak(&self.local.identity, token, reason),
            positive => Frame::ack(
                &self.local.identity,
                token,
                Some(positive.label().to_string()),
            ),
        };
        vec![SessionAction::Send(reply)]
    }

    fn on_malformed(&mut self, bytes: &[u8], err: FrameError) -> Vec<SessionAction> {
        MALFORMED_FRAMES.inc();
        self.malformed_streak += 1;
        warn!(
            session = %self.id,
            streak = self.malformed_streak,
            error = %err,
            "malformed frame"
        );

        let mut actions = vec![SessionAction::Send(Frame::nak(
            &self.local.identity,
            malformed_token(bytes, &err),
            err.to_string(),
        ))];
        if self.malformed_streak >= self.config.max_consecutive_malformed {
            actions.extend(self.fault(format!(
                "{} consecutive malformed frames",
                self.malformed_streak
            )));
        }
        actions
    }

    fn resolve_ack(&mut self, ack: Acknowledgement) {
        match self.pending_acks.remove(&ack.token) {
            Some(pending) if ack.status == AckStatus::Nak => {
                NAKS_RECEIVED.inc();
                warn!(
                    session = %self.id,
                    ivorn = %pending.ivorn,
                    reason = ack.reason.as_deref().unwrap_or(""),
                    "peer rejected event"
                );
            }
            Some(pending) => {
                debug!(session = %self.id, ivorn = %pending.ivorn, "event acknowledged");
            }
            None => {
                debug!(session = %self.id, token = %ack.token, "acknowledgement for unknown token");
            }
        }
    }

    fn expire_pending_acks(&mut self, now: Instant) {
        let timeout = self.config.ack_timeout;
        let id = self.id;
        self.pending_acks.retain(|_, pending| {
            let keep = now.saturating_duration_since(pending.sent_at) < timeout;
            if !keep {
                warn!(session = %id, ivorn = %pending.ivorn, "no acknowledgement, giving up");
            }
            keep
        });
    }

    fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.probe_sent_at = None;
    }

    fn mark_active(&mut self) {
        if self.state == SessionState::Authorized {
            self.transition(SessionState::Active);
        }
    }

    fn finish_close(&mut self) -> Vec<SessionAction> {
        if !self.pending_acks.is_empty() {
            warn!(
                session = %self.id,
                outstanding = self.pending_acks.len(),
                "closing with unacknowledged events"
            );
        }
        self.transition(SessionState::Closed);
        vec![SessionAction::Close]
    }

    fn fault(&mut self, reason: impl Into<String>) -> Vec<SessionAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let reason = reason.into();
        warn!(session = %self.id, state = %self.state, reason = %reason, "session faulted");
        self.fault_reason = Some(reason);
        self.transition(SessionState::Faulted);
        vec![SessionAction::Close]
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "session transition");
        self.state = next;
    }
}

fn malformed_token(bytes: &[u8], err: &FrameError) -> AckToken {
    err.recovered_ivorn()
        .and_then(|raw| Ivorn::new(raw).ok())
        .map(|ivorn| AckToken::for_ivorn(&ivorn))
        .unwrap_or_else(|| AckToken::for_bytes(bytes))
}
