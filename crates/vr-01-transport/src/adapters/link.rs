//! Outbound half of a session, as seen by the router.

use std::sync::atomic::{AtomicU8, Ordering};

use shared_types::{Event, LinkError, SessionId, SubscriberLink};
use tokio::sync::{mpsc, Notify};

use crate::domain::SessionState;

/// Handle the registry holds (weakly) for a running session.
///
/// Submissions go into a bounded queue drained by the session driver; a
/// full queue is reported, never waited on.
pub struct SessionLink {
    id: SessionId,
    queue: mpsc::Sender<Event>,
    state: AtomicU8,
    close: Notify,
}

impl SessionLink {
    pub fn new(id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (queue, receiver) = mpsc::channel(capacity.max(1));
        let link = Self {
            id,
            queue,
            state: AtomicU8::new(SessionState::Connecting.as_u8()),
            close: Notify::new(),
        };
        (link, receiver)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Resolves once [`request_close`](SubscriberLink::request_close) was called.
    pub(crate) async fn close_requested(&self) {
        self.close.notified().await;
    }
}

impl SubscriberLink for SessionLink {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    fn submit(&self, event: Event) -> Result<(), LinkError> {
        if !self.state().is_live() {
            return Err(LinkError::Closed);
        }
        self.queue.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LinkError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    fn request_close(&self) {
        self.close.notify_one();
    }
}
