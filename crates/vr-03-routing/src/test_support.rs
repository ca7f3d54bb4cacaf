//! In-memory subscriber links and handlers for registry and router tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use shared_types::{Event, EventRole, Ivorn, LinkError, SessionId, SubscriberLink};

pub(crate) struct FakeLink {
    id: SessionId,
    terminal: AtomicBool,
    failing: AtomicBool,
    pub(crate) close_requested: AtomicBool,
    pub(crate) received: Mutex<Vec<Event>>,
}

impl FakeLink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::next(),
            terminal: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_terminal(&self) {
        self.terminal.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub(crate) fn ivorns(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|e| e.ivorn().to_string())
            .collect()
    }

    pub(crate) fn as_link(self: &Arc<Self>) -> Arc<dyn SubscriberLink> {
        self.clone()
    }
}

impl SubscriberLink for FakeLink {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    fn submit(&self, event: Event) -> Result<(), LinkError> {
        if self.is_terminal() {
            return Err(LinkError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(LinkError::QueueFull);
        }
        self.received.lock().push(event);
        Ok(())
    }

    fn request_close(&self) {
        self.close_requested.store(true, Ordering::SeqCst);
    }
}

pub(crate) fn event(ivorn: &str, role: EventRole, origin: SessionId) -> Event {
    Event::new(
        Ivorn::new(ivorn).unwrap(),
        role,
        format!(r#"<VOEvent ivorn="{ivorn}" role="{role}"/>"#),
        Utc::now(),
        origin,
    )
}
