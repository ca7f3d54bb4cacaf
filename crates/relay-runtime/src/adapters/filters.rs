use std::collections::HashSet;

use shared_types::{Event, EventRole};
use vr_03_routing::EventFilter;

/// Forwards only events whose role is listed.
#[derive(Debug, Clone)]
pub struct RoleFilter {
    roles: HashSet<EventRole>,
}

impl RoleFilter {
    /// `None` when `roles` is empty, since an empty filter would block
    /// everything and an absent one forwards everything.
    pub fn from_roles(roles: &[EventRole]) -> Option<Self> {
        if roles.is_empty() {
            return None;
        }
        Some(Self {
            roles: roles.iter().copied().collect(),
        })
    }
}

impl EventFilter for RoleFilter {
    fn matches(&self, event: &Event) -> bool {
        self.roles.contains(&event.role())
    }
}
