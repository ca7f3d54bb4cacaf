use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;
use shared_types::Ivorn;
use tracing::trace;

use super::DedupConfig;

struct SeenEntry {
    ivorn: Ivorn,
    recorded_at: Instant,
}

#[derive(Default)]
struct SeenState {
    index: HashSet<Ivorn>,
    // Insertion order; timestamps are non-decreasing front to back.
    order: VecDeque<SeenEntry>,
}

impl SeenState {
    fn evict(&mut self, config: &DedupConfig, now: Instant) {
        if let Some(retention) = config.retention {
            while let Some(front) = self.order.front() {
                if now.saturating_duration_since(front.recorded_at) < retention {
                    break;
                }
                self.pop_oldest();
            }
        }
        while self.order.len() > config.max_entries {
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(entry) = self.order.pop_front() {
            trace!(ivorn = %entry.ivorn, "evicting remembered ivorn");
            self.index.remove(&entry.ivorn);
        }
    }
}

/// Bounded memory of accepted ivorns.
///
/// `seen_or_record` is a single critical section: of any number of
/// concurrent callers presenting the same ivorn, exactly one observes
/// first-seen.
pub struct DuplicateFilter {
    config: DedupConfig,
    state: Mutex<SeenState>,
}

impl DuplicateFilter {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SeenState::default()),
        }
    }

    /// Returns `true` and records the ivorn if it was not present.
    /// Returns `false` if it was already recorded.
    pub fn seen_or_record(&self, ivorn: &Ivorn) -> bool {
        self.seen_or_record_at(ivorn, Instant::now())
    }

    /// As [`seen_or_record`](Self::seen_or_record) with an explicit clock.
    pub fn seen_or_record_at(&self, ivorn: &Ivorn, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.evict(&self.config, now);

        if state.index.contains(ivorn) {
            return false;
        }

        state.index.insert(ivorn.clone());
        state.order.push_back(SeenEntry {
            ivorn: ivorn.clone(),
            recorded_at: now,
        });
        state.evict(&self.config, now);
        true
    }

    /// Whether the ivorn is currently remembered. Does not record.
    pub fn contains(&self, ivorn: &Ivorn) -> bool {
        self.state.lock().index.contains(ivorn)
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }
}
