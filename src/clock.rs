//! Per-writer Lamport clock.
//!
//! A clock is a `(id, time)` pair tagged with the writer's public key bytes.
//! `tick` advances the writer's own view; `merge` folds in a peer's view
//! without adopting the peer's identity. Comparison is lexicographic on
//! `(time, id)`, which is also the first two steps of the log's default
//! sort order (see `crate::sorting`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LamportClock {
    id: Vec<u8>,
    time: u64,
}

impl LamportClock {
    /// Constructs a clock at time zero for the writer identified by `id`.
    pub fn new(id: impl Into<Vec<u8>>) -> LamportClock {
        LamportClock {
            id: id.into(),
            time: 0,
        }
    }

    pub fn set_time(mut self, time: u64) -> LamportClock {
        self.time = time;
        self
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    /// Advances this writer's clock by one tick.
    pub fn tick(&mut self) {
        self.time += 1;
    }

    /// Folds another clock's time into this one. The identity never
    /// changes: only the local writer may hold this clock's id.
    pub fn merge(&mut self, other: &LamportClock) {
        self.time = self.time.max(other.time);
    }
}

impl Ord for LamportClock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for LamportClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
