//! In-flight request bookkeeping for the network-idle heuristic.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use crate::application::engine::NetworkIdle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NetworkEvent {
    Started(String),
    Finished(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quiet {
    /// The in-flight count has stayed low for the whole window.
    Idle,
    /// Check again after this long unless another event arrives first.
    Wait(Duration),
}

/// Tracks requests between `requestWillBeSent` and `loadingFinished`/`loadingFailed`.
#[derive(Debug)]
pub(crate) struct InflightTracker {
    idle: NetworkIdle,
    inflight: HashSet<String>,
    quiet_since: Option<Instant>,
}

impl InflightTracker {
    pub(crate) fn new(idle: NetworkIdle, now: Instant) -> Self {
        Self {
            idle,
            inflight: HashSet::new(),
            quiet_since: Some(now),
        }
    }

    pub(crate) fn inflight(&self) -> usize {
        self.inflight.len()
    }

    pub(crate) fn apply(&mut self, event: NetworkEvent, now: Instant) {
        match event {
            NetworkEvent::Started(id) => {
                self.inflight.insert(id);
            }
            NetworkEvent::Finished(id) => {
                self.inflight.remove(&id);
            }
        }

        if self.inflight.len() > self.idle.max_inflight {
            self.quiet_since = None;
        } else if self.quiet_since.is_none() {
            self.quiet_since = Some(now);
        }
    }

    pub(crate) fn poll(&self, now: Instant) -> Quiet {
        match self.quiet_since {
            Some(since) => {
                let quiet_for = now.saturating_duration_since(since);
                if quiet_for >= self.idle.window {
                    Quiet::Idle
                } else {
                    Quiet::Wait(self.idle.window - quiet_for)
                }
            }
            None => Quiet::Wait(self.idle.window),
        }
    }
}
