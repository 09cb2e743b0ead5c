use std::num::NonZeroUsize;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Counting limiter for open rendering sessions.
///
/// Slots are handed out strictly in arrival order: a release with waiters
/// queued passes the slot straight to the oldest waiter, so `active` does not
/// dip in between.
#[derive(Debug)]
pub struct AdmissionGate {
    limit: usize,
    permits: Semaphore,
}

impl AdmissionGate {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            limit: limit.get(),
            permits: Semaphore::new(limit.get()),
        }
    }

    pub async fn acquire(&self) {
        if self.permits.available_permits() == 0 {
            debug!(
                target = "pressroom::pool::gate",
                limit = self.limit,
                "waiting for a session slot"
            );
        }
        // The semaphore is never closed, so acquisition can only succeed.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }

    pub fn release(&self) {
        if self.active() == 0 {
            warn!(
                target = "pressroom::pool::gate",
                limit = self.limit,
                "release without a held slot ignored"
            );
            return;
        }
        self.permits.add_permits(1);
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn active(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    pub fn is_idle(&self) -> bool {
        self.active() == 0
    }
}

/// Holds one slot and gives it back on drop unless disarmed.
///
/// Keeps a slot from leaking when the future that acquired it is cancelled
/// before ownership moves elsewhere.
pub(crate) struct SlotGuard<'a> {
    gate: &'a AdmissionGate,
    armed: bool,
}

impl<'a> SlotGuard<'a> {
    pub(crate) async fn acquire(gate: &'a AdmissionGate) -> SlotGuard<'a> {
        gate.acquire().await;
        SlotGuard { gate, armed: true }
    }

    /// Hand responsibility for the slot to the caller.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release();
        }
    }
}
