use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::{debug, warn};
use uuid::Uuid;

use super::gate::AdmissionGate;
use crate::application::engine::{EngineError, EnginePage, EngineSession};

/// An isolated engine session that owns one admission slot.
///
/// `close` tears the session down and then gives the slot back, exactly once
/// no matter how often it is called. Dropping an unclosed session schedules
/// the same teardown on the runtime. Starting the teardown and handing back
/// the slot are tracked apart, so a `close` future dropped mid-teardown still
/// returns the slot when the session itself is dropped.
pub struct PooledSession {
    id: Uuid,
    inner: Arc<dyn EngineSession>,
    gate: Arc<AdmissionGate>,
    close_timeout: Duration,
    closing: AtomicBool,
    released: Arc<AtomicBool>,
}

impl PooledSession {
    pub(super) fn new(
        inner: Arc<dyn EngineSession>,
        gate: Arc<AdmissionGate>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner,
            gate,
            close_timeout,
            closing: AtomicBool::new(false),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub async fn new_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        self.inner.new_page().await
    }

    /// Close the session and release its slot. Never fails.
    pub async fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        teardown(self.id, self.inner.clone(), self.close_timeout).await;
        release_once(&self.gate, &self.released);
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }

        // A close already sent the teardown and was cancelled while waiting on it.
        if self.closing.swap(true, Ordering::AcqRel) {
            debug!(
                target = "pressroom::pool::session",
                session_id = %self.id,
                "close interrupted; releasing slot"
            );
            release_once(&self.gate, &self.released);
            return;
        }

        let id = self.id;
        let inner = self.inner.clone();
        let gate = self.gate.clone();
        let released = self.released.clone();
        let close_timeout = self.close_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    teardown(id, inner, close_timeout).await;
                    release_once(&gate, &released);
                });
            }
            Err(_) => {
                warn!(
                    target = "pressroom::pool::session",
                    session_id = %id,
                    "session dropped outside a runtime; releasing slot without closing"
                );
                release_once(&gate, &released);
            }
        }
    }
}

fn release_once(gate: &AdmissionGate, released: &AtomicBool) {
    if released.swap(true, Ordering::AcqRel) {
        return;
    }
    gate.release();
    metrics::gauge!("pressroom_sessions_active").set(gate.active() as f64);
}

async fn teardown(id: Uuid, inner: Arc<dyn EngineSession>, close_timeout: Duration) {
    match tokio::time::timeout(close_timeout, inner.close()).await {
        Ok(Ok(())) => debug!(
            target = "pressroom::pool::session",
            session_id = %id,
            "session closed"
        ),
        Ok(Err(err)) => debug!(
            target = "pressroom::pool::session",
            session_id = %id,
            error = %err,
            "session close failed; ignoring"
        ),
        Err(_) => warn!(
            target = "pressroom::pool::session",
            session_id = %id,
            timeout_ms = close_timeout.as_millis() as u64,
            "session close timed out; ignoring"
        ),
    }
}
