//! Bounded pool of isolated browser sessions over one shared engine.
//!
//! Every session holds an [`AdmissionGate`] slot from creation until it is
//! closed. The engine is launched on first use and relaunched once per
//! `create_session` call when the connection to it turns out to be dead.

mod engine;
mod gate;
mod session;

pub use engine::EngineHandle;
pub use gate::AdmissionGate;
pub use session::PooledSession;

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::application::engine::{EngineError, EngineLauncher};
use gate::SlotGuard;

/// Relaunch attempts allowed per `create_session` call after a lost connection.
pub const CONNECTION_RETRY_BUDGET: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_sessions: NonZeroUsize,
    pub close_timeout: Duration,
}

/// Snapshot of pool occupancy for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub active: usize,
    pub limit: usize,
}

pub struct SessionPool {
    gate: Arc<AdmissionGate>,
    engine: EngineHandle,
    close_timeout: Duration,
}

impl SessionPool {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: PoolConfig) -> Self {
        Self {
            gate: Arc::new(AdmissionGate::new(config.max_sessions)),
            engine: EngineHandle::new(launcher),
            close_timeout: config.close_timeout,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.gate.active(),
            limit: self.gate.limit(),
        }
    }

    /// Open a session, waiting for a free slot first.
    pub async fn create_session(&self) -> Result<PooledSession, EngineError> {
        self.create_session_with_budget(CONNECTION_RETRY_BUDGET)
            .await
    }

    pub async fn create_session_with_budget(
        &self,
        mut retries: u32,
    ) -> Result<PooledSession, EngineError> {
        loop {
            let slot = SlotGuard::acquire(&self.gate).await;

            let engine = self.engine.instance().await?;

            match engine.new_session().await {
                Ok(raw) => {
                    slot.disarm();
                    metrics::gauge!("pressroom_sessions_active").set(self.gate.active() as f64);
                    return Ok(PooledSession::new(
                        raw,
                        self.gate.clone(),
                        self.close_timeout,
                    ));
                }
                Err(err) if err.is_connection_lost() && retries > 0 => {
                    warn!(
                        target = "pressroom::pool",
                        op = "pool::create_session",
                        result = "connection_lost",
                        retries_left = retries - 1,
                        error = %err,
                        "Engine connection lost; relaunching"
                    );
                    metrics::counter!("pressroom_engine_restart_total").increment(1);

                    // Sessions still running on the old engine are not waited for;
                    // their next engine call fails on its own.
                    match tokio::time::timeout(self.close_timeout, engine.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(close_err)) => debug!(
                            target = "pressroom::pool",
                            error = %close_err,
                            "stale engine did not close cleanly"
                        ),
                        Err(_) => debug!(target = "pressroom::pool", "stale engine close timed out"),
                    }
                    self.engine.reset(&engine).await;
                    drop(slot);
                    retries -= 1;
                }
                Err(err) => {
                    warn!(
                        target = "pressroom::pool",
                        op = "pool::create_session",
                        result = "error",
                        error = %err,
                        "Session creation failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::fake::FakeLauncher;

    fn pool(launcher: &FakeLauncher, limit: usize) -> Arc<SessionPool> {
        Arc::new(SessionPool::new(
            launcher.shared(),
            PoolConfig {
                max_sessions: NonZeroUsize::new(limit).expect("non-zero"),
                close_timeout: Duration::from_millis(200),
            },
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn third_session_waits_for_a_close() {
        let launcher = FakeLauncher::new();
        let pool = pool(&launcher, 2);

        let first = pool.create_session().await.expect("first");
        let _second = pool.create_session().await.expect("second");
        assert_eq!(pool.stats(), PoolStats { active: 2, limit: 2 });

        let third = tokio::spawn({
            let pool = pool.clone();
            async move { pool.create_session().await }
        });
        settle().await;
        assert!(!third.is_finished());
        assert_eq!(launcher.sessions_opened(), 2);

        first.close().await;
        let third = third.await.expect("join").expect("third");
        assert!(!third.is_closed());
        assert_eq!(pool.gate().active(), 2);
        assert_eq!(launcher.sessions_opened(), 3);
    }

    #[tokio::test]
    async fn closing_twice_releases_once() {
        let launcher = FakeLauncher::new();
        let pool = pool(&launcher, 2);

        let session = pool.create_session().await.expect("session");
        let _other = pool.create_session().await.expect("other");
        assert_eq!(pool.gate().active(), 2);

        session.close().await;
        session.close().await;
        assert_eq!(pool.gate().active(), 1);
        assert_eq!(launcher.session_closes(), 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn close_failures_are_swallowed() {
        let launcher = FakeLauncher::new().fail_session_close();
        let pool = pool(&launcher, 1);

        let session = pool.create_session().await.expect("session");
        session.close().await;
        assert!(pool.gate().is_idle());
        assert_eq!(launcher.session_closes(), 1);
    }

    #[tokio::test]
    async fn connection_loss_relaunches_once() {
        let launcher =
            FakeLauncher::new().fail_sessions([EngineError::connection_lost("socket closed")]);
        let pool = pool(&launcher, 2);

        let session = pool.create_session().await.expect("recovered session");
        assert_eq!(launcher.launches(), 2);
        assert_eq!(launcher.engine_closes(), 1);
        assert_eq!(pool.gate().active(), 1);
        session.new_page().await.expect("usable session");

        session.close().await;
        assert!(pool.gate().is_idle());
    }

    #[tokio::test]
    async fn second_connection_loss_is_propagated() {
        let launcher = FakeLauncher::new().fail_sessions([
            EngineError::connection_lost("socket closed"),
            EngineError::connection_lost("socket closed again"),
        ]);
        let pool = pool(&launcher, 2);

        let err = pool.create_session().await.expect_err("budget exhausted");
        assert!(err.is_connection_lost());
        assert_eq!(launcher.launches(), 2);
        assert!(pool.gate().is_idle());
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let launcher = FakeLauncher::new().fail_sessions([EngineError::protocol("bad context")]);
        let pool = pool(&launcher, 1);

        let err = pool.create_session().await.expect_err("protocol error");
        assert!(matches!(err, EngineError::Protocol(_)));
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.engine_closes(), 0);
        assert!(pool.gate().is_idle());
    }

    #[tokio::test]
    async fn launch_failure_releases_the_slot() {
        let launcher = FakeLauncher::new().fail_launches(1);
        let pool = pool(&launcher, 1);

        let err = pool.create_session().await.expect_err("launch failure");
        assert!(matches!(err, EngineError::Launch(_)));
        assert!(pool.gate().is_idle());
    }

    #[tokio::test]
    async fn dropped_session_is_closed_in_background() {
        let launcher = FakeLauncher::new();
        let pool = pool(&launcher, 1);

        let session = pool.create_session().await.expect("session");
        drop(session);
        settle().await;

        assert_eq!(launcher.session_closes(), 1);
        assert!(pool.gate().is_idle());
    }

    #[tokio::test]
    async fn interrupted_close_still_returns_the_slot() {
        let launcher = FakeLauncher::new().with_session_close_delay(Duration::from_millis(150));
        let pool = pool(&launcher, 1);

        let session = pool.create_session().await.expect("session");
        let interrupted =
            tokio::time::timeout(Duration::from_millis(20), session.close()).await;
        assert!(interrupted.is_err());
        assert!(session.is_closed());
        assert_eq!(pool.gate().active(), 1);

        drop(session);
        assert!(pool.gate().is_idle());
        assert_eq!(launcher.session_closes(), 1);

        let next = tokio::time::timeout(Duration::from_secs(1), pool.create_session())
            .await
            .expect("slot handed back");
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn cancelled_creation_does_not_leak_a_slot() {
        let launcher = FakeLauncher::new().with_launch_delay(Duration::from_millis(200));
        let pool = pool(&launcher, 1);

        let attempt =
            tokio::time::timeout(Duration::from_millis(10), pool.create_session()).await;
        assert!(attempt.is_err());
        assert!(pool.gate().is_idle());
    }
}
