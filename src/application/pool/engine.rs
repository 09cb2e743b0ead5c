use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::engine::{Engine, EngineError, EngineLauncher};

/// Lazily launched, shared engine process.
///
/// All mutation goes through one async mutex, so concurrent first callers
/// wait on the same launch instead of starting a second process, and a reset
/// cannot interleave with a launch in progress.
pub struct EngineHandle {
    launcher: Arc<dyn EngineLauncher>,
    current: Mutex<Option<Arc<dyn Engine>>>,
}

impl EngineHandle {
    pub fn new(launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            launcher,
            current: Mutex::new(None),
        }
    }

    /// Return the running engine, launching it if none is held.
    pub async fn instance(&self) -> Result<Arc<dyn Engine>, EngineError> {
        let mut current = self.current.lock().await;
        if let Some(engine) = current.as_ref() {
            return Ok(engine.clone());
        }

        let started_at = Instant::now();
        let engine = self.launcher.launch().await.inspect_err(|err| {
            warn!(
                target = "pressroom::pool::engine",
                op = "engine::launch",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Engine launch failed"
            );
        })?;
        info!(
            target = "pressroom::pool::engine",
            op = "engine::launch",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Engine launched"
        );

        *current = Some(engine.clone());
        Ok(engine)
    }

    /// Forget `stale` so the next `instance()` launches a fresh engine.
    ///
    /// Does not stop the process. A no-op when another caller already replaced
    /// the handle, which keeps concurrent resets from discarding a newer engine.
    pub async fn reset(&self, stale: &Arc<dyn Engine>) -> bool {
        let mut current = self.current.lock().await;
        match current.as_ref() {
            Some(engine) if Arc::ptr_eq(engine, stale) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Best-effort single stop of the engine for process exit.
    pub async fn shutdown(&self, timeout: Duration) {
        let engine = self.current.lock().await.take();
        let Some(engine) = engine else {
            return;
        };

        match tokio::time::timeout(timeout, engine.close()).await {
            Ok(Ok(())) => info!(
                target = "pressroom::pool::engine",
                op = "engine::shutdown",
                result = "ok",
                "Engine stopped"
            ),
            Ok(Err(err)) => warn!(
                target = "pressroom::pool::engine",
                op = "engine::shutdown",
                result = "error",
                error = %err,
                "Engine did not stop cleanly"
            ),
            Err(_) => warn!(
                target = "pressroom::pool::engine",
                op = "engine::shutdown",
                result = "timeout",
                timeout_ms = timeout.as_millis() as u64,
                "Engine stop timed out"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::fake::FakeLauncher;

    #[tokio::test]
    async fn concurrent_callers_share_one_launch() {
        let launcher = FakeLauncher::new().with_launch_delay(Duration::from_millis(20));
        let handle = Arc::new(EngineHandle::new(launcher.shared()));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.instance().await })
            })
            .collect();

        let mut engines = Vec::new();
        for task in tasks {
            engines.push(task.await.expect("join").expect("engine"));
        }

        assert_eq!(launcher.launches(), 1);
        assert!(engines.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn reset_only_discards_the_named_instance() {
        let launcher = FakeLauncher::new();
        let handle = EngineHandle::new(launcher.shared());

        let first = handle.instance().await.expect("first engine");
        assert!(handle.reset(&first).await);
        let second = handle.instance().await.expect("second engine");
        assert_eq!(launcher.launches(), 2);

        // A late reset naming the old engine leaves the new one alone.
        assert!(!handle.reset(&first).await);
        let again = handle.instance().await.expect("same engine");
        assert!(Arc::ptr_eq(&second, &again));
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn launch_failure_leaves_handle_empty() {
        let launcher = FakeLauncher::new().fail_launches(1);
        let handle = EngineHandle::new(launcher.shared());

        assert!(matches!(
            handle.instance().await,
            Err(EngineError::Launch(_))
        ));
        assert!(!handle.is_running().await);
        handle.instance().await.expect("second launch succeeds");
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_once_and_ignores_failures() {
        let launcher = FakeLauncher::new();
        let handle = EngineHandle::new(launcher.shared());

        handle.shutdown(Duration::from_millis(50)).await;
        assert_eq!(launcher.engine_closes(), 0);

        handle.instance().await.expect("engine");
        handle.shutdown(Duration::from_millis(50)).await;
        handle.shutdown(Duration::from_millis(50)).await;
        assert_eq!(launcher.engine_closes(), 1);
        assert!(!handle.is_running().await);
    }
}
