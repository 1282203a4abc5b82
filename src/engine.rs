//! Engine instance manager
//!
//! Lazily launches the single automation engine and memoizes it. Concurrent
//! first callers share one in-flight launch instead of starting their own.

use crate::automation::{AutomationEngine, EngineLauncher};
use crate::error::{ShowcaseError, ShowcaseResult};
use crate::metrics::Metrics;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

type LaunchFuture = Shared<BoxFuture<'static, ShowcaseResult<Arc<dyn AutomationEngine>>>>;

#[derive(Default)]
struct EngineState {
    engine: Option<Arc<dyn AutomationEngine>>,
    /// Launch currently running, tagged so a stale waiter cannot clear a
    /// newer launch.
    in_flight: Option<(u64, LaunchFuture)>,
    next_launch_id: u64,
}

pub struct EngineManager {
    launcher: Arc<dyn EngineLauncher>,
    state: Mutex<EngineState>,
    launches: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

impl EngineManager {
    pub fn new(launcher: Arc<dyn EngineLauncher>, metrics: Arc<Metrics>) -> Self {
        Self {
            launcher,
            state: Mutex::new(EngineState::default()),
            launches: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared engine, launching it on first use.
    pub async fn get_engine(&self) -> ShowcaseResult<Arc<dyn AutomationEngine>> {
        let (launch_id, launch) = {
            let mut state = self.lock_state();
            if let Some(engine) = &state.engine {
                return Ok(engine.clone());
            }

            match state.in_flight.clone() {
                Some(pending) => pending,
                None => {
                    let id = state.next_launch_id;
                    state.next_launch_id += 1;
                    let launch = self.start_launch();
                    state.in_flight = Some((id, launch.clone()));
                    (id, launch)
                }
            }
        };

        let result = launch.await;

        let mut state = self.lock_state();
        let current = matches!(&state.in_flight, Some((id, _)) if *id == launch_id);
        if current {
            state.in_flight = None;
        }
        let engine = result?;
        if current {
            state.engine = Some(engine.clone());
            return Ok(engine);
        }

        // Another waiter of the same launch already stored it.
        match &state.engine {
            Some(stored) if Arc::ptr_eq(stored, &engine) => Ok(engine),
            // `shutdown` abandoned this launch and closes its engine.
            _ => Err(ShowcaseError::EngineInitialization(
                "engine shut down during launch".into(),
            )),
        }
    }

    fn start_launch(&self) -> LaunchFuture {
        let launcher = self.launcher.clone();
        let launches = self.launches.clone();
        let metrics = self.metrics.clone();

        async move {
            info!("Launching automation engine");
            launches.fetch_add(1, Ordering::Relaxed);
            metrics.record_engine_launch();

            match launcher.launch().await {
                Ok(engine) => {
                    info!("Automation engine ready");
                    Ok(engine)
                }
                Err(e) => {
                    error!("Automation engine failed to launch: {}", e);
                    Err(match e {
                        ShowcaseError::EngineInitialization(_) => e,
                        other => ShowcaseError::EngineInitialization(other.to_string()),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().engine.is_some()
    }

    /// Number of launches attempted since creation.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }

    /// Closes the engine, if any, and forgets it so the next `get_engine`
    /// launches a fresh one. A launch still running is awaited and its engine
    /// closed as well. Pooled sessions must be disposed first.
    pub async fn shutdown(&self) -> ShowcaseResult<()> {
        let (engine, pending) = {
            let mut state = self.lock_state();
            (state.engine.take(), state.in_flight.take())
        };

        let engine = match (engine, pending) {
            (Some(engine), _) => Some(engine),
            (None, Some((_, launch))) => {
                info!("Waiting for in-flight engine launch before shutdown");
                launch.await.ok()
            }
            (None, None) => None,
        };

        match engine {
            Some(engine) => {
                info!("Shutting down automation engine");
                engine.close().await
            }
            None => Ok(()),
        }
    }
}
