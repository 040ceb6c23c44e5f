//! Start/stop control over a background player.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::JoinHandle,
};

use crate::{
    catalog::EffectCatalog,
    config::AppConfig,
    error::LedMatrixError,
    player::{Player, PlayerOptions},
    sink::DisplaySink,
    Result,
};

/// Cooperative cancellation flag, checked once per frame.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Builds the sink for each run.
pub type SinkFactory = Arc<dyn Fn() -> Result<Box<dyn DisplaySink>> + Send + Sync>;

#[derive(Debug, Default)]
struct Shared {
    current: Option<String>,
    last_error: Option<String>,
}

struct Worker {
    cancel: CancelHandle,
    handle: JoinHandle<()>,
}

enum Program {
    Single(String),
    Rotation,
}

/// Keeps at most one effect running on its own thread.
pub struct Controller {
    catalog: EffectCatalog,
    config: AppConfig,
    sink_factory: SinkFactory,
    options: PlayerOptions,
    shared: Arc<Mutex<Shared>>,
    worker: Option<Worker>,
}

impl Controller {
    pub fn new(catalog: EffectCatalog, config: AppConfig, sink_factory: SinkFactory) -> Self {
        Self {
            catalog,
            config,
            sink_factory,
            options: PlayerOptions::default(),
            shared: Arc::new(Mutex::new(Shared::default())),
            worker: None,
        }
    }

    pub fn with_options(mut self, options: PlayerOptions) -> Self {
        self.options = options;
        self
    }

    fn shared(&self) -> Result<MutexGuard<'_, Shared>> {
        lock(&self.shared)
    }

    /// Stops whatever is running, then starts `id`. Configuration problems
    /// are reported here, before a thread is spawned.
    pub fn start(&mut self, id: &str) -> Result<()> {
        self.stop()?;
        self.options.validate()?;
        self.catalog.instantiate(id, &self.config)?;
        self.spawn(Program::Single(id.to_string()), id.to_string())
    }

    /// Stops whatever is running, then starts the configured rotation.
    pub fn start_rotation(&mut self) -> Result<()> {
        self.stop()?;
        self.config.validate()?;
        self.options.validate()?;
        for id in &self.config.rotation.effects {
            self.catalog.instantiate(id, &self.config)?;
        }
        self.spawn(Program::Rotation, "rotation".to_string())
    }

    fn spawn(&mut self, program: Program, label: String) -> Result<()> {
        let mut sink = (self.sink_factory)()?;
        let mut player = Player::new(self.catalog.clone(), self.config.clone())?.with_options(self.options.clone());
        let cancel = CancelHandle::new();
        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let thread_label = label.clone();
        // Locked across the spawn so the worker cannot clear `current` first.
        let mut state = lock(&self.shared)?;
        let handle = std::thread::Builder::new()
            .name(format!("effect-{}", label))
            .spawn(move || {
                let result = match &program {
                    Program::Single(id) => player.run_single(id, &mut sink, &token),
                    Program::Rotation => player.run_rotation(&mut sink, &token),
                };
                let Ok(mut state) = lock(&shared) else {
                    return;
                };
                state.current = None;
                if let Err(err) = result {
                    tracing::error!(effect = %thread_label, error = %err, "effect run failed");
                    state.last_error = Some(err.to_string());
                }
            })?;
        state.current = Some(label.clone());
        state.last_error = None;
        drop(state);
        tracing::info!(effect = %label, "controller started");
        self.worker = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Cancels and joins the running effect. Calling it with nothing running
    /// is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.cancel.cancel();
        worker
            .handle
            .join()
            .map_err(|_| LedMatrixError::msg("effect thread panicked"))?;
        self.shared()?.current = None;
        tracing::info!("controller stopped");
        Ok(())
    }

    /// Id of the running effect, or `"rotation"` while a rotation plays.
    pub fn current(&self) -> Option<String> {
        self.shared().ok().and_then(|s| s.current.clone())
    }

    /// Message of the last run that ended in an error.
    pub fn last_error(&self) -> Option<String> {
        self.shared().ok().and_then(|s| s.last_error.clone())
    }

    /// Whether the background thread is still alive.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "controller shutdown failed");
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>> {
    shared
        .lock()
        .map_err(|_| LedMatrixError::msg("controller state lock poisoned"))
}
