use log::{debug, info, warn};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::{GpioConfig, ProbePolicy};
use crate::error::GpioError;
use crate::pins::{Direction, LEGACY_PIN_OVERRIDES, PinOptions, PinTable, Pull, Reading};
use crate::revision::{BoardRevision, probe_revision};

/// Everything the manager needs from the outside world: the privileged
/// export helper and the control files it exposes.
pub trait GpioBackend: Send + Sync {
    fn export_line(
        &self,
        line: u32,
        pull: Pull,
    ) -> impl Future<Output = Result<(), GpioError>> + Send;
    fn unexport_line(&self, line: u32) -> impl Future<Output = Result<(), GpioError>> + Send;
    fn read_file(&self, path: &Path) -> impl Future<Output = Result<String, GpioError>> + Send;
    fn write_file(
        &self,
        path: &Path,
        contents: &str,
    ) -> impl Future<Output = Result<(), GpioError>> + Send;
}

/// Owns the pin table and the set of pins this process has exported.
///
/// Each instance is independent. Concurrent `open`/`close` calls on the same
/// pin are not serialized: tracking updates are immediate, but the helper
/// invocations and file writes of overlapping calls may interleave.
pub struct GpioManager<B: GpioBackend> {
    config: GpioConfig,
    backend: Arc<B>,
    table: RwLock<PinTable>,
    used: Mutex<Vec<u32>>,
    listeners: Mutex<Vec<AbortHandle>>,
    ready: watch::Sender<bool>,
    probe_started: AtomicBool,
}

impl<B: GpioBackend> GpioManager<B> {
    pub fn new(config: GpioConfig, backend: Arc<B>) -> Self {
        let (ready, _) = watch::channel(true);

        Self {
            config,
            backend,
            table: RwLock::new(PinTable::default()),
            used: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            ready,
            probe_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    /// Resolves against the table as it is right now, probe or not.
    pub fn resolve(&self, pin: u32) -> Result<u32, GpioError> {
        self.table.read().resolve(pin)
    }

    pub fn table(&self) -> PinTable {
        self.table.read().clone()
    }

    pub fn used_pins(&self) -> Vec<u32> {
        self.used.lock().clone()
    }

    pub fn is_used(&self, pin: u32) -> bool {
        self.used.lock().contains(&pin)
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Completes once no revision probe is pending.
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn apply_revision(&self, revision: BoardRevision) {
        if revision.uses_legacy_pins() {
            info!("legacy board revision detected, applying pin overrides");
            self.table.write().apply_override(LEGACY_PIN_OVERRIDES);
        }
    }

    async fn line_for(&self, pin: u32) -> Result<u32, GpioError> {
        if self.config.probe_policy == ProbePolicy::Await {
            self.ready().await;
        }
        self.resolve(pin)
    }

    /// Returns true when the pin wasn't tracked before.
    fn track(&self, pin: u32) -> bool {
        let mut used = self.used.lock();
        if used.contains(&pin) {
            false
        } else {
            used.push(pin);
            true
        }
    }

    fn untrack(&self, pin: u32) {
        self.used.lock().retain(|p| *p != pin);
    }

    /// Exports `pin` with the requested pull and then sets its direction.
    ///
    /// The pin is tracked from the moment the export is requested, so a
    /// cleanup racing the export still releases it. A failed export drops a
    /// pin this call started tracking and skips the direction write.
    pub async fn open(&self, pin: u32, options: impl Into<PinOptions>) -> Result<(), GpioError> {
        let options = options.into();
        let line = self.line_for(pin).await?;
        let newly_tracked = self.track(pin);

        info!(
            "opening pin {pin} (line {line}) as {} {:?}",
            options.direction, options.pull
        );
        if let Err(e) = self.backend.export_line(line, options.pull).await {
            if newly_tracked {
                self.untrack(pin);
            }
            return Err(e);
        }

        self.set_direction(pin, options.direction).await
    }

    pub async fn export(&self, pin: u32, options: impl Into<PinOptions>) -> Result<(), GpioError> {
        self.open(pin, options).await
    }

    /// Stops tracking `pin` and unexports it. Tracking is dropped even when
    /// the helper fails; nothing is retried.
    pub async fn close(&self, pin: u32) -> Result<(), GpioError> {
        let line = self.line_for(pin).await?;
        self.untrack(pin);

        info!("closing pin {pin} (line {line})");
        self.backend.unexport_line(line).await
    }

    pub async fn unexport(&self, pin: u32) -> Result<(), GpioError> {
        self.close(pin).await
    }

    pub async fn set_direction(
        &self,
        pin: u32,
        direction: impl Into<Direction>,
    ) -> Result<(), GpioError> {
        let direction = direction.into();
        let line = self.line_for(pin).await?;

        debug!("pin {pin} (line {line}) direction -> {direction}");
        self.backend
            .write_file(&self.config.direction_path(line), direction.as_str())
            .await
    }

    pub async fn get_direction(&self, pin: u32) -> Result<Direction, GpioError> {
        let line = self.line_for(pin).await?;
        let contents = self
            .backend
            .read_file(&self.config.direction_path(line))
            .await?;

        Direction::parse_strict(&contents)
    }

    /// Reads the value file. Content that isn't a number yields an empty
    /// [`Reading`] rather than an error.
    pub async fn read(&self, pin: u32) -> Result<Reading, GpioError> {
        let line = self.line_for(pin).await?;
        let contents = self.backend.read_file(&self.config.value_path(line)).await?;

        Ok(Reading::parse(&contents))
    }

    /// Writes "1" or "0". Input pins are not rejected here, the kernel decides.
    pub async fn write(&self, pin: u32, value: bool) -> Result<(), GpioError> {
        let line = self.line_for(pin).await?;
        let token = if value { "1" } else { "0" };

        debug!("pin {pin} (line {line}) value -> {token}");
        self.backend
            .write_file(&self.config.value_path(line), token)
            .await
    }

    /// Registers a periodic task owned by higher-level code so that
    /// [`cleanup`](Self::cleanup) cancels it.
    pub fn track_listener(&self, handle: AbortHandle) {
        self.listeners.lock().push(handle);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Cancels every registered listener and closes every tracked pin.
    ///
    /// Works on a snapshot: pins opened while cleanup runs are left alone.
    /// A failing close doesn't stop the others; all failures are returned
    /// together.
    pub async fn cleanup(&self) -> Result<(), GpioError> {
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in &listeners {
            listener.abort();
        }

        let pins = self.used_pins();
        if !pins.is_empty() || !listeners.is_empty() {
            info!(
                "cleanup: {} pin(s), {} listener(s)",
                pins.len(),
                listeners.len()
            );
        }

        let mut failures = Vec::new();
        for pin in pins {
            if let Err(e) = self.close(pin).await {
                warn!("cleanup: closing pin {pin} failed: {e}");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GpioError::Cleanup(failures))
        }
    }
}

impl<B: GpioBackend + 'static> GpioManager<B> {
    /// Starts the board revision probe on the runtime. The manager reports
    /// not-ready until the probe has settled and the table is patched.
    ///
    /// The table is patched at most once per manager: later calls return
    /// `None` without probing again.
    pub fn spawn_revision_probe(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.probe_started.swap(true, Ordering::SeqCst) {
            return None;
        }

        self.ready.send_replace(false);
        let settle = ReadyOnDrop {
            manager: Arc::clone(self),
        };

        Some(tokio::spawn(async move {
            let manager = &settle.manager;
            let revision =
                probe_revision(manager.backend.as_ref(), &manager.config.cmdline_path).await;
            if let Some(revision) = revision {
                manager.apply_revision(revision);
            }
            drop(settle);
        }))
    }
}

/// Marks the manager ready however the probe task ends: completion, abort,
/// panic or runtime shutdown.
struct ReadyOnDrop<B: GpioBackend> {
    manager: Arc<GpioManager<B>>,
}

impl<B: GpioBackend> Drop for ReadyOnDrop<B> {
    fn drop(&mut self) {
        self.manager.ready.send_replace(true);
    }
}
