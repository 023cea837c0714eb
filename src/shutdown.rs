use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::gpio::{GpioBackend, GpioManager};

/// Exit status of a process stopped by SIGINT.
const SIGINT_EXIT_STATUS: i32 = 130;

/// Releases every tracked pin when the process is interrupted.
pub struct ShutdownHook<B: GpioBackend> {
    manager: Arc<GpioManager<B>>,
    fired: AtomicBool,
}

impl<B: GpioBackend + 'static> ShutdownHook<B> {
    pub fn new(manager: Arc<GpioManager<B>>) -> Arc<Self> {
        Arc::new(Self {
            manager,
            fired: AtomicBool::new(false),
        })
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Runs cleanup the first time it is called; later calls return at once.
    pub async fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.manager.cleanup().await {
            warn!("shutdown cleanup incomplete: {e}");
        }
    }

    /// Waits for SIGINT, cleans up, then exits the way the signal would have.
    pub fn install(self: &Arc<Self>) -> JoinHandle<()> {
        let hook = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for interrupt signal: {e}");
                return;
            }

            info!("interrupt received, releasing pins");
            hook.fire().await;
            std::process::exit(SIGINT_EXIT_STATUS);
        })
    }
}
