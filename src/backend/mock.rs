use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::{DEFAULT_GPIO_ROOT, GpioConfig};
use crate::error::GpioError;
use crate::gpio::GpioBackend;
use crate::pins::Pull;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperCall {
    Export { line: u32, pull: Pull },
    Unexport { line: u32 },
}

/// In-memory stand-in for the export helper and the gpio sysfs tree.
///
/// Exporting a line creates its `direction` ("in") and `value` ("0") files the
/// way the kernel does, unexporting removes them. Writes to files that don't
/// exist fail with `NotFound`, and writing `value` on an input line fails with
/// `PermissionDenied`.
pub struct MockGpioBackend {
    config: GpioConfig,
    files: Mutex<FxHashMap<PathBuf, String>>,
    calls: Mutex<Vec<HelperCall>>,
    export_failures: Mutex<FxHashMap<u32, String>>,
    unexport_failures: Mutex<FxHashMap<u32, String>>,
    file_ops: AtomicUsize,
}

impl Default for MockGpioBackend {
    fn default() -> Self {
        Self::new(DEFAULT_GPIO_ROOT)
    }
}

impl MockGpioBackend {
    pub fn new(gpio_root: impl Into<PathBuf>) -> Self {
        let config = GpioConfig {
            gpio_root: gpio_root.into(),
            ..GpioConfig::default()
        };

        Self {
            config,
            files: Mutex::new(FxHashMap::default()),
            calls: Mutex::new(Vec::new()),
            export_failures: Mutex::new(FxHashMap::default()),
            unexport_failures: Mutex::new(FxHashMap::default()),
            file_ops: AtomicUsize::new(0),
        }
    }

    /// Seeds a file, e.g. the boot command line or a corrupted value file.
    pub fn set_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.files.lock().insert(path.into(), contents.to_string());
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    pub fn fail_export(&self, line: u32, stderr: &str) {
        self.export_failures.lock().insert(line, stderr.to_string());
    }

    pub fn fail_unexport(&self, line: u32, stderr: &str) {
        self.unexport_failures.lock().insert(line, stderr.to_string());
    }

    pub fn calls(&self) -> Vec<HelperCall> {
        self.calls.lock().clone()
    }

    pub fn unexport_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, HelperCall::Unexport { .. }))
            .count()
    }

    /// Number of `read_file`/`write_file` calls seen so far.
    pub fn file_ops(&self) -> usize {
        self.file_ops.load(Ordering::SeqCst)
    }

    pub fn is_exported(&self, line: u32) -> bool {
        self.files
            .lock()
            .contains_key(&self.config.direction_path(line))
    }
}

fn not_found(path: &Path) -> GpioError {
    GpioError::io(path, io::Error::from(io::ErrorKind::NotFound))
}

impl GpioBackend for MockGpioBackend {
    async fn export_line(&self, line: u32, pull: Pull) -> Result<(), GpioError> {
        self.calls.lock().push(HelperCall::Export { line, pull });

        if let Some(stderr) = self.export_failures.lock().get(&line) {
            return Err(GpioError::ExportFailed {
                line,
                stderr: stderr.clone(),
            });
        }

        let mut files = self.files.lock();
        files
            .entry(self.config.direction_path(line))
            .or_insert_with(|| "in".to_string());
        files
            .entry(self.config.value_path(line))
            .or_insert_with(|| "0".to_string());
        Ok(())
    }

    async fn unexport_line(&self, line: u32) -> Result<(), GpioError> {
        self.calls.lock().push(HelperCall::Unexport { line });

        if let Some(stderr) = self.unexport_failures.lock().get(&line) {
            return Err(GpioError::UnexportFailed {
                line,
                stderr: stderr.clone(),
            });
        }

        let mut files = self.files.lock();
        files.remove(&self.config.direction_path(line));
        files.remove(&self.config.value_path(line));
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String, GpioError> {
        self.file_ops.fetch_add(1, Ordering::SeqCst);

        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), GpioError> {
        self.file_ops.fetch_add(1, Ordering::SeqCst);

        let mut files = self.files.lock();
        if !files.contains_key(path) {
            return Err(not_found(path));
        }

        if path.file_name().is_some_and(|name| name == "value") {
            let direction = path.with_file_name("direction");
            if files.get(&direction).is_some_and(|d| d.trim() == "in") {
                return Err(GpioError::io(
                    path,
                    io::Error::from(io::ErrorKind::PermissionDenied),
                ));
            }
        }

        files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}
