use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GpioError;

pub const DEFAULT_HELPER: &str = "gpio-admin";
pub const DEFAULT_GPIO_ROOT: &str = "/sys/devices/virtual/gpio";
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub path: String,
}

/// When callers may be served relative to the board revision probe.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProbePolicy {
    /// Operations wait for the probe to settle before resolving a pin.
    #[default]
    Await,
    /// Operations resolve against whatever mapping exists at call time.
    Race,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GpioConfig {
    /// Privileged program invoked as `<helper> [helper_args..] export <line> <pull>`.
    pub helper: String,
    pub helper_args: Vec<String>,
    /// Directory holding the `gpio<line>` control directories.
    pub gpio_root: PathBuf,
    pub cmdline_path: PathBuf,
    pub probe_policy: ProbePolicy,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            helper: DEFAULT_HELPER.to_string(),
            helper_args: Vec::new(),
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
            cmdline_path: PathBuf::from(DEFAULT_CMDLINE_PATH),
            probe_policy: ProbePolicy::default(),
        }
    }
}

impl GpioConfig {
    pub fn line_dir(&self, line: u32) -> PathBuf {
        self.gpio_root.join(format!("gpio{line}"))
    }

    pub fn direction_path(&self, line: u32) -> PathBuf {
        self.line_dir(line).join("direction")
    }

    pub fn value_path(&self, line: u32) -> PathBuf {
        self.line_dir(line).join("value")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GpioError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| GpioError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| GpioError::Config(format!("Invalid config json: {e}")))
    }
}
