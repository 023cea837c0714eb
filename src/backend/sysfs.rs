use log::{debug, error};
use std::path::Path;
use std::process::Output;

use tokio::process::Command;

use crate::config::GpioConfig;
use crate::error::GpioError;
use crate::gpio::GpioBackend;
use crate::pins::Pull;

/// Exports lines through the privileged helper program and talks to the
/// kernel's control files directly.
pub struct SysfsBackend {
    helper: String,
    helper_args: Vec<String>,
}

impl SysfsBackend {
    pub fn new(config: &GpioConfig) -> Self {
        Self {
            helper: config.helper.clone(),
            helper_args: config.helper_args.clone(),
        }
    }

    async fn run_helper(&self, args: &[&str]) -> Result<Output, String> {
        debug!("running {} {:?} {:?}", self.helper, self.helper_args, args);

        Command::new(&self.helper)
            .args(&self.helper_args)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.helper))
    }
}

fn helper_stderr(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("helper exited with {}", output.status)
    } else {
        stderr
    }
}

impl GpioBackend for SysfsBackend {
    async fn export_line(&self, line: u32, pull: Pull) -> Result<(), GpioError> {
        let line_arg = line.to_string();
        let mut args = vec!["export", line_arg.as_str()];
        if pull != Pull::None {
            args.push(pull.as_str());
        }

        let stderr = match self.run_helper(&args).await {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => helper_stderr(&output),
            Err(e) => e,
        };
        error!("Error when trying to export line {line}: {stderr}");
        Err(GpioError::ExportFailed { line, stderr })
    }

    async fn unexport_line(&self, line: u32) -> Result<(), GpioError> {
        let line_arg = line.to_string();

        let stderr = match self.run_helper(&["unexport", line_arg.as_str()]).await {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => helper_stderr(&output),
            Err(e) => e,
        };
        error!("Error when trying to unexport line {line}: {stderr}");
        Err(GpioError::UnexportFailed { line, stderr })
    }

    async fn read_file(&self, path: &Path) -> Result<String, GpioError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GpioError::io(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), GpioError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| GpioError::io(path, e))
    }
}
