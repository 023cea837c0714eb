use log::{debug, warn};
use std::path::Path;

use crate::gpio::GpioBackend;

const BOARDREV_KEY: &str = "boardrev";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardRevision {
    /// `boardrev` 0x02 or 0x03: the default pin table applies.
    Rev2,
    /// Anything else, including a command line without `boardrev`.
    Legacy,
}

impl BoardRevision {
    pub fn from_cmdline(cmdline: &str) -> Self {
        let rev = cmdline
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
            .find(|(key, _)| key.ends_with(BOARDREV_KEY))
            .map(|(_, value)| value.trim());

        match rev.and_then(parse_hex) {
            Some(0x02) | Some(0x03) => BoardRevision::Rev2,
            _ => BoardRevision::Legacy,
        }
    }

    pub fn uses_legacy_pins(&self) -> bool {
        matches!(self, BoardRevision::Legacy)
    }
}

fn parse_hex(value: &str) -> Option<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}

/// Reads the boot command line and classifies the board. `None` when the
/// command line can't be read, in which case the default table stays.
pub async fn probe_revision<B: GpioBackend>(
    backend: &B,
    cmdline_path: &Path,
) -> Option<BoardRevision> {
    match backend.read_file(cmdline_path).await {
        Ok(cmdline) => {
            let rev = BoardRevision::from_cmdline(&cmdline);
            debug!("board revision from {}: {rev:?}", cmdline_path.display());
            Some(rev)
        }
        Err(e) => {
            warn!("board revision probe failed, keeping default pin table: {e}");
            None
        }
    }
}
