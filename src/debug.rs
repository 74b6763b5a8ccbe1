// Debug logging module for MoBoggle
// File-based tracing output enabled via the --debug flag, since the terminal UI owns stdout

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::Level;

pub const LOG_FILE_PATH: &str = "/tmp/moboggle-debug.log";

/// Initialize debug logging to file
///
/// # Arguments
/// * `enabled` - Whether debug logging should be enabled (controlled by --debug flag)
///
/// # Behavior
/// - If enabled=false: Returns immediately, no subscriber is installed and
///   tracing macros stay no-ops
/// - If enabled=true: Creates/truncates the log file, writes a header and
///   installs a global subscriber writing to it
pub fn init(enabled: bool) -> io::Result<()> {
    if !enabled {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(LOG_FILE_PATH)?;

    writeln!(file, "=== MoBoggle Debug Log ===")?;
    writeln!(file, "Session started: {:?}", SystemTime::now())?;
    writeln!(file, "To monitor: tail -f {}", LOG_FILE_PATH)?;
    writeln!(file, "========================================\n")?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .with_max_level(Level::DEBUG)
        .try_init()
        .map_err(io::Error::other)
}
