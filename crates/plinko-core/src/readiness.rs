//! Startup readiness: wait for an input file produced by another process

use std::path::Path;
use std::time::Duration;

use tracing::info;

/// Poll for `path` once per `interval`, at most `attempts` times.
///
/// Returns `true` as soon as the file exists, `false` once the attempts are
/// exhausted. Blocks the calling thread.
pub fn wait_for_file(path: &Path, attempts: u32, interval: Duration) -> bool {
    info!(path = %path.display(), "Waiting for input file");
    for attempt in 0..attempts {
        if path.exists() {
            info!(path = %path.display(), "Input file found");
            return true;
        }
        if attempt > 0 && attempt % 10 == 0 {
            info!(attempt, attempts, "Still waiting");
        }
        std::thread::sleep(interval);
    }
    path.exists()
}
