//! Build `hint.bin` from `database.bin`

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use plinko_core::source::load_balances;
use plinko_core::{HintSnapshot, PlinkoParams};

/// Read balances, pad to `chunk_size * set_size`, write the snapshot and
/// check its size on disk
pub fn generate_hint(database_path: &Path, hint_path: &Path) -> anyhow::Result<PlinkoParams> {
    let started = Instant::now();

    let balances = load_balances(database_path)
        .with_context(|| format!("failed to read {}", database_path.display()))?;
    tracing::info!(
        entries = balances.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Read database"
    );

    let snapshot = HintSnapshot::from_balances(balances);
    let params = snapshot.params();
    tracing::info!(
        chunk_size = params.chunk_size,
        set_size = params.set_size,
        total_entries = params.total_entries(),
        padding = params.padding(),
        "Planned parameters"
    );

    snapshot
        .save(hint_path)
        .with_context(|| format!("failed to write {}", hint_path.display()))?;

    verify_output(hint_path, &snapshot)?;

    tracing::info!(
        path = %hint_path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Hint generation complete"
    );
    Ok(params)
}

/// Expected size is `32 + 8 * chunk_size * set_size`
fn verify_output(hint_path: &Path, snapshot: &HintSnapshot) -> anyhow::Result<()> {
    let actual = std::fs::metadata(hint_path)?.len();
    let expected = snapshot.expected_file_size();
    if actual != expected {
        anyhow::bail!(
            "{} is {} bytes, expected {}",
            hint_path.display(),
            actual,
            expected
        );
    }
    tracing::info!(
        bytes = actual,
        size_mb = actual as f64 / 1024.0 / 1024.0,
        "hint.bin size verified"
    );
    Ok(())
}
