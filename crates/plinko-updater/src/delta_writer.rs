//! Per-block delta file writer
//!
//! Each processed block with at least one change produces
//! `delta-{block:06}.bin` in the deltas directory. Clients download the files
//! in block order and XOR every record into their local hint.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use plinko_core::delta::{decode_deltas, encode_deltas};
use plinko_core::HintDelta;

const FILE_PREFIX: &str = "delta-";
const FILE_SUFFIX: &str = ".bin";

/// Writes delta files into one directory
#[derive(Debug, Clone)]
pub struct DeltaWriter {
    deltas_dir: PathBuf,
}

impl DeltaWriter {
    pub fn new(deltas_dir: impl AsRef<Path>) -> Self {
        Self {
            deltas_dir: deltas_dir.as_ref().to_path_buf(),
        }
    }

    /// Create the deltas directory if it does not exist yet
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.deltas_dir)?;
        Ok(())
    }

    pub fn deltas_dir(&self) -> &Path {
        &self.deltas_dir
    }

    /// Path of the delta file for `block`
    pub fn path_for(&self, block: u64) -> PathBuf {
        self.deltas_dir.join(file_name(block))
    }

    /// Write the deltas of one block, replacing any previous file
    pub fn write(&self, block: u64, deltas: &[HintDelta]) -> anyhow::Result<PathBuf> {
        let path = self.path_for(block);

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&encode_deltas(deltas))?;
        writer.flush()?;

        tracing::debug!(
            path = %path.display(),
            block,
            deltas = deltas.len(),
            "Wrote delta file"
        );

        Ok(path)
    }

    /// Read back the deltas of one block
    pub fn read(&self, block: u64) -> anyhow::Result<Vec<HintDelta>> {
        let data = std::fs::read(self.path_for(block))?;
        Ok(decode_deltas(&data)?)
    }

    /// Newest block that has a delta file, if any
    pub fn latest_block(&self) -> anyhow::Result<Option<u64>> {
        if !self.deltas_dir.exists() {
            return Ok(None);
        }

        let mut latest = None;
        for entry in std::fs::read_dir(&self.deltas_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(block) = name.to_str().and_then(parse_block) {
                latest = latest.max(Some(block));
            }
        }
        Ok(latest)
    }
}

fn file_name(block: u64) -> String {
    format!("{FILE_PREFIX}{block:06}{FILE_SUFFIX}")
}

/// Block number encoded in a delta file name
pub fn parse_block(name: &str) -> Option<u64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}
