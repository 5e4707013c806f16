//! Decision journal
//!
//! Append-only JSON-lines file with one entry per pass:
//! - timestamp and dry-run flag
//! - decision and the rule that fired
//! - what the actuation guard did
//! - raw inputs (battery state, tariff and forecast windows, thresholds)
//! - degraded sources and the error of a failed pass
//!
//! Rotation is left to external tooling.

use crate::controller::PassReport;
use crate::core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Journal writer
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Open a journal at `path`, creating parent directories
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report as a single line
    pub fn append(&self, report: &PassReport) -> Result<()> {
        let mut line = serde_json::to_string(report)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        // Single write so concurrent runs do not interleave within a line
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Number of entries written so far
    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
    }
}
