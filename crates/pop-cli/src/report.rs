use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pop_generate::SummaryReporter;
use serde::Serialize;

use crate::CliError;

/// JSON summary written at the end of a run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub run_id: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub created: u64,
    pub failed: usize,
    pub entities: &'a SummaryReporter,
}

impl<'a> RunReport<'a> {
    pub fn new(
        run_id: String,
        seed: u64,
        started_at: DateTime<Utc>,
        duration_ms: u128,
        summary: &'a SummaryReporter,
    ) -> Self {
        Self {
            run_id,
            seed,
            started_at,
            duration_ms,
            created: summary.total_created(),
            failed: summary.total_failed(),
            entities: summary,
        }
    }
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let data = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &data)
}

/// Write through a sibling temp file and rename, so readers never see a partial file.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf, CliError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CliError::InvalidConfig(format!("invalid output path '{}'", path.display())))?;
    let tmp_name = format!("{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}
