use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedPlan;
use crate::transfer::TransferMode;

/// Current plan file format version
const PLAN_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Resolved plan as written by `--save-plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub mode: TransferMode,
    pub entries: Vec<PlanEntry>,
}

impl PlanFile {
    pub fn new(plan: &ResolvedPlan, mode: TransferMode) -> Self {
        Self {
            version: PLAN_FILE_VERSION,
            generated_at: Utc::now(),
            mode,
            entries: plan
                .entries
                .iter()
                .map(|(source, destination)| PlanEntry {
                    source: source.clone(),
                    destination: destination.clone(),
                })
                .collect(),
        }
    }

    /// Write through a temporary file next to `path`, then rename over it.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut writer = BufWriter::new(File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
