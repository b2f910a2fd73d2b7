use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, InternalResult};

/// How a compiled script is executed. Nothing here changes simulation
/// results, except `seed` when the script sets no `random_seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Upper bound on worker tasks; `None` uses all cores but one.
    #[serde(default = "default_max_workers")]
    pub max_workers: Option<usize>,

    /// When false every subject runs in the calling task.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Steps between progress reports of a subject.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Seed used when the script has no `random_seed`.
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            parallel: default_true(),
            progress_interval: default_progress_interval(),
            seed: default_seed(),
        }
    }
}

impl SimulationConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file(path: &str) -> InternalResult<Self> {
        from_file(path)
    }

    /// Workers for `n_subjects`, the first subject excluded.
    pub fn worker_count(&self, n_subjects: usize) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let limit = self
            .max_workers
            .unwrap_or_else(|| cores.saturating_sub(1))
            .max(1);
        n_subjects.saturating_sub(1).min(limit).max(1)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Internal(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Internal(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

// デフォルト値の定義
fn default_max_workers() -> Option<usize> {
    None
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> usize {
    100
}

fn default_seed() -> Option<u64> {
    None
}
