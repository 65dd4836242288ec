pub mod claude;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::events::Run;

/// Naming conventions that decide which files in a directory are runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Extension of raw session logs, without the dot.
    pub extension: String,
    /// Stem suffix of pretty-printed duplicates of a raw log.
    pub skip_suffix: String,
    /// Stems of side-channel logs that are not agent sessions.
    pub skip_names: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extension: "log".to_string(),
            skip_suffix: ".formatted".to_string(),
            skip_names: vec!["token-alerts".to_string(), "watcher".to_string()],
        }
    }
}

impl DiscoveryConfig {
    /// Run name for `path`, or `None` if the file is not a run source.
    pub fn run_name(&self, path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != self.extension {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if stem.ends_with(&self.skip_suffix) || self.skip_names.iter().any(|n| n == stem) {
            return None;
        }
        Some(stem.to_string())
    }
}

/// Trait for sources of agent runs.
/// Implement this to support different log layouts.
pub trait RunSource {
    /// Load every run, ordered by run name.
    fn load_runs(&self) -> Result<Vec<Run>>;
}

/// A directory holding one raw log per run.
#[derive(Debug, Clone)]
pub struct LogDirectory {
    pub dir: PathBuf,
    pub config: DiscoveryConfig,
}

impl LogDirectory {
    pub fn new(dir: impl Into<PathBuf>, config: DiscoveryConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }
}

impl RunSource for LogDirectory {
    fn load_runs(&self) -> Result<Vec<Run>> {
        claude::parse_experiment_logs(&self.dir, &self.config)
    }
}

/// A single log file treated as one run.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub name: String,
}

impl RunSource for LogFile {
    fn load_runs(&self) -> Result<Vec<Run>> {
        let events = claude::parse_log_file(&self.path)?;
        Ok(vec![Run::new(self.name.clone(), events)])
    }
}
