use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub classifier: ClassifierConfig,
    pub report: ReportConfig,
    pub batch: BatchConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Nominal interval between two readings of the same monitor-type
    pub interval_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of consecutive readings inspected for a stuck value (K)
    pub constant_window: usize,
    /// Two values closer than this are considered equal
    pub constant_epsilon: f64,
    /// The stuck window must span strictly more than this many seconds
    pub constant_min_duration_secs: i64,
    /// Completeness in percent below which a reading is LessThanExpected
    pub completeness_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Civil time zone offset used for day and hour boundaries
    pub utc_offset_hours: i8,
    /// Display precision of cell values
    pub decimals: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of report tasks running at once
    pub concurrency: usize,
    /// Per-task deadline; a task exceeding it is cancelled and omitted
    pub task_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    #[default]
    Memory,
    Snapshot {
        path: PathBuf,
    },
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            constant_window: 5,
            constant_epsilon: 1e-6,
            constant_min_duration_secs: 3 * 3600,
            completeness_threshold: 90.0,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 8,
            decimals: 2,
        }
    }
}

impl ReportConfig {
    pub fn offset(&self) -> Result<jiff::tz::Offset, jiff::Error> {
        jiff::tz::Offset::from_hours(self.utc_offset_hours)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            task_timeout_secs: 30,
        }
    }
}

impl BatchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
