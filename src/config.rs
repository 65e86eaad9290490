use crate::calculations::allocation::AllocationStatus;
use crate::window::DEFAULT_WINDOW_DAYS;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_PATH_VAR: &str = "CAPACITY_PLANNER_CONFIG";
pub const HTTP_ADDR_VAR: &str = "CAPACITY_PLANNER_HTTP_ADDR";
pub const DATABASE_VAR: &str = "CAPACITY_PLANNER_DB";

pub const DEFAULT_RAG_AMBER_BUFFER: f64 = 3.0;
/// Upper bound for `default_window_days`, ten years.
pub const MAX_WINDOW_DAYS: i64 = 3653;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid allocation thresholds: {0}")]
    Thresholds(String),
    #[error("invalid setting {name}: {message}")]
    Setting { name: &'static str, message: String },
}

/// One row of the allocation tier table: percentages strictly above
/// `above` classify as `status`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTier {
    pub above: f64,
    pub status: AllocationStatus,
}

/// Ordered tier table shared by every allocation classification. Tiers are
/// checked top-down with strict `>` comparisons; the first match wins and
/// anything below the last tier is `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationThresholds {
    pub tiers: Vec<ThresholdTier>,
    pub fallback: AllocationStatus,
}

impl Default for AllocationThresholds {
    fn default() -> Self {
        Self {
            tiers: vec![
                ThresholdTier {
                    above: 120.0,
                    status: AllocationStatus::Overallocated,
                },
                ThresholdTier {
                    above: 90.0,
                    status: AllocationStatus::Full,
                },
                ThresholdTier {
                    above: 50.0,
                    status: AllocationStatus::Balanced,
                },
            ],
            fallback: AllocationStatus::Underallocated,
        }
    }
}

impl AllocationThresholds {
    /// The three-tier table with no Overallocated level: anything above 90
    /// is Full.
    pub fn without_overallocated_tier() -> Self {
        let mut thresholds = Self::default();
        thresholds
            .tiers
            .retain(|tier| tier.status != AllocationStatus::Overallocated);
        thresholds
    }

    pub fn classify(&self, percentage: f64) -> AllocationStatus {
        self.tiers
            .iter()
            .find(|tier| percentage > tier.above)
            .map(|tier| tier.status)
            .unwrap_or(self.fallback)
    }

    /// Cut-offs must be finite and strictly descending.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in &self.tiers {
            if !tier.above.is_finite() {
                return Err(ConfigError::Thresholds(format!(
                    "cut-off for {} is not a finite number",
                    tier.status
                )));
            }
        }
        for pair in self.tiers.windows(2) {
            if pair[1].above >= pair[0].above {
                return Err(ConfigError::Thresholds(format!(
                    "cut-offs must be strictly descending ({} then {})",
                    pair[0].above, pair[1].above
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub http_addr: String,
    pub database_path: PathBuf,
    pub default_window_days: i64,
    pub rag_amber_buffer: f64,
    pub thresholds: AllocationThresholds,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:3000".to_string(),
            database_path: PathBuf::from("capacity-planner.db"),
            default_window_days: DEFAULT_WINDOW_DAYS,
            rag_amber_buffer: DEFAULT_RAG_AMBER_BUFFER,
            thresholds: AllocationThresholds::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the JSON file named by `CAPACITY_PLANNER_CONFIG`, then
    /// individual environment overrides. A `.env` file is honoured.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                info!(path = %path, "loading planner config");
                Self::from_file(path.trim())?
            }
            _ => Self::default(),
        };
        if let Ok(addr) = env::var(HTTP_ADDR_VAR) {
            config.http_addr = addr;
        }
        if let Ok(path) = env::var(DATABASE_VAR) {
            config.database_path = PathBuf::from(path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_window_days < 0 {
            return Err(ConfigError::Setting {
                name: "default_window_days",
                message: format!("must not be negative (got {})", self.default_window_days),
            });
        }
        if self.default_window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::Setting {
                name: "default_window_days",
                message: format!(
                    "must be at most {MAX_WINDOW_DAYS} (got {})",
                    self.default_window_days
                ),
            });
        }
        if !self.rag_amber_buffer.is_finite() {
            return Err(ConfigError::Setting {
                name: "rag_amber_buffer",
                message: "must be a finite number".into(),
            });
        }
        self.thresholds.validate()
    }
}
