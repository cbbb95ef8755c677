//! Application settings and TOML configuration parsing.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level ExamGuard configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Scheduler cadence settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Head-centering policy.
    #[serde(default)]
    pub centering: CenteringConfig,

    /// Identity verification policy.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Lighting band accepted for baseline capture.
    #[serde(default)]
    pub lighting: LightingConfig,

    /// Forbidden object policy.
    #[serde(default)]
    pub objects: ObjectConfig,

    /// Head-movement drift policy.
    #[serde(default)]
    pub drift: DriftConfig,

    /// Baseline store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Scheduler cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Evaluation tick period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Head-centering policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CenteringConfig {
    /// Per-axis tolerance around the frame center; the boundary itself is
    /// exclusive.
    #[serde(default = "default_centering_tolerance")]
    pub tolerance: f64,

    /// Settle delay in milliseconds before a capture-gating centering
    /// decision resolves.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Identity verification policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Embedding distance above which (strictly) a face is flagged as an
    /// unauthorized person.
    #[serde(default = "default_identity_threshold")]
    pub distance_threshold: f64,
}

/// Lighting band accepted for baseline capture. Levels are mean frame
/// luma in `[0, 255]`; the band is calibrated empirically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingConfig {
    /// Reject capture below this level (too dark).
    #[serde(default = "default_lighting_floor")]
    pub floor: f64,

    /// Reject capture above this level (washed out).
    #[serde(default = "default_lighting_ceiling")]
    pub ceiling: f64,
}

/// Forbidden object policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Minimum classifier confidence (strict) for a detection to count.
    #[serde(default = "default_object_confidence")]
    pub confidence_threshold: f64,

    /// Disallowed category labels, matched case-insensitively.
    #[serde(default = "default_forbidden_labels")]
    pub forbidden: Vec<String>,
}

/// Head-movement drift policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Per-axis drift (strict) above which excess movement is flagged.
    #[serde(default = "default_drift_threshold")]
    pub alert_threshold: f64,
}

/// Baseline store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the baseline key-value database.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// --- Default value functions ---

fn default_tick_ms() -> u64 {
    300
}

fn default_centering_tolerance() -> f64 {
    0.08
}

fn default_settle_ms() -> u64 {
    300
}

fn default_identity_threshold() -> f64 {
    0.6
}

fn default_lighting_floor() -> f64 {
    40.0
}

fn default_lighting_ceiling() -> f64 {
    210.0
}

fn default_object_confidence() -> f64 {
    0.5
}

fn default_forbidden_labels() -> Vec<String> {
    [
        "phone",
        "tablet",
        "book",
        "remote",
        "backpack",
        "mouse",
        "television",
        "keyboard",
        "laptop",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_drift_threshold() -> f64 {
    0.02
}

fn default_store_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share/examguard/baseline.db")
    } else {
        PathBuf::from("/tmp/examguard/baseline.db")
    }
}

// --- Trait impls ---

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            centering: CenteringConfig::default(),
            identity: IdentityConfig::default(),
            lighting: LightingConfig::default(),
            objects: ObjectConfig::default(),
            drift: DriftConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for CenteringConfig {
    fn default() -> Self {
        Self {
            tolerance: default_centering_tolerance(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_identity_threshold(),
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            floor: default_lighting_floor(),
            ceiling: default_lighting_ceiling(),
        }
    }
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_object_confidence(),
            forbidden: default_forbidden_labels(),
        }
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            alert_threshold: default_drift_threshold(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl GuardConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: GuardConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
