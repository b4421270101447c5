//! Scoring and model tuning loaded from config.toml.
//!
//! Every constant the matching engine, anomaly detector, recommender, and
//! transporter assignment use lives here, so deployments can adjust them
//! without a rebuild. Missing file or missing sections fall back to the
//! defaults below, which are the canonical production values.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Top-level tuning structure, one section per subsystem
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Tuning {
    /// Match scoring weights and expiry windows
    pub matching: MatchingTuning,
    /// Anomaly detection thresholds and model parameters
    pub anomaly: AnomalyTuning,
    /// Collaborative-filtering recommender hyperparameters
    pub recommender: RecommenderTuning,
    /// Transporter assignment limits
    pub transporter: TransporterTuning,
}

/// Weights for the donation-to-request match score
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingTuning {
    /// Score contributed per fulfillable unit
    pub quantity_weight: i64,
    /// Days-to-expiry below which the urgent bonus applies
    pub urgent_expiry_days: i64,
    /// Bonus for donations expiring very soon
    pub urgent_bonus: i64,
    /// Days-to-expiry below which the soon bonus applies
    pub soon_expiry_days: i64,
    /// Bonus for donations expiring soon
    pub soon_bonus: i64,
    /// Bonus for relief recipients when the donation expires soon
    pub relief_bonus: i64,
    /// Flat bonus for social-welfare recipients
    pub social_welfare_bonus: i64,
}

impl Default for MatchingTuning {
    fn default() -> Self {
        Self {
            quantity_weight: 10,
            urgent_expiry_days: 3,
            urgent_bonus: 50,
            soon_expiry_days: 7,
            soon_bonus: 20,
            relief_bonus: 30,
            social_welfare_bonus: 10,
        }
    }
}

/// Thresholds and model parameters for the anomaly detector
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnomalyTuning {
    /// Trees in the isolation forest ensemble
    pub trees: usize,
    /// Subsample cap per tree (effective cap is min of this and N)
    pub max_samples: usize,
    /// Model score at or above which a donation counts as a statistical
    /// outlier. Scores are in (0, 1), higher = more anomalous.
    pub score_threshold: f64,
    /// Quantities below this are never flagged
    pub min_quantity: i64,
    /// Rule-only (single observation) path: quantities above this are left
    /// for admin review instead of auto-flagged without population context
    pub single_sample_max_quantity: i64,
    /// Donations expiring later than this many days are never flagged
    pub near_expiry_days: i64,
    /// Quantity at which the extreme-case override kicks in
    pub extreme_quantity: i64,
    /// Expiry window for the extreme-case override
    pub extreme_expiry_days: i64,
    /// Fixed RNG seed for reproducible scoring; None draws from entropy
    pub seed: Option<u64>,
}

impl Default for AnomalyTuning {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            score_threshold: 0.6,
            min_quantity: 100,
            single_sample_max_quantity: 20_000,
            near_expiry_days: 4,
            extreme_quantity: 10_000,
            extreme_expiry_days: 7,
            seed: None,
        }
    }
}

/// Hyperparameters for the matrix-factorization recommender
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecommenderTuning {
    /// Latent factor dimension
    pub factors: usize,
    /// SGD epochs per training run
    pub epochs: usize,
    /// SGD learning rate
    pub learning_rate: f64,
    /// L2 regularization strength
    pub regularization: f64,
    /// Fixed RNG seed for reproducible training; None draws from entropy
    pub seed: Option<u64>,
}

impl Default for RecommenderTuning {
    fn default() -> Self {
        Self {
            factors: 10,
            epochs: 50,
            learning_rate: 0.01,
            regularization: 0.05,
            seed: None,
        }
    }
}

/// Limits for nearest-transporter assignment
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TransporterTuning {
    /// Maximum pickup distance in meters; None considers every candidate
    pub max_distance_m: Option<f64>,
}

/// Loads tuning from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_tuning<P: AsRef<Path>>(path: P) -> Result<Tuning> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads tuning from ./config.toml, falling back to defaults when the file
/// does not exist.
///
/// # Errors
/// Returns an error only if the file exists but cannot be parsed.
pub fn load_default_tuning() -> Result<Tuning> {
    if Path::new("config.toml").exists() {
        load_tuning("config.toml")
    } else {
        Ok(Tuning::default())
    }
}
