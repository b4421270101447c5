//! Collaborative-filtering recommender - matrix factorization over
//! donation/request interaction counts.
//!
//! Training produces an immutable [`RecommenderModel`]; a
//! [`RecommenderHandle`] swaps whole snapshots so readers never observe a
//! half-trained model. The recommender is best-effort and advisory: an empty
//! interaction history trains an empty model that scores everything 0.0, and
//! nothing in the allocation path depends on it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::tuning::RecommenderTuning;

/// One observed pairing: how many completed transactions bound this
/// donation to this request.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub donation_id: i64,
    pub request_id: i64,
    pub count: f64,
}

/// Immutable trained snapshot.
pub struct RecommenderModel {
    donation_index: HashMap<i64, usize>,
    request_index: HashMap<i64, usize>,
    request_ids: Vec<i64>,
    donation_factors: Vec<Vec<f64>>,
    request_factors: Vec<Vec<f64>>,
}

impl RecommenderModel {
    /// A model with no knowledge; predicts 0.0 for everything.
    pub fn empty() -> Self {
        Self {
            donation_index: HashMap::new(),
            request_index: HashMap::new(),
            request_ids: Vec::new(),
            donation_factors: Vec::new(),
            request_factors: Vec::new(),
        }
    }

    /// Factorizes the interaction counts with SGD. Degenerates to
    /// [`RecommenderModel::empty`] when there is nothing to learn from.
    pub fn train(interactions: &[Interaction], cfg: &RecommenderTuning) -> Self {
        if interactions.is_empty() {
            return Self::empty();
        }

        let mut donation_index = HashMap::new();
        let mut request_index = HashMap::new();
        let mut request_ids = Vec::new();
        for interaction in interactions {
            let next = donation_index.len();
            donation_index.entry(interaction.donation_id).or_insert(next);
            if !request_index.contains_key(&interaction.request_id) {
                request_index.insert(interaction.request_id, request_ids.len());
                request_ids.push(interaction.request_id);
            }
        }

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let k = cfg.factors.max(1);
        let init = |rng: &mut StdRng| -> Vec<f64> {
            (0..k).map(|_| rng.gen_range(-0.1..0.1)).collect()
        };
        let mut donation_factors: Vec<Vec<f64>> =
            (0..donation_index.len()).map(|_| init(&mut rng)).collect();
        let mut request_factors: Vec<Vec<f64>> =
            (0..request_index.len()).map(|_| init(&mut rng)).collect();

        for _ in 0..cfg.epochs {
            for interaction in interactions {
                let d = donation_index[&interaction.donation_id];
                let r = request_index[&interaction.request_id];
                let predicted: f64 = donation_factors[d]
                    .iter()
                    .zip(&request_factors[r])
                    .map(|(a, b)| a * b)
                    .sum();
                let err = interaction.count - predicted;
                for f in 0..k {
                    let df = donation_factors[d][f];
                    let rf = request_factors[r][f];
                    donation_factors[d][f] +=
                        cfg.learning_rate * (err * rf - cfg.regularization * df);
                    request_factors[r][f] +=
                        cfg.learning_rate * (err * df - cfg.regularization * rf);
                }
            }
        }

        Self {
            donation_index,
            request_index,
            request_ids,
            donation_factors,
            request_factors,
        }
    }

    /// Predicted affinity between a donation and a request; 0.0 for pairs
    /// the model has never seen.
    pub fn predict(&self, donation_id: i64, request_id: i64) -> f64 {
        match (
            self.donation_index.get(&donation_id),
            self.request_index.get(&request_id),
        ) {
            (Some(&d), Some(&r)) => self.donation_factors[d]
                .iter()
                .zip(&self.request_factors[r])
                .map(|(a, b)| a * b)
                .sum(),
            _ => 0.0,
        }
    }

    /// All known requests scored against a donation, descending. Unknown
    /// donations produce an empty list.
    pub fn scores_for_donation(&self, donation_id: i64) -> Vec<(i64, f64)> {
        if !self.donation_index.contains_key(&donation_id) {
            return Vec::new();
        }
        let mut scored: Vec<(i64, f64)> = self
            .request_ids
            .iter()
            .map(|&request_id| (request_id, self.predict(donation_id, request_id)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// True when the model was trained on no interactions.
    pub fn is_empty(&self) -> bool {
        self.donation_factors.is_empty()
    }
}

/// Shared handle holding the latest complete snapshot. Retraining builds a
/// new model off to the side and swaps it in one step.
pub struct RecommenderHandle {
    current: RwLock<Arc<RecommenderModel>>,
}

impl RecommenderHandle {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RecommenderModel::empty())),
        }
    }

    /// The latest complete snapshot.
    ///
    /// # Panics
    /// Panics only if a writer panicked while holding the lock.
    pub fn latest(&self) -> Arc<RecommenderModel> {
        Arc::clone(&self.current.read().expect("recommender lock poisoned"))
    }

    /// Publishes a freshly trained snapshot.
    pub fn publish(&self, model: RecommenderModel) {
        *self.current.write().expect("recommender lock poisoned") = Arc::new(model);
    }
}

impl Default for RecommenderHandle {
    fn default() -> Self {
        Self::new()
    }
}
