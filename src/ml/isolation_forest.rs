//! Isolation forest - unsupervised outlier scoring over a numeric feature
//! matrix.
//!
//! An ensemble of random partition trees. Points that isolate in few splits
//! are outliers; the per-point score is `2^(-E[path] / c(n))` where `c(n)`
//! is the average unsuccessful-search path length of a binary search tree
//! over the subsample. Scores fall in (0, 1) and HIGHER means MORE
//! anomalous. Callers compare against a threshold; this module never decides
//! what counts as an anomaly.

use rand::{Rng, rngs::StdRng};

enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// Trained ensemble. Immutable after [`IsolationForest::fit`].
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fits `tree_count` trees, each on a random subsample of at most
    /// `max_samples` rows. An empty matrix yields a forest that scores
    /// everything 0.5 (no evidence either way).
    pub fn fit(data: &[Vec<f64>], tree_count: usize, max_samples: usize, rng: &mut StdRng) -> Self {
        let sample_size = max_samples.min(data.len()).max(1);
        // Height limit from the original isolation-forest formulation
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let mut trees = Vec::with_capacity(tree_count);
        if !data.is_empty() {
            for _ in 0..tree_count {
                let mut sample: Vec<usize> = (0..data.len()).collect();
                // Partial Fisher-Yates: the first `sample_size` slots become
                // the subsample
                for i in 0..sample_size {
                    let j = rng.gen_range(i..sample.len());
                    sample.swap(i, j);
                }
                sample.truncate(sample_size);
                trees.push(build_tree(data, &sample, 0, max_depth, rng));
            }
        }

        Self { trees, sample_size }
    }

    /// Anomaly score for a single point, in (0, 1); higher = more anomalous.
    pub fn score(&self, point: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, point, 0.0))
            .sum();
        let mean_path = total / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    /// Scores every row of a matrix.
    pub fn score_all(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|row| self.score(row)).collect()
    }
}

fn build_tree(
    data: &[Vec<f64>],
    sample: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    // Features with any spread in this sample; constant features cannot split
    let dims = data[sample[0]].len();
    let splittable: Vec<usize> = (0..dims)
        .filter(|&f| {
            let (min, max) = feature_range(data, sample, f);
            max > min
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let feature = splittable[rng.gen_range(0..splittable.len())];
    let (min, max) = feature_range(data, sample, feature);
    let threshold = min + rng.r#gen::<f64>() * (max - min);

    let (left, right): (Vec<usize>, Vec<usize>) = sample
        .iter()
        .copied()
        .partition(|&idx| data[idx][feature] < threshold);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, &left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, max_depth, rng)),
    }
}

fn feature_range(data: &[Vec<f64>], sample: &[usize], feature: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &idx in sample {
        let v = data[idx][feature];
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}

fn path_length(node: &Node, point: &[f64], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if point[*feature] < *threshold {
                path_length(left, point, depth + 1.0)
            } else {
                path_length(right, point, depth + 1.0)
            }
        }
    }
}

/// c(n): expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    // Harmonic number via the asymptotic expansion
    let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rand::SeedableRng;

    fn fit_scored(data: &[Vec<f64>]) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let forest = IsolationForest::fit(data, 100, 256, &mut rng);
        forest.score_all(data)
    }

    #[test]
    fn test_outlier_scores_above_cluster() {
        // Tight cluster near the origin plus one far-away point
        let mut data: Vec<Vec<f64>> = (0..50)
            .map(|i| {
                let x = f64::from(i % 7) * 0.1;
                let y = f64::from(i % 5) * 0.1;
                vec![x, y]
            })
            .collect();
        data.push(vec![10.0, 10.0]);

        let scores = fit_scored(&data);
        let outlier = scores[50];
        let cluster_max = scores[..50].iter().cloned().fold(f64::MIN, f64::max);
        assert!(
            outlier > cluster_max,
            "outlier {outlier} should outscore cluster max {cluster_max}"
        );
        assert!(outlier > 0.5);
    }

    #[test]
    fn test_scores_within_unit_interval() {
        let data: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i), f64::from(i * 2)]).collect();
        for score in fit_scored(&data) {
            assert!(score > 0.0 && score < 1.0);
        }
    }

    #[test]
    fn test_constant_data_does_not_panic() {
        let data = vec![vec![1.0, 1.0]; 10];
        let scores = fit_scored(&data);
        assert_eq!(scores.len(), 10);
        // Identical points are equally (un)surprising
        for window in scores.windows(2) {
            assert!((window[0] - window[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_matrix() {
        let mut rng = StdRng::seed_from_u64(7);
        let forest = IsolationForest::fit(&[], 100, 256, &mut rng);
        assert_eq!(forest.score(&[1.0, 2.0]), 0.5);
    }

    #[test]
    fn test_seeded_scoring_is_reproducible() {
        let data: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i % 4), 1.0]).collect();
        let first = fit_scored(&data);
        let second = fit_scored(&data);
        assert_eq!(first, second);
    }
}
