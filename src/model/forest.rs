//! Random forest classifier built from CART trees with Gini impurity.
//!
//! Each tree is grown on a bootstrap sample expressed as per-sample weights
//! (draw count times class weight), considering a random subset of features
//! at every split. Trees are fitted in parallel with rayon; every tree gets
//! its own seed derived from the forest seed, so a fit is reproducible
//! regardless of thread scheduling.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::encoding::FeatureMatrix;
use super::ModelError;

/// Weighted impurity at or below this is treated as pure.
const PURITY_EPSILON: f64 = 1e-12;

/// How training samples are weighted by class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample counts once.
    Uniform,
    /// `n_samples / (n_classes * class_count)`, so each class carries equal total weight.
    Balanced,
}

impl ClassWeight {
    /// Per-class weights for encoded labels `y` over `n_classes` classes.
    pub fn weights(self, y: &[usize], n_classes: usize) -> Vec<f64> {
        match self {
            ClassWeight::Uniform => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in y {
                    counts[label] += 1;
                }
                let k = n_classes as f64;
                counts
                    .iter()
                    .map(|&count| {
                        if count == 0 {
                            0.0
                        } else {
                            y.len() as f64 / (k * count as f64)
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Number of features examined at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(n) => n,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Forest hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART classification tree stored as a node arena.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    x: &'a FeatureMatrix,
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Whether sorted neighbours `lo <= hi` can be separated by a threshold.
/// NaN sorts last and is routed right of any finite threshold.
fn distinct(lo: f64, hi: f64) -> bool {
    lo < hi || (hi.is_nan() && !lo.is_nan())
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, samples: &[usize]) -> (Vec<f64>, f64) {
        let mut counts = vec![0.0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += self.weights[i];
        }
        let total = counts.iter().sum();
        (counts, total)
    }

    fn leaf(&mut self, counts: Vec<f64>, total: f64) -> usize {
        let distribution = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            counts
        };
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let (counts, total) = self.class_counts(&samples);
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || samples.len() < self.min_samples_split
            || gini(&counts, total) <= PURITY_EPSILON
        {
            return self.leaf(counts, total);
        }

        let Some(split) = self.best_split(&samples, rng) else {
            return self.leaf(counts, total);
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x.value(i, split.feature) <= split.threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            return self.leaf(counts, total);
        }

        // Reserve this node's slot before growing the children.
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// Search a random feature subset, skipping features constant in this node
    /// until `max_features` informative ones have been examined.
    fn best_split(&self, samples: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.x.n_features()).collect();
        features.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;
        for feature in features {
            if visited >= self.max_features {
                break;
            }
            let mut order: Vec<usize> = samples.to_vec();
            order.sort_by(|&a, &b| self.x.value(a, feature).total_cmp(&self.x.value(b, feature)));

            let first = self.x.value(order[0], feature);
            let last = self.x.value(order[order.len() - 1], feature);
            if !distinct(first, last) {
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.scan_feature(feature, &order) {
                if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweep the sorted samples of one feature, scoring every boundary
    /// between distinct values by weighted child impurity.
    fn scan_feature(&self, feature: usize, order: &[usize]) -> Option<BestSplit> {
        let (right_init, total) = self.class_counts(order);
        let mut left = vec![0.0; self.n_classes];
        let mut right = right_init;
        let mut left_total = 0.0;
        let mut best: Option<BestSplit> = None;

        for pos in 0..order.len() - 1 {
            let i = order[pos];
            let w = self.weights[i];
            left[self.y[i]] += w;
            right[self.y[i]] -= w;
            left_total += w;

            let lo = self.x.value(i, feature);
            let hi = self.x.value(order[pos + 1], feature);
            if !distinct(lo, hi) {
                continue;
            }

            let right_total = total - left_total;
            let impurity = (left_total * gini(&left, left_total)
                + right_total * gini(&right, right_total))
                / total;

            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                let threshold = if hi.is_nan() {
                    lo
                } else {
                    let mid = lo + (hi - lo) / 2.0;
                    if mid >= hi {
                        lo
                    } else {
                        mid
                    }
                };
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        x: &FeatureMatrix,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        config: &ForestConfig,
        rng: &mut StdRng,
    ) -> Self {
        let samples: Vec<usize> = (0..x.n_rows()).filter(|&i| weights[i] > 0.0).collect();
        let mut builder = TreeBuilder {
            x,
            y,
            weights,
            n_classes,
            max_features: config.max_features.resolve(x.n_features()),
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split.max(2),
            nodes: Vec::new(),
        };
        builder.grow(samples, 0, rng);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Class distribution of the leaf `row` falls into.
    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Ensemble of bootstrapped decision trees, soft-voting on class probabilities.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Fit on encoded labels `y` in `0..n_classes`.
    pub fn fit(
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        class_weight: ClassWeight,
        config: &ForestConfig,
    ) -> Result<Self, ModelError> {
        if x.n_rows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.n_rows() != y.len() {
            return Err(ModelError::ShapeMismatch {
                rows: x.n_rows(),
                labels: y.len(),
            });
        }

        let class_weights = class_weight.weights(y, n_classes);
        let n_trees = config.n_trees.max(1);

        let trees = (0..n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let mut draws = vec![0.0; x.n_rows()];
                if config.bootstrap {
                    for _ in 0..x.n_rows() {
                        draws[rng.random_range(0..x.n_rows())] += 1.0;
                    }
                } else {
                    draws.fill(1.0);
                }
                let weights: Vec<f64> = draws
                    .iter()
                    .zip(y)
                    .map(|(d, &label)| d * class_weights[label])
                    .collect();
                DecisionTree::fit(x, y, &weights, n_classes, config, &mut rng)
            })
            .collect::<Vec<DecisionTree>>();
        debug!(
            "Fitted {} trees, {} nodes in total",
            trees.len(),
            trees.iter().map(DecisionTree::node_count).sum::<usize>()
        );

        Ok(Self { trees, n_classes })
    }

    /// Tree-averaged class probabilities for each row.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Vec<Vec<f64>> {
        (0..x.n_rows())
            .map(|i| {
                let row = x.row(i);
                let mut acc = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    for (a, p) in acc.iter_mut().zip(tree.predict_proba(row)) {
                        *a += p;
                    }
                }
                let n = self.trees.len() as f64;
                acc.iter_mut().for_each(|a| *a /= n);
                acc
            })
            .collect()
    }

    /// Most probable class per row; ties go to the lowest class index.
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<usize> {
        self.predict_proba(x)
            .iter()
            .map(|probs| {
                probs
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best_i, best_p), (i, &p)| {
                        if p > best_p {
                            (i, p)
                        } else {
                            (best_i, best_p)
                        }
                    })
                    .0
            })
            .collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
