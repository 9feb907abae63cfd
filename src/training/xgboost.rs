//! XGBoost-style gradient boosting regressor with missing-value routing
//!
//! - Second-order split gain: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)]
//! - Regularized leaf weights: w* = -G / (H + λ), L1 soft-thresholded by α
//! - Every split learns a default direction; NaN inputs follow it at predict time
//! - Early stopping on the RMSE of the last evaluation set

use super::models::{EvalSet, Regressor};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Initial prediction; `None` uses the mean target
    pub base_score: Option<f64>,
    /// Stop after this many rounds without eval improvement
    pub early_stopping_rounds: Option<usize>,
    /// Log eval RMSE every N rounds (0 disables)
    pub log_every: usize,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 0.01,
            max_depth: 3,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            base_score: Some(0.5),
            early_stopping_rounds: Some(50),
            log_every: 100,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::Config("n_estimators must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ForecastError::Config("learning_rate must be positive".to_string()));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0)
            || !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0)
        {
            return Err(ForecastError::Config("sampling ratios must be in (0, 1]".to_string()));
        }
        Ok(())
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        /// Branch taken when the feature value is NaN
        default_left: bool,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, default_left, left, right } => {
                let value = sample[*feature];
                let go_left = if value.is_nan() { *default_left } else { value <= *threshold };
                if go_left {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Best split candidate for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal));

    match best_split {
        Some(split) if split.gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices.iter().partition(|&&i| {
                let value = x[[i, split.feature]];
                if value.is_nan() {
                    split.default_left
                } else {
                    value <= split.threshold
                }
            });

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                default_left: split.default_left,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Find the best split for one feature, trying both directions for missing values
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<SplitCandidate> {
    let (mut present, missing): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| !x[[i, feature]].is_nan());

    if present.is_empty() {
        return None;
    }

    present.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(Ordering::Equal)
    });

    let g_missing: f64 = missing.iter().map(|&i| grad[i]).sum();
    let h_missing: f64 = missing.iter().map(|&i| hess[i]).sum();
    let g_present: f64 = present.iter().map(|&i| grad[i]).sum();
    let h_present: f64 = present.iter().map(|&i| hess[i]).sum();
    let g_total = g_present + g_missing;
    let h_total = h_present + h_missing;

    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for (pos, &idx) in present.iter().enumerate() {
        g_left += grad[idx];
        h_left += hess[idx];

        let value = x[[idx, feature]];
        let next_value = present.get(pos + 1).map(|&next| x[[next, feature]]);

        // Skip if next sample has the same feature value
        if let Some(next) = next_value {
            if (value - next).abs() < 1e-12 {
                continue;
            }
        } else if missing.is_empty() {
            // Nothing would go right of the last present value
            break;
        }

        let threshold = match next_value {
            Some(next) => (value + next) / 2.0,
            None => value,
        };

        for default_left in [true, false] {
            let (gl, hl) = if default_left {
                (g_left + g_missing, h_left + h_missing)
            } else {
                (g_left, h_left)
            };
            let gr = g_total - gl;
            let hr = h_total - hl;

            if hl < config.min_child_weight || hr < config.min_child_weight {
                continue;
            }

            let gain = 0.5 * ((gl * gl) / (hl + lambda) + (gr * gr) / (hr + lambda) - parent_score);

            if best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate { feature, threshold, default_left, gain });
            }
        }
    }

    best
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    best_iteration: Option<usize>,
    eval_history: Vec<Vec<f64>>,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            best_iteration: None,
            eval_history: Vec::new(),
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Round with the lowest eval RMSE, when early stopping ran
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    /// Per eval set, the RMSE after each boosting round
    pub fn eval_history(&self) -> &[Vec<f64>] {
        &self.eval_history
    }

    fn check_input(&self, x: &Array2<f64>, y: &Array1<f64>, what: &str) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} {} targets", x.nrows(), what),
                actual: format!("{} targets", y.len()),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Training(format!("{} targets contain non-finite values", what)));
        }
        Ok(())
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, eval_sets: &[EvalSet<'_>]) -> Result<()> {
        self.config.validate()?;
        self.check_input(x, y, "training")?;
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ForecastError::Training("no samples to fit".to_string()));
        }
        for eval in eval_sets {
            self.check_input(eval.x, eval.y, "eval")?;
            if eval.x.ncols() != x.ncols() {
                return Err(ForecastError::Shape {
                    expected: format!("{} eval columns", x.ncols()),
                    actual: format!("{} columns", eval.x.ncols()),
                });
            }
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        self.base_score = self.config.base_score.unwrap_or_else(|| y.mean().unwrap_or(0.0));
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let mut eval_preds: Vec<Array1<f64>> = eval_sets
            .iter()
            .map(|e| Array1::from_elem(e.x.nrows(), self.base_score))
            .collect();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.best_iteration = None;
        self.eval_history = vec![Vec::new(); eval_sets.len()];

        let mut best_score = f64::INFINITY;
        let mut rounds_without_improvement = 0usize;
        let lr = self.config.learning_rate;

        for round in 0..self.config.n_estimators {
            // Squared error: grad = pred - y, hess = 1.0
            let grad: Array1<f64> = &preds - y;
            let hess = Array1::from_elem(n_samples, 1.0);

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for (i, row) in x.rows().into_iter().enumerate() {
                preds[i] += lr * tree.predict(row);
            }

            for (k, eval) in eval_sets.iter().enumerate() {
                let current = &mut eval_preds[k];
                if eval.x.nrows() == 0 {
                    continue;
                }
                for (i, row) in eval.x.rows().into_iter().enumerate() {
                    current[i] += lr * tree.predict(row);
                }
                let score = rmse_of(eval.y, current);
                self.eval_history[k].push(score);
            }

            self.trees.push(tree);

            if self.config.log_every > 0 && round % self.config.log_every == 0 {
                let scores: Vec<f64> = self.eval_history.iter().filter_map(|h| h.last().copied()).collect();
                debug!(round, eval_rmse = ?scores, "Boosting progress");
            }

            let Some(patience) = self.config.early_stopping_rounds else { continue };
            let Some(score) = self.eval_history.last().and_then(|h| h.last().copied()) else { continue };

            if score < best_score {
                best_score = score;
                self.best_iteration = Some(round);
                rounds_without_improvement = 0;
            } else {
                rounds_without_improvement += 1;
                if rounds_without_improvement >= patience {
                    debug!(round, best_iteration = ?self.best_iteration, best_score, "Early stopping");
                    break;
                }
            }
        }

        if let Some(best) = self.best_iteration {
            self.trees.truncate(best + 1);
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::ModelNotTrained);
        }
        if x.ncols() != self.n_features {
            return Err(ForecastError::Shape {
                expected: format!("{} feature columns", self.n_features),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let lr = self.config.learning_rate;
        let preds = x
            .rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.base_score, |acc, tree| acc + lr * tree.predict(row))
            })
            .collect();
        Ok(preds)
    }

    fn name(&self) -> &'static str {
        "xgboost"
    }

    /// Split-count importances across all trees
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

fn count_splits(node: &XGBNode, counts: &mut [f64]) {
    if let XGBNode::Split { feature, left, right, .. } = node {
        if *feature < counts.len() {
            counts[*feature] += 1.0;
        }
        count_splits(left, counts);
        count_splits(right, counts);
    }
}

fn rmse_of(y: &Array1<f64>, preds: &Array1<f64>) -> f64 {
    let n = y.len().max(1) as f64;
    ((y - preds).mapv(|e| e * e).sum() / n).sqrt()
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k.max(1));
    indices.sort();
    indices
}
