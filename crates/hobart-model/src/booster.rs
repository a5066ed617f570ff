//! Gradient-boosted regression trees for squared error.
//!
//! Each round fits one tree to the gradients `pred - y` (hessian 1) with
//! exact greedy splits. For a node with gradient sum `G` and hessian sum `H`
//! the structure score is `T(G)² / (H + λ)` where `T` soft-thresholds by the
//! L1 penalty `α`; a split is kept when the children's scores exceed the
//! parent's. Leaf weights are `-T(G) / (H + λ)` scaled by the learning rate.

use crate::error::{ModelError, Result};
use crate::params::BoosterParams;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Soft threshold of a gradient sum by the L1 penalty.
fn soft_threshold(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

fn structure_score(g: f64, h: f64, params: &BoosterParams) -> f64 {
    let t = soft_threshold(g, params.reg_alpha);
    let denom = h + params.reg_lambda;
    if denom > 0.0 { t * t / denom } else { 0.0 }
}

fn leaf_weight(g: f64, h: f64, params: &BoosterParams) -> f64 {
    let denom = h + params.reg_lambda;
    if denom > 0.0 {
        -soft_threshold(g, params.reg_alpha) / denom
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One fitted tree; node 0 is the root and children follow their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Leaf value reached by `row`. Rows go left when `x < threshold`.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => i = if row[feature] < threshold { left } else { right },
            }
        }
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf; a single leaf has depth 0.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = *node {
                depths[left] = depths[i] + 1;
                depths[right] = depths[i] + 1;
            }
        }
        depths.into_iter().max().unwrap_or(0)
    }

    /// Children must point forward and every split feature must exist.
    fn check(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ModelError::CorruptModel("empty tree".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                let in_range = |c: usize| c > i && c < self.nodes.len();
                if feature >= n_features || !in_range(left) || !in_range(right) {
                    return Err(ModelError::CorruptModel(format!("invalid split at node {i}")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    left_count: usize,
    gain: f64,
}

/// Grows one tree over per-feature sorted sample orders.
struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    grad: &'a [f64],
    params: &'a BoosterParams,
    nodes: Vec<Node>,
    goes_left: Vec<bool>,
}

impl<'a> TreeBuilder<'a> {
    fn new(x: ArrayView2<'a, f64>, grad: &'a [f64], params: &'a BoosterParams) -> Self {
        Self {
            x,
            grad,
            params,
            nodes: Vec::new(),
            goes_left: vec![false; grad.len()],
        }
    }

    fn finish(mut self, orders: Vec<Vec<usize>>) -> RegressionTree {
        self.grow(orders, 0);
        RegressionTree { nodes: self.nodes }
    }

    /// `orders[f]` holds this node's samples sorted by feature `f`.
    fn grow(&mut self, orders: Vec<Vec<usize>>, depth: usize) -> usize {
        let id = self.nodes.len();
        let samples = &orders[0];
        let g: f64 = samples.iter().map(|&i| self.grad[i]).sum();
        let h = samples.len() as f64;
        self.nodes.push(Node::Leaf {
            value: self.params.learning_rate * leaf_weight(g, h, self.params),
        });

        if depth >= self.params.max_depth {
            return id;
        }
        let Some(split) = self.best_split(&orders, g, h) else {
            return id;
        };

        let sorted = &orders[split.feature];
        for &i in &sorted[..split.left_count] {
            self.goes_left[i] = true;
        }
        for &i in &sorted[split.left_count..] {
            self.goes_left[i] = false;
        }
        let (left_orders, right_orders): (Vec<Vec<usize>>, Vec<Vec<usize>>) = orders
            .into_iter()
            .map(|order| order.into_iter().partition(|&i| self.goes_left[i]))
            .unzip();

        let left = self.grow(left_orders, depth + 1);
        let right = self.grow(right_orders, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, orders: &[Vec<usize>], g: f64, h: f64) -> Option<Split> {
        let parent = structure_score(g, h, self.params);
        let mut best: Option<Split> = None;
        for (feature, order) in orders.iter().enumerate() {
            let mut gl = 0.0;
            for pos in 0..order.len().saturating_sub(1) {
                gl += self.grad[order[pos]];
                let a = self.x[[order[pos], feature]];
                let b = self.x[[order[pos + 1], feature]];
                if !(b > a) {
                    continue;
                }
                let hl = (pos + 1) as f64;
                let hr = h - hl;
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = structure_score(gl, hl, self.params)
                    + structure_score(g - gl, hr, self.params)
                    - parent;
                if gain > best.map_or(0.0, |s| s.gain) {
                    let mid = a + (b - a) / 2.0;
                    best = Some(Split {
                        feature,
                        threshold: if mid > a { mid } else { b },
                        left_count: pos + 1,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Additive ensemble of regression trees on top of a constant base score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoosterParams,
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit on `x` (`rows × features`) and targets `y`.
    pub fn fit(params: BoosterParams, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self> {
        params.validate()?;
        if x.nrows() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }
        let base_score = y
            .mean()
            .ok_or_else(|| ModelError::EmptyDataset("training set".to_string()))?;
        if x.ncols() == 0 {
            return Err(ModelError::EmptyDataset("feature matrix has no columns".to_string()));
        }

        let n = y.len();
        let orders: Vec<Vec<usize>> = (0..x.ncols())
            .map(|f| {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));
                order
            })
            .collect();

        let mut pred = Array1::from_elem(n, base_score);
        let mut trees = Vec::with_capacity(params.n_estimators);
        for round in 0..params.n_estimators {
            let grad: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| p - t).collect();
            let tree = TreeBuilder::new(x.view(), &grad, &params).finish(orders.clone());
            for (i, p) in pred.iter_mut().enumerate() {
                *p += tree.predict_row(x.row(i));
            }
            if round % 50 == 0 {
                debug!(round, leaves = tree.n_leaves(), "boosting round");
            }
            trees.push(tree);
        }

        Ok(Self {
            params,
            base_score,
            n_features: x.ncols(),
            trees,
        })
    }

    /// Predict one value per row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>())
            .collect())
    }

    /// Parameters used for fitting.
    pub const fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Constant the trees are added to.
    pub const fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Number of input columns.
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fitted trees in boosting order.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Write as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    /// Read from JSON, rejecting malformed trees.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let model: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        for tree in &model.trees {
            tree.check(model.n_features)?;
        }
        Ok(model)
    }
}
