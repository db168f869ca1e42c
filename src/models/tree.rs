//! Дерево регрессии (CART, критерий MSE)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{check_training_data, Regressor};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    max_depth: usize,
    min_samples_split: usize,
    n_features: usize,
    root: Option<TreeNode>,
}

impl RegressionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            n_features: 0,
            root: None,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Фактическая глубина обученного дерева
    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map(walk).unwrap_or(0)
    }

    fn build_tree(&self, X: &Array2<f64>, y: &Array1<f64>, depth: usize, indices: Vec<usize>) -> TreeNode {
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return TreeNode::Leaf { value: mean };
        }

        let Some((feature, threshold)) = best_split(X, y, &indices) else {
            return TreeNode::Leaf { value: mean };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| X[[i, feature]] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build_tree(X, y, depth + 1, left_indices)),
            right: Box::new(self.build_tree(X, y, depth + 1, right_indices)),
        }
    }

    fn predict_single(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    Self::predict_single(left, sample)
                } else {
                    Self::predict_single(right, sample)
                }
            }
        }
    }
}

impl Regressor for RegressionTree {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        self.n_features = X.ncols();
        self.root = Some(self.build_tree(X, y, 0, (0..X.nrows()).collect()));
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or(PipelineError::NotFitted("RegressionTree"))?;
        // Узлы индексируют признаки по позиции
        if X.ncols() != self.n_features {
            return Err(PipelineError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                found: format!("{} features", X.ncols()),
            });
        }
        Ok(X.rows()
            .into_iter()
            .map(|row| Self::predict_single(root, row))
            .collect())
    }
}

/// Лучшее разбиение по сумме квадратов отклонений.
///
/// Для каждого признака индексы сортируются по значению, суммы накапливаются
/// одним проходом; порог берётся посередине между соседними различными
/// значениями. При равенстве выигрывает первый признак и меньший порог.
fn best_split(X: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64)> {
    let n = indices.len() as f64;
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n;

    let mut best: Option<(usize, f64)> = None;
    let mut best_sse = parent_sse - 1e-12;

    let mut order = indices.to_vec();
    for feature in 0..X.ncols() {
        order.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..order.len() - 1 {
            let yi = y[order[k]];
            left_sum += yi;
            left_sq += yi * yi;

            let current = X[[order[k], feature]];
            let next = X[[order[k + 1], feature]];
            if next - current <= 1e-12 {
                continue;
            }

            let n_left = (k + 1) as f64;
            let n_right = n - n_left;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if sse < best_sse {
                best_sse = sse;
                best = Some((feature, (current + next) / 2.0));
            }
        }
    }

    best
}
