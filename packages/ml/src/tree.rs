//! Weighted CART decision trees.
//!
//! One tree type serves every tree-based model: Gini splits for the forest
//! and `AdaBoost` stumps, squared-error splits for gradient-boosting
//! regressors. Nodes live in a flat arena and keep their training cover
//! (total sample weight) so path-dependent SHAP expectations can be computed
//! without the training data.

use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;
use rand::seq::SliceRandom as _;
use serde::{Deserialize, Serialize};

/// Smallest impurity decrease that still counts as a split.
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// Split quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity over `0/1` targets.
    Gini,
    /// Mean squared error over real targets.
    Mse,
}

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    /// Minimum number of distinct samples a node needs to be split.
    pub min_samples_split: usize,
    /// Features drawn (without replacement) per split. `None` uses all.
    pub max_features: Option<usize>,
}

/// A tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
}

impl Node {
    /// Total training weight that reached this node.
    #[must_use]
    pub const fn cover(&self) -> f64 {
        match self {
            Self::Leaf { cover, .. } | Self::Split { cover, .. } => *cover,
        }
    }
}

/// A fitted decision tree. The root is node `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Weighted impurity decrease accumulated per feature.
    impurity_decrease: Vec<f64>,
}

/// Weighted first and second moments of a target subset.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn add(&mut self, w: f64, y: f64) {
        self.weight += w;
        self.sum += w * y;
        self.sum_sq += w * y * y;
    }

    fn minus(self, other: Self) -> Self {
        Self {
            weight: self.weight - other.weight,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    fn mean(self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    /// Per-unit-weight impurity.
    fn impurity(self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        match criterion {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::Mse => (self.sum_sq / self.weight - mean * mean).max(0.0),
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Sum of weighted child impurities.
    children_impurity: f64,
}

struct Builder<'a, R: Rng> {
    x: ArrayView2<'a, f64>,
    y: &'a [f64],
    weights: &'a [f64],
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
    impurity_decrease: Vec<f64>,
}

impl<R: Rng> Builder<'_, R> {
    fn moments(&self, indices: &[usize]) -> Moments {
        let mut m = Moments::default();
        for &i in indices {
            m.add(self.weights[i], self.y[i]);
        }
        m
    }

    /// Feature visiting order for one split search.
    fn feature_order(&mut self) -> Vec<usize> {
        let n = self.x.ncols();
        let mut order: Vec<usize> = (0..n).collect();
        if self.params.max_features.is_some_and(|k| k < n) {
            order.shuffle(&mut *self.rng);
        }
        order
    }

    /// Searches features in random order. At least `max_features` features
    /// are inspected, and the search keeps going past that budget until a
    /// split that actually lowers impurity is found.
    fn find_split(
        &mut self,
        indices: &[usize],
        total: Moments,
        node_impurity: f64,
    ) -> Option<BestSplit> {
        let criterion = self.params.criterion;
        let budget = self.params.max_features.unwrap_or(usize::MAX).max(1);
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for (visited, feature) in self.feature_order().into_iter().enumerate() {
            if visited >= budget
                && best
                    .as_ref()
                    .is_some_and(|b| node_impurity - b.children_impurity > MIN_IMPURITY_DECREASE)
            {
                break;
            }

            let column = self.x.column(feature);
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left = Moments::default();
            for pair in sorted.windows(2) {
                let (i, next) = (pair[0], pair[1]);
                left.add(self.weights[i], self.y[i]);
                if column[i] >= column[next] {
                    continue;
                }
                let right = total.minus(left);
                if left.weight <= 0.0 || right.weight <= 0.0 {
                    continue;
                }
                let children_impurity = left.weight * left.impurity(criterion)
                    + right.weight * right.impurity(criterion);
                if best
                    .as_ref()
                    .is_none_or(|b| children_impurity < b.children_impurity)
                {
                    best = Some(BestSplit {
                        feature,
                        threshold: f64::midpoint(column[i], column[next]),
                        children_impurity,
                    });
                }
            }
        }

        best
    }

    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let total = self.moments(indices);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: total.mean(),
            cover: total.weight,
        });

        let node_impurity = total.weight * total.impurity(self.params.criterion);
        // Distinct rows, not bootstrap draws: a row drawn twice counts once.
        let can_split = indices.len() >= self.params.min_samples_split.max(2)
            && self.params.max_depth.is_none_or(|max| depth < max)
            && node_impurity > MIN_IMPURITY_DECREASE;
        if !can_split {
            return id;
        }

        let Some(split) = self.find_split(indices, total, node_impurity) else {
            return id;
        };
        let decrease = node_impurity - split.children_impurity;
        if decrease <= MIN_IMPURITY_DECREASE {
            return id;
        }

        let column = self.x.column(split.feature);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| column[i] <= split.threshold);

        self.impurity_decrease[split.feature] += decrease;
        let left = self.build(&left_rows, depth + 1);
        let right = self.build(&right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            cover: total.weight,
        };
        id
    }
}

impl DecisionTree {
    /// Grows a tree on the rows of `x` with positive weight.
    ///
    /// Zero-weight rows (e.g. left out of a bootstrap sample) are ignored.
    pub fn fit<R: Rng>(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        weights: &[f64],
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let indices: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        let mut builder = Builder {
            x: x.reborrow(),
            y,
            weights,
            params,
            rng,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; x.ncols()],
        };
        builder.build(&indices, 0);
        Self {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Index of the leaf a row falls into.
    #[must_use]
    pub fn leaf_index(&self, row: ArrayView1<'_, f64>) -> usize {
        let mut id = 0;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = self.nodes[id]
        {
            id = if row[feature] <= threshold { left } else { right };
        }
        id
    }

    /// Leaf value for a row: the positive fraction for Gini trees, the mean
    /// target for regression trees.
    #[must_use]
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self.nodes[self.leaf_index(row)] {
            Node::Leaf { value, .. } => value,
            Node::Split { .. } => unreachable!("leaf_index always stops at a leaf"),
        }
    }

    /// Overwrites a leaf value. Non-leaf indices are ignored.
    pub fn set_leaf_value(&mut self, leaf: usize, new_value: f64) {
        if let Some(Node::Leaf { value, .. }) = self.nodes.get_mut(leaf) {
            *value = new_value;
        }
    }

    /// Impurity-decrease importances normalised to sum to one (all zeros for
    /// a single-leaf tree).
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|d| d / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }

    /// Cover-weighted mean output over the training distribution.
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        self.mean_from(0)
    }

    fn mean_from(&self, id: usize) -> f64 {
        match self.nodes[id] {
            Node::Leaf { value, .. } => value,
            Node::Split {
                left, right, cover, ..
            } => {
                if cover > 0.0 {
                    (self.nodes[left].cover() * self.mean_from(left)
                        + self.nodes[right].cover() * self.mean_from(right))
                        / cover
                } else {
                    0.0
                }
            }
        }
    }

    /// Expected output when only the features in `mask` are known, following
    /// `row` on known features and averaging children by cover otherwise.
    #[must_use]
    pub fn conditional_expectation(&self, row: ArrayView1<'_, f64>, mask: u32) -> f64 {
        self.expectation_from(0, row, mask)
    }

    fn expectation_from(&self, id: usize, row: ArrayView1<'_, f64>, mask: u32) -> f64 {
        match self.nodes[id] {
            Node::Leaf { value, .. } => value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                cover,
            } => {
                if mask & (1 << feature) != 0 {
                    let next = if row[feature] <= threshold { left } else { right };
                    self.expectation_from(next, row, mask)
                } else if cover > 0.0 {
                    let left_cover = self.nodes[left].cover();
                    let right_cover = self.nodes[right].cover();
                    (left_cover * self.expectation_from(left, row, mask)
                        + right_cover * self.expectation_from(right, row, mask))
                        / cover
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;

    use super::*;

    fn gini(max_depth: Option<usize>) -> TreeParams {
        TreeParams {
            criterion: Criterion::Gini,
            max_depth,
            min_samples_split: 2,
            max_features: None,
        }
    }

    #[test]
    fn separates_threshold_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [10.0, 0.0], [11.0, 0.0]];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(x.view(), &y, &[1.0; 5], gini(None), &mut rng);

        assert_eq!(tree.nodes().len(), 3);
        assert!((tree.predict_row(array![2.5, 0.0].view())).abs() < 1e-12);
        assert!((tree.predict_row(array![9.0, 0.0].view()) - 1.0).abs() < 1e-12);
        assert_eq!(tree.feature_importances(), vec![1.0, 0.0]);
    }

    #[test]
    fn depth_limit_yields_stump() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0.0, 1.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(x.view(), &y, &[1.0; 4], gini(Some(1)), &mut rng);
        assert_eq!(tree.nodes().len(), 3);
    }

    #[test]
    fn zero_weight_rows_are_ignored() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = [1.0, 0.0, 0.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(x.view(), &y, &[0.0, 1.0, 2.0], gini(None), &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert!((tree.nodes()[0].cover() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn min_samples_split_counts_distinct_rows() {
        let x = array![[0.0], [1.0]];
        let y = [0.0, 1.0];
        let params = TreeParams {
            min_samples_split: 3,
            ..gini(None)
        };
        let mut rng = StdRng::seed_from_u64(0);
        // Bootstrap weights of 3 each: six draws, but only two rows.
        let tree = DecisionTree::fit(x.view(), &y, &[3.0, 3.0], params, &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert!((tree.nodes()[0].cover() - 6.0).abs() < 1e-12);

        let tree = DecisionTree::fit(x.view(), &y, &[3.0, 3.0], gini(None), &mut rng);
        assert_eq!(tree.nodes().len(), 3);
    }

    #[test]
    fn regression_tree_fits_means() {
        let x = array![[0.0], [0.0], [5.0], [5.0]];
        let y = [1.0, 3.0, 10.0, 12.0];
        let params = TreeParams {
            criterion: Criterion::Mse,
            max_depth: Some(3),
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(x.view(), &y, &[1.0; 4], params, &mut rng);
        assert!((tree.predict_row(array![0.0].view()) - 2.0).abs() < 1e-12);
        assert!((tree.predict_row(array![5.0].view()) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_mask_expectation_is_root_mean() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(x.view(), &y, &[1.0; 4], gini(None), &mut rng);
        let row = array![3.0];
        assert!((tree.conditional_expectation(row.view(), 0) - 0.5).abs() < 1e-12);
        assert!((tree.conditional_expectation(row.view(), 1) - 1.0).abs() < 1e-12);
    }
}
