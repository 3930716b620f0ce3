//! Random forest regression: bootstrap-aggregated CART trees, split on variance reduction and
//! grown until leaves are pure.

use bincode::{Decode, Encode};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::dataset::Features;

/// Nodes with fewer samples than this become leaves.
const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Clone, Debug, Encode, Decode)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
enum Node {
    Leaf {
        value: f64,
    },
    /// Samples with `x[feature] <= threshold` go left.
    Split {
        feature: u8,
        threshold: f64,
        left: u32,
        right: u32,
    },
}

/// A regression tree, stored as a flat node list. The root is at index 0.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the samples at `idx`, which may repeat (bootstrap).
    fn fit(x: &[Features], y: &[f64], idx: &mut [usize]) -> Self {
        let mut result = Self { nodes: Vec::new() };
        if !idx.is_empty() {
            result.build(x, y, idx);
        }
        result
    }

    fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    fn build(&mut self, x: &[Features], y: &[f64], idx: &mut [usize]) -> u32 {
        let value = idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64;

        let y0 = y[idx[0]];
        let pure = idx.iter().all(|&i| y[i] == y0);
        if pure || idx.len() < MIN_SAMPLES_SPLIT {
            return self.push(Node::Leaf { value });
        }

        let Some((feature, threshold)) = best_split(x, y, idx) else {
            // Every feature is constant over these samples.
            return self.push(Node::Leaf { value });
        };

        let mut left_i = Vec::with_capacity(idx.len());
        let mut right_i = Vec::with_capacity(idx.len());
        for &i in idx.iter() {
            if x[i][feature] <= threshold {
                left_i.push(i);
            } else {
                right_i.push(i);
            }
        }
        let mid = left_i.len();
        idx[..mid].copy_from_slice(&left_i);
        idx[mid..].copy_from_slice(&right_i);

        // Reserve this node's slot; children are appended after it.
        let id = self.push(Node::Leaf { value });
        let (l, r) = idx.split_at_mut(mid);
        let left = self.build(x, y, l);
        let right = self.build(x, y, r);

        self.nodes[id as usize] = Node::Split {
            feature: feature as u8,
            threshold,
            left,
            right,
        };
        id
    }

    pub fn predict(&self, x: &Features) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes.get(i) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    i = if x[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Find the split maximizing variance reduction, over all features. Returns `None` if no
/// feature takes more than one value over the samples.
fn best_split(x: &[Features], y: &[f64], idx: &[usize]) -> Option<(usize, f64)> {
    let n = idx.len();
    let total: f64 = idx.iter().map(|&i| y[i]).sum();

    // Minimizing the children's summed squared error is equivalent to maximizing
    // sum_l² / n_l + sum_r² / n_r.
    let mut best: Option<(usize, f64)> = None;
    let mut best_score = f64::NEG_INFINITY;

    let mut order = idx.to_vec();

    for feature in 0..x[idx[0]].len() {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.;
        for k in 1..n {
            left_sum += y[order[k - 1]];

            let lo = x[order[k - 1]][feature];
            let hi = x[order[k]][feature];
            if lo == hi {
                continue;
            }

            let n_l = k as f64;
            let n_r = (n - k) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_l + right_sum * right_sum / n_r;

            if score > best_score {
                best_score = score;
                let mid = lo + (hi - lo) / 2.;
                // Guard against the midpoint rounding up to `hi`.
                let threshold = if mid < hi { mid } else { lo };
                best = Some((feature, threshold));
            }
        }
    }

    best
}

#[derive(Clone, Debug, Encode, Decode)]
pub struct RandomForest {
    pub params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Each tree trains on its own bootstrap sample, from a seed drawn up front from the forest
    /// seed. Trees fit in parallel; results don't depend on thread count.
    pub fn fit(x: &[Features], y: &[f64], params: ForestParams) -> Self {
        let n = x.len().min(y.len());
        let mut rng = StdRng::seed_from_u64(params.seed);
        let tree_seeds: Vec<u64> = (0..params.n_estimators).map(|_| rng.random()).collect();

        let trees = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let mut idx: Vec<usize> = (0..n).map(|_| tree_rng.random_range(0..n)).collect();
                RegressionTree::fit(x, y, &mut idx)
            })
            .collect();

        Self { params, trees }
    }

    /// Mean of the trees' predictions.
    pub fn predict(&self, x: &Features) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: usize) -> (Vec<Features>, Vec<f64>) {
        let x: Vec<Features> = (0..n).map(|i| [i as f64, 1., 0., 0.]).collect();
        let y = x.iter().map(|f| 2. * f[0]).collect();
        (x, y)
    }

    #[test]
    fn single_tree_fits_training_data() {
        let (x, y) = linear(20);
        let mut idx: Vec<usize> = (0..20).collect();
        let tree = RegressionTree::fit(&x, &y, &mut idx);

        for (xi, yi) in x.iter().zip(&y) {
            assert_eq!(tree.predict(xi), *yi);
        }
    }

    #[test]
    fn constant_feature_gives_leaf() {
        let x = vec![[1., 1., 1., 1.]; 5];
        let y = vec![1., 2., 3., 4., 5.];
        let mut idx: Vec<usize> = (0..5).collect();
        let tree = RegressionTree::fit(&x, &y, &mut idx);

        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict(&x[0]), 3.);
    }

    #[test]
    fn forest_approximates_linear() {
        let (x, y) = linear(50);
        let rf = RandomForest::fit(&x, &y, ForestParams::default());

        assert_eq!(rf.trees().len(), 100);
        for probe in [5., 10.5, 30., 44.] {
            let pred = rf.predict(&[probe, 1., 0., 0.]);
            assert!((pred - 2. * probe).abs() < 4., "{probe}: {pred}");
        }
    }

    #[test]
    fn forest_is_deterministic() {
        let (x, y) = linear(30);
        let a = RandomForest::fit(&x, &y, ForestParams::default());
        let b = RandomForest::fit(&x, &y, ForestParams::default());
        assert_eq!(a.trees, b.trees);

        let c = RandomForest::fit(
            &x,
            &y,
            ForestParams {
                seed: 7,
                ..Default::default()
            },
        );
        assert_ne!(a.trees, c.trees);
    }
}
