//! Evaluate the performance of a model on held-out data.

use std::fmt::Display;

use serde::Serialize;

/// Regression metrics over a held-out set. Correlations are NaN when undefined, e.g. for a
/// constant target.
#[derive(Clone, Debug, Serialize)]
pub struct EvalMetrics {
    pub n: usize,
    /// Mean squared error.
    pub mse: f64,
    /// Root-Mean Squared error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Pearson correlation coefficient.
    pub pearson: f64,
    /// Spearman correlation coefficient.
    pub spearman: f64,
}

impl Display for EvalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n: {} MSE: {:.3} RMSE: {:.3} MAE: {:.3} R²: {:.3} Pearson: {:.3} Spearman: {:.3}",
            self.n, self.mse, self.rmse, self.mae, self.r2, self.pearson, self.spearman,
        )
    }
}

impl EvalMetrics {
    pub fn new(targets: &[f64], predicted: &[f64]) -> Self {
        let n = targets.len().min(predicted.len());
        let (targets, predicted) = (&targets[..n], &predicted[..n]);

        if n == 0 {
            return Self {
                n,
                mse: f64::NAN,
                rmse: f64::NAN,
                mae: f64::NAN,
                r2: f64::NAN,
                pearson: f64::NAN,
                spearman: f64::NAN,
            };
        }

        let mut se_sum = 0.;
        let mut ae_sum = 0.;
        for (y, yhat) in targets.iter().zip(predicted) {
            let err = yhat - y;
            se_sum += err * err;
            ae_sum += err.abs();
        }

        let mse = se_sum / n as f64;

        Self {
            n,
            mse,
            rmse: mse.sqrt(),
            mae: ae_sum / n as f64,
            r2: r2_score(targets, predicted),
            pearson: pearson_corr(predicted, targets),
            spearman: spearman_corr(predicted, targets),
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// With a constant target, a perfect fit scores 1 and anything else 0. Fewer than two samples
/// score NaN.
pub fn r2_score(targets: &[f64], predicted: &[f64]) -> f64 {
    if targets.len() < 2 {
        return f64::NAN;
    }
    let y_mean = mean(targets);

    let mut ss_res = 0.;
    let mut ss_tot = 0.;
    for (y, yhat) in targets.iter().zip(predicted) {
        let r = y - yhat;
        ss_res += r * r;

        let d = y - y_mean;
        ss_tot += d * d;
    }

    if !ss_tot.is_finite() {
        f64::NAN
    } else if ss_tot == 0. {
        if ss_res == 0. { 1. } else { 0. }
    } else {
        1. - ss_res / ss_tot
    }
}

fn pearson_corr(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }

    let mx = mean(xs);
    let my = mean(ys);

    let mut sxx = 0.;
    let mut syy = 0.;
    let mut sxy = 0.;

    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0. || !denom.is_finite() {
        return f64::NAN;
    }
    sxy / denom
}

fn ranks_average_ties(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));

    let mut ranks = vec![0.; n];
    let mut i = 0;

    while i < n {
        let start = i;
        let v = xs[idx[i]];
        i += 1;

        while i < n && xs[idx[i]] == v {
            i += 1;
        }

        // Ranks are 1-based; `i` is the exclusive end of the tie group.
        let avg_rank = (start as f64 + 1. + i as f64) * 0.5;
        for &j in &idx[start..i] {
            ranks[j] = avg_rank;
        }
    }

    ranks
}

fn spearman_corr(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }
    pearson_corr(&ranks_average_ties(xs), &ranks_average_ties(ys))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn perfect_prediction() {
        let y = [1., 2., 3., 4.];
        let m = EvalMetrics::new(&y, &y);
        assert_relative_eq!(m.mse, 0.);
        assert_relative_eq!(m.r2, 1.);
        assert_relative_eq!(m.pearson, 1., epsilon = 1e-12);
        assert_relative_eq!(m.spearman, 1., epsilon = 1e-12);
    }

    #[test]
    fn known_values() {
        let y = [3., -0.5, 2., 7.];
        let yhat = [2.5, 0., 2., 8.];
        let m = EvalMetrics::new(&y, &yhat);

        assert_relative_eq!(m.mse, 0.375, epsilon = 1e-12);
        assert_relative_eq!(m.mae, 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.r2, 0.948_608_137, epsilon = 1e-8);
    }

    #[test]
    fn mean_predictor_has_zero_r2() {
        let y = [1., 2., 3.];
        assert_relative_eq!(r2_score(&y, &[2., 2., 2.]), 0.);
    }

    #[test]
    fn constant_target_r2() {
        assert_eq!(r2_score(&[5., 5.], &[5., 5.]), 1.);
        assert_eq!(r2_score(&[5., 5.], &[5., 4.]), 0.);
        assert!(r2_score(&[5.], &[5.]).is_nan());
    }

    #[test]
    fn ties_average() {
        assert_eq!(ranks_average_ties(&[10., 20., 10., 30.]), vec![1.5, 3., 1.5, 4.]);
    }
}
