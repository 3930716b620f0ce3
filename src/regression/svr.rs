//! Epsilon-insensitive support vector regression with an RBF kernel.
//!
//! Targets are centered on their training mean, which becomes the intercept and is left
//! unregularized. The dual is then solved by coordinate descent without an equality constraint;
//! each coordinate update is a closed-form soft-threshold and clip. With β = α - α*, the model is
//! f(x) = b + Σ β_i K(x_i, x). Far from the training data, predictions relax toward b.

use bincode::{Decode, Encode};
use log::{debug, warn};

use crate::dataset::Features;

const MAX_SWEEPS: usize = 1_000;
const TOL: f64 = 1e-4;
/// Coefficients below this are treated as zero, and their samples dropped from the model.
const SUPPORT_EPS: f64 = 1e-12;

#[derive(Clone, Debug, Encode, Decode)]
pub struct SvrParams {
    /// Regularization: the bound on each dual coefficient.
    pub c: f64,
    /// Half-width of the insensitive tube.
    pub epsilon: f64,
}

impl Default for SvrParams {
    fn default() -> Self {
        Self { c: 1., epsilon: 0.1 }
    }
}

#[derive(Clone, Debug, Encode, Decode)]
pub struct Svr {
    pub params: SvrParams,
    pub gamma: f64,
    /// Mean training target.
    pub intercept: f64,
    support: Vec<Features>,
    coefs: Vec<f64>,
}

fn rbf(a: &Features, b: &Features, gamma: f64) -> f64 {
    let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * d2).exp()
}

/// `1 / (n_features * Var(X))`, with the variance over every entry of the matrix.
pub fn scale_gamma(x: &[Features]) -> f64 {
    let vals: Vec<f64> = x.iter().flatten().copied().collect();
    if vals.is_empty() {
        return 1.;
    }

    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    let n_features = x.first().map(|f| f.len()).unwrap_or(1) as f64;

    if var > 0. && var.is_finite() {
        1. / (n_features * var)
    } else {
        1.
    }
}

impl Svr {
    pub fn fit(x: &[Features], y: &[f64], params: SvrParams) -> Self {
        let n = x.len().min(y.len());
        let gamma = scale_gamma(&x[..n]);

        let intercept = if n > 0 {
            y[..n].iter().sum::<f64>() / n as f64
        } else {
            0.
        };
        let y: Vec<f64> = y[..n].iter().map(|v| v - intercept).collect();

        let mut k = vec![0.; n * n];
        for i in 0..n {
            for j in i..n {
                let v = rbf(&x[i], &x[j], gamma);
                k[i * n + j] = v;
                k[j * n + i] = v;
            }
        }

        let mut beta = vec![0.; n];
        // f = Kβ, kept current as β changes.
        let mut f = vec![0.; n];

        let mut converged = false;
        let mut sweeps = 0;

        while sweeps < MAX_SWEEPS {
            sweeps += 1;
            let mut max_delta: f64 = 0.;

            for i in 0..n {
                let q = k[i * n + i];
                let g = f[i] - y[i];

                let z = beta[i] - g / q;
                let shrink = params.epsilon / q;
                let soft = z.signum() * (z.abs() - shrink).max(0.);
                let new = soft.clamp(-params.c, params.c);

                let delta = new - beta[i];
                if delta != 0. {
                    let row = &k[i * n..(i + 1) * n];
                    for (fj, kij) in f.iter_mut().zip(row) {
                        *fj += delta * kij;
                    }
                    beta[i] = new;
                }
                max_delta = max_delta.max(delta.abs());
            }

            if max_delta < TOL {
                converged = true;
                break;
            }
        }

        if converged {
            debug!("SVR converged after {sweeps} sweeps");
        } else {
            warn!("SVR did not converge within {MAX_SWEEPS} sweeps");
        }

        let mut support = Vec::new();
        let mut coefs = Vec::new();
        for i in 0..n {
            if beta[i].abs() > SUPPORT_EPS {
                support.push(x[i]);
                coefs.push(beta[i]);
            }
        }

        debug!("SVR: {} support vectors of {n} samples, gamma {gamma:.3e}", support.len());

        Self {
            params,
            gamma,
            intercept,
            support,
            coefs,
        }
    }

    pub fn predict(&self, x: &Features) -> f64 {
        self.intercept
            + self
                .support
                .iter()
                .zip(&self.coefs)
                .map(|(s, b)| b * rbf(s, x, self.gamma))
                .sum::<f64>()
    }

    pub fn num_support(&self) -> usize {
        self.support.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn gamma_scale() {
        let x = vec![[0., 0., 0., 0.], [2., 2., 2., 2.]];
        // Var over all entries is 1.
        assert_relative_eq!(scale_gamma(&x), 0.25);
        assert_eq!(scale_gamma(&[[3., 3., 3., 3.]]), 1.);
    }

    #[test]
    fn constant_target() {
        let x: Vec<Features> = (0..20).map(|i| [i as f64 * 0.1, 1., 0., 0.]).collect();
        let y = vec![5.; 20];
        let svr = Svr::fit(&x, &y, SvrParams::default());

        // Everything lies inside the tube once centered.
        assert_eq!(svr.num_support(), 0);
        assert_relative_eq!(svr.intercept, 5.);
        for xi in &x {
            assert_relative_eq!(svr.predict(xi), 5.);
        }
    }

    #[test]
    fn coefficients_bounded_by_c() {
        let x: Vec<Features> = (0..15).map(|i| [i as f64, (i % 3) as f64, 0., 1.]).collect();
        let y: Vec<f64> = (0..15).map(|i| (i as f64 * 0.7).sin() * 3. + 6.).collect();
        let params = SvrParams { c: 0.5, epsilon: 0.1 };
        let svr = Svr::fit(&x, &y, params);

        assert!(svr.coefs.iter().all(|b| b.abs() <= 0.5 + 1e-12));
        assert!(svr.predict(&x[0]).is_finite());
    }

    #[test]
    fn tracks_a_trend() {
        let x: Vec<Features> = (0..30).map(|i| [i as f64 / 10., 0., 0., 0.]).collect();
        let y: Vec<f64> = x.iter().map(|f| 4. + f[0]).collect();
        let svr = Svr::fit(&x, &y, SvrParams::default());

        assert!(svr.predict(&x[25]) > svr.predict(&x[5]));
    }

    #[test]
    fn distant_input_relaxes_to_mean() {
        let x: Vec<Features> = (0..8)
            .map(|i| [300. + i as f64 * 15., 60. + i as f64, 4., 2.])
            .collect();
        let y = vec![7.0, 7.05, 7.1, 7.2, 7.0, 7.15, 7.1, 7.05];
        let mean = y.iter().sum::<f64>() / y.len() as f64;

        let svr = Svr::fit(&x, &y, SvrParams::default());
        assert_relative_eq!(svr.intercept, mean);

        for xi in &x {
            let p = svr.predict(xi);
            assert!((6.8..=7.4).contains(&p), "{p}");
        }
        assert_relative_eq!(svr.predict(&[5000., 1000., 50., 20.]), mean, epsilon = 1e-6);
    }
}
