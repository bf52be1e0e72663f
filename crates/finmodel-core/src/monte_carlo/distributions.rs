use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF, LogNormal, Normal, Triangular, Uniform};

use crate::error::FinModelError;
use crate::FinModelResult;

// ---------------------------------------------------------------------------
// Declared distributions
// ---------------------------------------------------------------------------

/// Distribution of one risk factor's draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiskDistribution {
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
    /// Beta on [0, 1]
    Beta { alpha: f64, beta: f64 },
    /// Beta on [0, 1] fitted to a mean and standard deviation by the method of moments
    BetaMoments { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    /// Bernoulli shock: `impact` with `probability`, otherwise zero
    Event { probability: f64, impact: f64 },
}

impl RiskDistribution {
    /// Validate parameters and build the sampler. `name` labels errors.
    pub fn prepare(&self, name: &str) -> FinModelResult<Sampler> {
        let param = |p: &str| format!("risk_factors.{name}.{p}");
        let bad = |p: &str, reason: &str| Err(FinModelError::configuration(param(p), reason));
        let finite = |p: &str, v: f64| -> FinModelResult<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(FinModelError::configuration(param(p), "must be a finite number"))
            }
        };

        match *self {
            Self::Normal { mean, std_dev } => {
                finite("mean", mean)?;
                finite("std_dev", std_dev)?;
                if std_dev < 0.0 {
                    return bad("std_dev", "standard deviation cannot be negative");
                }
                if std_dev == 0.0 {
                    return Ok(Sampler::Constant(mean));
                }
                Normal::new(mean, std_dev)
                    .map(Sampler::Normal)
                    .map_err(|e| FinModelError::configuration(param("std_dev"), e.to_string()))
            }
            Self::Uniform { min, max } => {
                finite("min", min)?;
                finite("max", max)?;
                if max < min {
                    return bad("max", "max must not be below min");
                }
                if max == min {
                    return Ok(Sampler::Constant(min));
                }
                Uniform::new(min, max)
                    .map(Sampler::Uniform)
                    .map_err(|e| FinModelError::configuration(param("max"), e.to_string()))
            }
            Self::Beta { alpha, beta } => {
                finite("alpha", alpha)?;
                finite("beta", beta)?;
                if alpha <= 0.0 || beta <= 0.0 {
                    return bad("alpha", "alpha and beta must be positive");
                }
                Beta::new(alpha, beta)
                    .map(Sampler::Beta)
                    .map_err(|e| FinModelError::configuration(param("alpha"), e.to_string()))
            }
            Self::BetaMoments { mean, std_dev } => {
                finite("mean", mean)?;
                finite("std_dev", std_dev)?;
                if mean <= 0.0 || mean >= 1.0 {
                    return bad("mean", "mean must lie strictly between 0 and 1");
                }
                if std_dev < 0.0 {
                    return bad("std_dev", "standard deviation cannot be negative");
                }
                if std_dev == 0.0 {
                    return Ok(Sampler::Constant(mean));
                }
                let (alpha, beta) = beta_from_moments(mean, std_dev).ok_or_else(|| {
                    FinModelError::configuration(
                        param("std_dev"),
                        "variance too large for a beta distribution with this mean",
                    )
                })?;
                Beta::new(alpha, beta)
                    .map(Sampler::Beta)
                    .map_err(|e| FinModelError::configuration(param("std_dev"), e.to_string()))
            }
            Self::LogNormal { mu, sigma } => {
                finite("mu", mu)?;
                finite("sigma", sigma)?;
                if sigma < 0.0 {
                    return bad("sigma", "sigma cannot be negative");
                }
                if sigma == 0.0 {
                    return Ok(Sampler::Constant(mu.exp()));
                }
                LogNormal::new(mu, sigma)
                    .map(Sampler::LogNormal)
                    .map_err(|e| FinModelError::configuration(param("sigma"), e.to_string()))
            }
            Self::Triangular { min, mode, max } => {
                finite("min", min)?;
                finite("mode", mode)?;
                finite("max", max)?;
                if max < min {
                    return bad("max", "max must not be below min");
                }
                if mode < min || mode > max {
                    return bad("mode", "mode must lie within [min, max]");
                }
                if max == min {
                    return Ok(Sampler::Constant(min));
                }
                Triangular::new(min, max, mode)
                    .map(Sampler::Triangular)
                    .map_err(|e| FinModelError::configuration(param("mode"), e.to_string()))
            }
            Self::Event {
                probability,
                impact,
            } => {
                finite("probability", probability)?;
                finite("impact", impact)?;
                if !(0.0..=1.0).contains(&probability) {
                    return bad("probability", "probability must lie within [0, 1]");
                }
                Ok(Sampler::Event {
                    probability,
                    impact,
                })
            }
        }
    }
}

/// Method-of-moments beta parameters. `None` when the variance is infeasible.
pub fn beta_from_moments(mean: f64, std_dev: f64) -> Option<(f64, f64)> {
    let var = std_dev * std_dev;
    let common = mean * (1.0 - mean) / var - 1.0;
    if common <= 0.0 {
        return None;
    }
    Some((mean * common, (1.0 - mean) * common))
}

// ---------------------------------------------------------------------------
// Validated samplers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Sampler {
    Constant(f64),
    Normal(Normal),
    Uniform(Uniform),
    Beta(Beta),
    LogNormal(LogNormal),
    Triangular(Triangular),
    Event { probability: f64, impact: f64 },
}

impl Sampler {
    /// Independent draw.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Normal(d) => rng.sample(d),
            Self::Uniform(d) => rng.sample(d),
            Self::Beta(d) => rng.sample(d),
            Self::LogNormal(d) => rng.sample(d),
            Self::Triangular(d) => rng.sample(d),
            Self::Event {
                probability,
                impact,
            } => {
                if rng.gen::<f64>() < *probability {
                    *impact
                } else {
                    0.0
                }
            }
        }
    }

    /// Draw mapped from a uniform quantile `u` in (0, 1), for copula sampling.
    pub fn quantile(&self, u: f64) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Normal(d) => d.inverse_cdf(u),
            Self::Uniform(d) => d.inverse_cdf(u),
            Self::Beta(d) => d.inverse_cdf(u),
            Self::LogNormal(d) => d.inverse_cdf(u),
            Self::Triangular(d) => d.inverse_cdf(u),
            Self::Event {
                probability,
                impact,
            } => {
                if u < *probability {
                    *impact
                } else {
                    0.0
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Lower-triangular Cholesky factor of a validated correlation matrix.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    lower: Vec<f64>,
    dim: usize,
}

impl CholeskyFactor {
    /// Validate `matrix` as a correlation matrix over `dim` factors and factor it.
    pub fn new(matrix: &[Vec<f64>], dim: usize) -> FinModelResult<Self> {
        const EPS: f64 = 1e-9;
        let err = |reason: String| FinModelError::configuration("correlation", reason);

        if matrix.len() != dim || matrix.iter().any(|row| row.len() != dim) {
            return Err(err(format!("correlation matrix must be {dim}x{dim}")));
        }
        for (i, row) in matrix.iter().enumerate() {
            if row.iter().any(|v| !v.is_finite()) {
                return Err(err(format!("row {i} contains a non-finite value")));
            }
            if (row[i] - 1.0).abs() > EPS {
                return Err(err(format!("diagonal element {i} must be 1")));
            }
            for j in (i + 1)..dim {
                if (row[j] - matrix[j][i]).abs() > EPS {
                    return Err(err(format!("matrix is not symmetric at ({i}, {j})")));
                }
                if !(-1.0..=1.0).contains(&row[j]) {
                    return Err(err(format!("element ({i}, {j}) outside [-1, 1]")));
                }
            }
        }

        let mut lower = vec![0.0_f64; dim * dim];
        for i in 0..dim {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += lower[i * dim + k] * lower[j * dim + k];
                }
                if i == j {
                    let diag = matrix[i][i] - sum;
                    if diag <= 0.0 {
                        return Err(err("matrix is not positive definite".into()));
                    }
                    lower[i * dim + i] = diag.sqrt();
                } else {
                    lower[i * dim + j] = (matrix[i][j] - sum) / lower[j * dim + j];
                }
            }
        }
        Ok(Self { lower, dim })
    }

    /// W = L Z for independent standard normals Z.
    pub fn transform(&self, z: &[f64]) -> Vec<f64> {
        (0..self.dim)
            .map(|i| (0..=i).map(|k| self.lower[i * self.dim + k] * z[k]).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_negative_std_dev_rejected() {
        let d = RiskDistribution::Normal {
            mean: 0.0,
            std_dev: -0.1,
        };
        assert!(d.prepare("demand").unwrap_err().is_configuration());
    }

    #[test]
    fn test_inverted_uniform_rejected() {
        let d = RiskDistribution::Uniform { min: 1.0, max: 0.5 };
        assert!(d.prepare("efficiency").is_err());
    }

    #[test]
    fn test_event_probability_range() {
        let d = RiskDistribution::Event {
            probability: 1.5,
            impact: -0.1,
        };
        assert!(d.prepare("competitor").is_err());
    }

    #[test]
    fn test_zero_std_dev_is_constant() {
        let d = RiskDistribution::Normal {
            mean: 0.04,
            std_dev: 0.0,
        };
        let s = d.prepare("rate").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(s.sample(&mut rng), 0.04);
    }

    #[test]
    fn test_beta_from_moments() {
        let (a, b) = beta_from_moments(0.95, 0.05).unwrap();
        assert!((a - 17.1).abs() < 1e-9);
        assert!((b - 0.9).abs() < 1e-9);
        assert!(beta_from_moments(0.5, 0.6).is_none());
    }

    #[test]
    fn test_event_frequency() {
        let s = RiskDistribution::Event {
            probability: 0.3,
            impact: -0.05,
        }
        .prepare("competitor")
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let hits = (0..10_000)
            .filter(|_| s.sample(&mut rng) != 0.0)
            .count();
        assert!((2_800..3_200).contains(&hits));
    }

    #[test]
    fn test_cholesky_two_factor() {
        let c = CholeskyFactor::new(&[vec![1.0, 0.5], vec![0.5, 1.0]], 2).unwrap();
        let w = c.transform(&[1.0, 0.0]);
        assert!((w[0] - 1.0).abs() < 1e-12);
        assert!((w[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_bad_matrices() {
        assert!(CholeskyFactor::new(&[vec![1.0, 0.5], vec![0.4, 1.0]], 2).is_err());
        assert!(CholeskyFactor::new(&[vec![2.0, 0.0], vec![0.0, 1.0]], 2).is_err());
        assert!(CholeskyFactor::new(&[vec![1.0]], 2).is_err());
        let not_pd = vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ];
        assert!(CholeskyFactor::new(&not_pd, 3).is_err());
    }
}
