use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::config::BootstrapConfig;
use crate::distribution::Distribution;

/// Resampling interval around the top label's posterior probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
    /// Nominal coverage, e.g. 0.95.
    pub level: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub const fn point(value: f64, level: f64) -> Self {
        Self {
            low: value,
            high: value,
            level,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// Seeded bootstrap over the posterior.
///
/// Each resample draws `sample_size` labels from the posterior and records
/// the share that landed on the top label; the interval is read off the
/// empirical quantiles of those shares. The same seed always yields the same
/// interval.
#[must_use]
pub fn bootstrap_interval(
    posterior: &Distribution,
    config: &BootstrapConfig,
) -> ConfidenceInterval {
    let Some((_, p_top)) = posterior.top() else {
        return ConfidenceInterval::point(0.0, config.level);
    };
    let p_top = p_top.clamp(0.0, 1.0);
    if config.resamples == 0 || config.sample_size == 0 {
        return ConfidenceInterval::point(p_top, config.level);
    }

    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let n = config.sample_size as f64;
    let mut shares: Vec<f64> = (0..config.resamples)
        .map(|_| {
            let hits = (0..config.sample_size).filter(|_| rng.gen_bool(p_top)).count();
            hits as f64 / n
        })
        .collect();
    shares.sort_by(f64::total_cmp);

    let alpha = (1.0 - config.level).clamp(0.0, 1.0);
    ConfidenceInterval {
        low: quantile(&shares, alpha / 2.0),
        high: quantile(&shares, 1.0 - alpha / 2.0),
        level: config.level,
    }
}

/// Nearest-rank quantile of a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let last = sorted.len().saturating_sub(1);
    let idx = (q * last as f64).round() as usize;
    sorted.get(idx.min(last)).copied().unwrap_or(0.0)
}
