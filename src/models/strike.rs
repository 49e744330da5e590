use crate::errors::{EngineError, EngineResult};
use crate::models::OptionType;
use statrs::distribution::{ContinuousCDF, Normal};

/// Remaining life of a same-day option, in years. Not calendar-aware.
pub const SAME_DAY_TTL_YEARS: f64 = 0.7 / 365.0;

/// Volatility used when the IV proxy is zero or not a number.
pub const FALLBACK_SIGMA: f64 = 0.15;

/// Strike-from-delta approximation.
///
/// K = S * exp( z * sigma * sqrt(T))   for calls, z = Phi^-1(delta)
/// K = S * exp(-z * sigma * sqrt(T))   for puts,  z = Phi^-1(1 - |delta|)
///
/// Lognormal quantile around spot with r = 0 and spot as the forward proxy.
/// Not a full Black-Scholes delta inversion.
#[derive(Debug, Clone)]
pub struct StrikeEstimator {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
    sqrt_t: f64,
}

impl StrikeEstimator {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
            sqrt_t: SAME_DAY_TTL_YEARS.sqrt(),
        }
    }

    /// Estimate the strike whose delta is `delta` for a same-day option.
    ///
    /// `iv_percent` is a volatility index level (e.g. VIX1D = 14.2).
    /// Fails with `InvalidDelta` unless 0 < delta < 1.
    pub fn estimate(
        &self,
        spot: f64,
        iv_percent: f64,
        delta: f64,
        option_type: OptionType,
    ) -> EngineResult<f64> {
        // Also rejects NaN: the quantile is infinite at both ends.
        if !(delta > 0.0 && delta < 1.0) {
            return Err(EngineError::InvalidDelta(delta));
        }

        let mut sigma = iv_percent / 100.0;
        if !sigma.is_finite() || sigma == 0.0 {
            sigma = FALLBACK_SIGMA;
        }

        let sigma_sqrt_t = sigma * self.sqrt_t;

        let strike = match option_type {
            OptionType::Call => {
                let z = self.normal.inverse_cdf(delta);
                spot * (z * sigma_sqrt_t).exp()
            }
            OptionType::Put => {
                let z = self.normal.inverse_cdf(1.0 - delta.abs());
                spot * (-z * sigma_sqrt_t).exp()
            }
        };

        Ok(strike)
    }
}

impl Default for StrikeEstimator {
    fn default() -> Self {
        Self::new()
    }
}
