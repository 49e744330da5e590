use crate::state::Quote;

/// VIX1D / VIX term-structure inversion threshold
const VIX_RATIO_THRESHOLD: f64 = 1.10;
const VVIX_THRESHOLD: f64 = 115.0;
const SKEW_THRESHOLD: f64 = 145.0;
/// |spot - open| / open above this counts as a large session move
const MOVE_THRESHOLD: f64 = 0.008;

const VIX_RATIO_WEIGHT: u8 = 40;
const VVIX_WEIGHT: u8 = 30;
const SKEW_WEIGHT: u8 = 15;
const MOVE_WEIGHT: u8 = 15;

/// Price must clear the open by 0.4% before breadth can confirm a bias
const BULLISH_OPEN_MULTIPLIER: f64 = 1.004;
const BEARISH_OPEN_MULTIPLIER: f64 = 0.996;
const TRIN_BULLISH_BELOW: f64 = 0.85;
const TRIN_BEARISH_ABOVE: f64 = 1.15;

/// Score at or above which the day counts as high risk
pub const HIGH_RISK_SCORE: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Neutral,
    Bullish,
    Bearish,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Risk score plus directional bias for one snapshot. Stack-allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RiskAssessment {
    /// Sum of the triggered weights {40, 30, 15, 15}; always within [0, 100].
    pub score: u8,
    pub bias: Bias,
}

impl RiskAssessment {
    #[inline]
    pub fn is_high_risk(&self) -> bool {
        self.score >= HIGH_RISK_SCORE
    }
}

/// Pure function: score and bias from validated inputs.
#[inline]
pub fn assess(quote: &Quote) -> RiskAssessment {
    RiskAssessment {
        score: risk_score(quote),
        bias: bias(quote),
    }
}

/// Additive risk score. Missing secondary indices contribute nothing.
pub fn risk_score(quote: &Quote) -> u8 {
    let mut score = 0;

    if vix_ratio(quote) > VIX_RATIO_THRESHOLD {
        score += VIX_RATIO_WEIGHT;
    }
    if quote.vvix.is_some_and(|v| v > VVIX_THRESHOLD) {
        score += VVIX_WEIGHT;
    }
    if quote.skew.is_some_and(|s| s > SKEW_THRESHOLD) {
        score += SKEW_WEIGHT;
    }
    if quote.move_from_open().abs() > MOVE_THRESHOLD {
        score += MOVE_WEIGHT;
    }

    score
}

/// VIX1D / VIX; 1.0 when VIX is absent or zero.
#[inline]
pub fn vix_ratio(quote: &Quote) -> f64 {
    match quote.vix {
        Some(vix) if vix != 0.0 => quote.vix1d / vix,
        _ => 1.0,
    }
}

/// Two-factor bias: price move and breadth must agree.
pub fn bias(quote: &Quote) -> Bias {
    if quote.spot > quote.open * BULLISH_OPEN_MULTIPLIER && quote.trin < TRIN_BULLISH_BELOW {
        Bias::Bullish
    } else if quote.spot < quote.open * BEARISH_OPEN_MULTIPLIER && quote.trin > TRIN_BEARISH_ABOVE {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}
