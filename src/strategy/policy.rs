use crate::errors::EngineError;
use std::str::FromStr;

/// Whether a debit spread records its delta-0.50 short strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitShortLeg {
    #[default]
    DeltaEstimate,
    /// Leave the short strike to the display rule (long +/- 2).
    Omitted,
}

impl FromStr for DebitShortLeg {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" | "delta_estimate" => Ok(Self::DeltaEstimate),
            "omitted" | "none" => Ok(Self::Omitted),
            other => Err(EngineError::Config(format!(
                "DEBIT_SHORT_LEG: expected delta|omitted, got {other}"
            ))),
        }
    }
}

/// Whether a credit spread records its protective long strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditLegs {
    #[default]
    ShortOnly,
    /// long_strike = short -/+ wing_width on the same side
    WithProtectiveLong,
}

impl FromStr for CreditLegs {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_only" | "short" => Ok(Self::ShortOnly),
            "with_long" | "with_protective_long" => Ok(Self::WithProtectiveLong),
            other => Err(EngineError::Config(format!(
                "CREDIT_LEGS: expected short_only|with_long, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct StrategyPolicy {
    pub debit_short_leg: DebitShortLeg,
    pub credit_legs: CreditLegs,
}
