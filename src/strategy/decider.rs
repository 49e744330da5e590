use crate::errors::{EngineError, EngineResult};
use crate::models::strike::StrikeEstimator;
use crate::models::OptionType;
use crate::risk::score::{self, Bias, RiskAssessment};
use crate::risk::sizing;
use crate::state::{AccountContext, MarketSnapshot, Quote};
use crate::strategy::policy::{CreditLegs, DebitShortLeg, StrategyPolicy};

const DEBIT_LONG_DELTA: f64 = 0.70;
const DEBIT_SHORT_DELTA: f64 = 0.50;
const CREDIT_SHORT_DELTA: f64 = 0.10;

/// Credit strikes sit at least 1% out of the money
const CALL_FLOOR_MULTIPLIER: f64 = 1.01;
const PUT_FLOOR_MULTIPLIER: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    DebitSpread,
    CreditSpread,
    IronCondor,
    NoTrade,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DebitSpread => write!(f, "DEBIT_SPREAD"),
            Self::CreditSpread => write!(f, "CREDIT_SPREAD"),
            Self::IronCondor => write!(f, "IRON_CONDOR"),
            Self::NoTrade => write!(f, "NO_TRADE"),
        }
    }
}

/// Strategy recommendation for one snapshot.
///
/// Strike fields are `None` when not applicable. For an iron condor,
/// `short_strike` is the call-side short and `put_short_strike` the put-side short.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StrategyDecision {
    pub kind: StrategyKind,
    pub bias: Bias,
    pub long_strike: Option<f64>,
    pub short_strike: Option<f64>,
    pub put_short_strike: Option<f64>,
    pub wing_width: f64,
    pub contracts: u32,
    pub target_profit: f64,
}

impl StrategyDecision {
    #[inline]
    pub fn is_trade(&self) -> bool {
        self.kind != StrategyKind::NoTrade
    }
}

/// Maps a market snapshot and account to a strategy recommendation.
///
/// Priority (first match wins):
///   1. high risk + directional bias  -> debit spread in the bias direction
///   2. high risk + neutral           -> no trade
///   3. normal risk + directional     -> credit spread against the adverse side
///   4. normal risk + neutral         -> iron condor
///
/// Holds no mutable state; one instance serves every caller.
#[derive(Debug, Clone, Default)]
pub struct StrategyDecider {
    estimator: StrikeEstimator,
    policy: StrategyPolicy,
}

impl StrategyDecider {
    pub fn new(policy: StrategyPolicy) -> Self {
        Self {
            estimator: StrikeEstimator::new(),
            policy,
        }
    }

    #[inline]
    pub fn estimator(&self) -> &StrikeEstimator {
        &self.estimator
    }

    #[inline]
    pub fn policy(&self) -> StrategyPolicy {
        self.policy
    }

    pub fn assess(&self, snapshot: &MarketSnapshot) -> EngineResult<RiskAssessment> {
        let quote = snapshot.validate()?;
        Ok(score::assess(&quote))
    }

    pub fn decide(
        &self,
        snapshot: &MarketSnapshot,
        account: &AccountContext,
    ) -> EngineResult<StrategyDecision> {
        self.analyze(snapshot, account).map(|(_, decision)| decision)
    }

    /// Risk assessment and decision together, computed from one validation pass.
    pub fn analyze(
        &self,
        snapshot: &MarketSnapshot,
        account: &AccountContext,
    ) -> EngineResult<(RiskAssessment, StrategyDecision)> {
        let quote = snapshot.validate()?;
        if !account.balance.is_finite() || account.balance <= 0.0 {
            return Err(EngineError::InvalidBalance(account.balance));
        }

        let risk = score::assess(&quote);
        let size = sizing::compute_sizing(account.balance, quote.vix1d);

        let mut decision = StrategyDecision {
            kind: StrategyKind::NoTrade,
            bias: risk.bias,
            long_strike: None,
            short_strike: None,
            put_short_strike: None,
            wing_width: size.wing_width,
            contracts: size.contracts,
            target_profit: size.target_profit,
        };

        match (risk.is_high_risk(), directional_type(risk.bias)) {
            (true, Some(side)) => {
                decision.kind = StrategyKind::DebitSpread;
                let long = self.strike(&quote, DEBIT_LONG_DELTA, side)?;
                decision.long_strike = Some(round_strike(long));
                decision.short_strike = match self.policy.debit_short_leg {
                    DebitShortLeg::DeltaEstimate => {
                        Some(round_strike(self.strike(&quote, DEBIT_SHORT_DELTA, side)?))
                    }
                    DebitShortLeg::Omitted => None,
                };
            }
            (true, None) => {}
            (false, Some(side)) => {
                decision.kind = StrategyKind::CreditSpread;
                // Sell on the side away from the bias: puts when bullish, calls when bearish
                let (short, long) = match side {
                    OptionType::Call => {
                        let short = self.short_put(&quote)?;
                        (short, short - size.wing_width)
                    }
                    OptionType::Put => {
                        let short = self.short_call(&quote)?;
                        (short, short + size.wing_width)
                    }
                };
                decision.short_strike = Some(short);
                if self.policy.credit_legs == CreditLegs::WithProtectiveLong {
                    decision.long_strike = Some(long);
                }
            }
            (false, None) => {
                decision.kind = StrategyKind::IronCondor;
                decision.short_strike = Some(self.short_call(&quote)?);
                decision.put_short_strike = Some(self.short_put(&quote)?);
            }
        }

        Ok((risk, decision))
    }

    #[inline]
    fn strike(&self, quote: &Quote, delta: f64, side: OptionType) -> EngineResult<f64> {
        self.estimator.estimate(quote.spot, quote.vix1d, delta, side)
    }

    /// Higher of the 1% OTM floor and the delta-0.10 call, rounded.
    fn short_call(&self, quote: &Quote) -> EngineResult<f64> {
        let by_delta = self.strike(quote, CREDIT_SHORT_DELTA, OptionType::Call)?;
        Ok(round_strike((quote.spot * CALL_FLOOR_MULTIPLIER).max(by_delta)))
    }

    /// Lower of the 1% OTM floor and the delta-0.10 put, rounded.
    fn short_put(&self, quote: &Quote) -> EngineResult<f64> {
        let by_delta = self.strike(quote, CREDIT_SHORT_DELTA, OptionType::Put)?;
        Ok(round_strike((quote.spot * PUT_FLOOR_MULTIPLIER).min(by_delta)))
    }
}

/// Option right that expresses a directional bias.
#[inline]
fn directional_type(bias: Bias) -> Option<OptionType> {
    match bias {
        Bias::Bullish => Some(OptionType::Call),
        Bias::Bearish => Some(OptionType::Put),
        Bias::Neutral => None,
    }
}

/// Nearest whole strike, ties to even.
#[inline]
fn round_strike(strike: f64) -> f64 {
    strike.round_ties_even()
}
