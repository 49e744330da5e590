use crate::models::OptionType;
use crate::risk::score::Bias;
use crate::strategy::decider::{StrategyDecision, StrategyKind};
use smallvec::SmallVec;
use std::fmt::Write as _;

/// Distance between the bought and sold strike of a displayed debit spread
pub const DEBIT_DISPLAY_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegAction {
    Buy,
    Sell,
}

/// One displayable option leg. Stack-allocated.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptionLeg {
    pub action: LegAction,
    pub option_type: OptionType,
    pub strike: f64,
}

impl OptionLeg {
    #[inline]
    fn sell(option_type: OptionType, strike: f64) -> Self {
        Self { action: LegAction::Sell, option_type, strike }
    }

    #[inline]
    fn buy(option_type: OptionType, strike: f64) -> Self {
        Self { action: LegAction::Buy, option_type, strike }
    }
}

/// Expand a decision into the legs a trader would enter.
///
/// Credit and condor sides: sell the short, buy the wing (short +/- wing_width).
/// Debit spread: buy the long, sell long +/- 2 in the bias direction.
/// No trade: no legs.
pub fn legs_for(decision: &StrategyDecision) -> SmallVec<[OptionLeg; 4]> {
    let mut legs = SmallVec::new();
    let wing = decision.wing_width;

    match decision.kind {
        StrategyKind::NoTrade => {}
        StrategyKind::DebitSpread => {
            let Some(long) = decision.long_strike else {
                return legs;
            };
            match decision.bias {
                Bias::Bullish => {
                    legs.push(OptionLeg::buy(OptionType::Call, long));
                    legs.push(OptionLeg::sell(OptionType::Call, long + DEBIT_DISPLAY_WIDTH));
                }
                Bias::Bearish => {
                    legs.push(OptionLeg::buy(OptionType::Put, long));
                    legs.push(OptionLeg::sell(OptionType::Put, long - DEBIT_DISPLAY_WIDTH));
                }
                Bias::Neutral => {}
            }
        }
        StrategyKind::CreditSpread => {
            let Some(short) = decision.short_strike else {
                return legs;
            };
            match decision.bias {
                Bias::Bullish => push_put_side(&mut legs, short, wing),
                Bias::Bearish => push_call_side(&mut legs, short, wing),
                Bias::Neutral => {}
            }
        }
        StrategyKind::IronCondor => {
            if let Some(call_short) = decision.short_strike {
                push_call_side(&mut legs, call_short, wing);
            }
            if let Some(put_short) = decision.put_short_strike {
                push_put_side(&mut legs, put_short, wing);
            }
        }
    }

    legs
}

#[inline]
fn push_call_side(legs: &mut SmallVec<[OptionLeg; 4]>, short: f64, wing: f64) {
    legs.push(OptionLeg::sell(OptionType::Call, short));
    legs.push(OptionLeg::buy(OptionType::Call, short + wing));
}

#[inline]
fn push_put_side(legs: &mut SmallVec<[OptionLeg; 4]>, short: f64, wing: f64) {
    legs.push(OptionLeg::sell(OptionType::Put, short));
    legs.push(OptionLeg::buy(OptionType::Put, short - wing));
}

/// One-line order ticket for logs, e.g. "IRON_CONDOR x2: sell 454 call / buy 456 call / ...".
pub fn ticket(decision: &StrategyDecision, legs: &[OptionLeg]) -> String {
    if !decision.is_trade() || legs.is_empty() {
        return format!("{} ({})", decision.kind, decision.bias);
    }

    let mut out = format!("{} x{}:", decision.kind, decision.contracts);
    for (i, leg) in legs.iter().enumerate() {
        let sep = if i == 0 { " " } else { " / " };
        let action = match leg.action {
            LegAction::Buy => "buy",
            LegAction::Sell => "sell",
        };
        let _ = write!(out, "{sep}{action} {} {}", leg.strike, leg.option_type);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(kind: StrategyKind, bias: Bias) -> StrategyDecision {
        StrategyDecision {
            kind,
            bias,
            long_strike: None,
            short_strike: None,
            put_short_strike: None,
            wing_width: 2.0,
            contracts: 2,
            target_profit: 143.15,
        }
    }

    #[test]
    fn test_condor_four_legs() {
        let mut d = decision(StrategyKind::IronCondor, Bias::Neutral);
        d.short_strike = Some(454.0);
        d.put_short_strike = Some(446.0);
        let legs = legs_for(&d);

        assert_eq!(legs.len(), 4);
        assert!(!legs.spilled());
        assert_eq!(legs[0], OptionLeg::sell(OptionType::Call, 454.0));
        assert_eq!(legs[1], OptionLeg::buy(OptionType::Call, 456.0));
        assert_eq!(legs[2], OptionLeg::sell(OptionType::Put, 446.0));
        assert_eq!(legs[3], OptionLeg::buy(OptionType::Put, 444.0));
    }

    #[test]
    fn test_bullish_credit_put_side_only() {
        let mut d = decision(StrategyKind::CreditSpread, Bias::Bullish);
        d.short_strike = Some(446.0);
        d.wing_width = 5.0;
        let legs = legs_for(&d);
        assert_eq!(legs.as_slice(), &[
            OptionLeg::sell(OptionType::Put, 446.0),
            OptionLeg::buy(OptionType::Put, 441.0),
        ]);
    }

    #[test]
    fn test_debit_display_width() {
        let mut d = decision(StrategyKind::DebitSpread, Bias::Bearish);
        d.long_strike = Some(442.0);
        d.short_strike = Some(440.0);
        d.wing_width = 5.0;
        let legs = legs_for(&d);
        assert_eq!(legs.as_slice(), &[
            OptionLeg::buy(OptionType::Put, 442.0),
            OptionLeg::sell(OptionType::Put, 440.0),
        ]);
    }

    #[test]
    fn test_no_trade_has_no_legs() {
        let d = decision(StrategyKind::NoTrade, Bias::Neutral);
        let legs = legs_for(&d);
        assert!(legs.is_empty());
        assert_eq!(ticket(&d, &legs), "NO_TRADE (NEUTRAL)");
    }

    #[test]
    fn test_ticket_format() {
        let mut d = decision(StrategyKind::CreditSpread, Bias::Bearish);
        d.short_strike = Some(444.0);
        let legs = legs_for(&d);
        assert_eq!(ticket(&d, &legs), "CREDIT_SPREAD x2: sell 444 call / buy 446 call");
    }
}
