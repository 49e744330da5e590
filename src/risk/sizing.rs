/// Position sizing for defined-risk spreads.
///
/// max_risk  = balance * 2%
/// contracts = max(1, floor(max_risk / (wing_width * 100)))
/// target    = balance * 0.5%
///
/// Wing width approximates the max loss per contract under the standard
/// $100 multiplier, so size scales inversely with it. Pure function.

/// Short-term IV level above which wings widen
const WIDE_WING_VIX1D: f64 = 18.0;
const WIDE_WING: f64 = 5.0;
const NARROW_WING: f64 = 2.0;

const CONTRACT_MULTIPLIER: f64 = 100.0;
const MAX_RISK_PCT: f64 = 0.02;
const TARGET_PROFIT_PCT: f64 = 0.005;

/// Sizing result. Stack-allocated.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Sizing {
    pub wing_width: f64,
    pub max_risk: f64,
    pub target_profit: f64,
    pub contracts: u32,
}

/// Wider wings when short-dated vol is elevated.
#[inline]
pub fn wing_width(vix1d: f64) -> f64 {
    if vix1d > WIDE_WING_VIX1D {
        WIDE_WING
    } else {
        NARROW_WING
    }
}

/// Compute wing width, risk budget and contract count. Always at least one contract.
#[inline]
pub fn compute_sizing(balance: f64, vix1d: f64) -> Sizing {
    let wing_width = wing_width(vix1d);
    let max_risk = balance * MAX_RISK_PCT;
    let target_profit = balance * TARGET_PROFIT_PCT;

    // Saturating float->int cast; balance is validated positive upstream
    let raw = (max_risk / (wing_width * CONTRACT_MULTIPLIER)).floor() as u32;

    Sizing {
        wing_width,
        max_risk,
        target_profit,
        contracts: raw.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wing_width_threshold() {
        assert_eq!(wing_width(12.0), 2.0);
        assert_eq!(wing_width(18.0), 2.0);
        assert_eq!(wing_width(18.01), 5.0);
    }

    #[test]
    fn test_default_balance_wide_wings() {
        let s = compute_sizing(28_630.0, 20.0);
        assert_eq!(s.wing_width, 5.0);
        assert!((s.max_risk - 572.6).abs() < 1e-9, "max_risk={}", s.max_risk);
        assert!((s.target_profit - 143.15).abs() < 1e-9, "target={}", s.target_profit);
        assert_eq!(s.contracts, 1);
    }

    #[test]
    fn test_narrow_wings_size_up() {
        let s = compute_sizing(28_630.0, 12.0);
        // 572.6 / 200 = 2.863
        assert_eq!(s.contracts, 2);

        let s = compute_sizing(100_000.0, 12.0);
        assert_eq!(s.contracts, 10);
    }

    #[test]
    fn test_minimum_one_contract() {
        let s = compute_sizing(1_000.0, 25.0);
        // 20 / 500 = 0.04
        assert_eq!(s.contracts, 1, "small accounts still get one contract");
    }
}
