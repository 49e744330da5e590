use crate::errors::{EngineError, EngineResult};
use crate::strategy::policy::{CreditLegs, DebitShortLeg, StrategyPolicy};
use std::str::FromStr;

/// Tickers the feed pulls for one snapshot.
#[derive(Debug, Clone)]
pub struct TickerSet {
    pub underlying: String,
    pub vix1d: String,
    pub vix: String,
    pub vvix: String,
    pub skew: String,
    pub trin: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub account_balance: f64,
    pub market_data_base_url: String,
    pub tickers: TickerSet,
    pub poll_interval_secs: u64,
    pub server_port: u16,
    pub policy: StrategyPolicy,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let account_balance: f64 = env_parse("ACCOUNT_BALANCE", "28630")?;
        let poll_interval_secs: u64 = env_parse("POLL_INTERVAL_SECS", "60")?;
        let server_port: u16 = env_parse("SERVER_PORT", "3001")?;

        if poll_interval_secs == 0 {
            return Err(EngineError::Config("POLL_INTERVAL_SECS must be positive".into()));
        }

        // Variant parsers already produce Config errors
        let debit_short_leg = DebitShortLeg::from_str(&env_var_or("DEBIT_SHORT_LEG", "delta"))?;
        let credit_legs = CreditLegs::from_str(&env_var_or("CREDIT_LEGS", "short_only"))?;

        Ok(Self {
            account_balance,
            market_data_base_url: env_var_or(
                "MARKET_DATA_BASE_URL",
                "https://query1.finance.yahoo.com",
            ),
            tickers: TickerSet {
                underlying: env_var_or("UNDERLYING_SYMBOL", "SPY"),
                vix1d: env_var_or("VIX1D_SYMBOL", "^VIX1D"),
                vix: env_var_or("VIX_SYMBOL", "^VIX"),
                vvix: env_var_or("VVIX_SYMBOL", "^VVIX"),
                skew: env_var_or("SKEW_SYMBOL", "^SKEW"),
                trin: env_var_or("TRIN_SYMBOL", "^TRIN"),
            },
            poll_interval_secs,
            server_port,
            policy: StrategyPolicy {
                debit_short_leg,
                credit_legs,
            },
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

#[cfg(test)]
impl AppConfig {
    /// Defaults without touching the process environment.
    pub fn for_tests() -> Self {
        Self {
            account_balance: 28_630.0,
            market_data_base_url: "http://127.0.0.1:9".into(),
            tickers: TickerSet {
                underlying: "SPY".into(),
                vix1d: "^VIX1D".into(),
                vix: "^VIX".into(),
                vvix: "^VVIX".into(),
                skew: "^SKEW".into(),
                trin: "^TRIN".into(),
            },
            poll_interval_secs: 60,
            server_port: 0,
            policy: StrategyPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_default_used() {
        let v: f64 = env_parse("ZERO_DTE_TEST_UNSET_KEY", "28630").unwrap();
        assert_eq!(v, 28_630.0);
    }

    #[test]
    fn test_env_parse_bad_default_is_config_error() {
        let res: EngineResult<u16> = env_parse("ZERO_DTE_TEST_UNSET_KEY", "not-a-port");
        match res {
            Err(EngineError::Config(msg)) => assert!(msg.starts_with("ZERO_DTE_TEST_UNSET_KEY")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
