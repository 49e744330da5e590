use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::risk::score::RiskAssessment;
use crate::strategy::decider::{StrategyDecider, StrategyDecision};
use crate::strategy::legs::{self, OptionLeg};
use portable_atomic::{AtomicU64, Ordering};
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Breadth ratio assumed when TRIN is unavailable.
pub const DEFAULT_TRIN: f64 = 1.0;

// ── Engine State Machine ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Connecting,
    Live,
    /// Last snapshot lacked critical data; no recommendation is standing.
    Degraded,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Live => write!(f, "live"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

// ── Market Inputs ──

/// One moment of market data. Every field may be missing at the boundary;
/// `validate` decides which gaps are fatal.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketSnapshot {
    pub spot: Option<f64>,
    pub open: Option<f64>,
    pub vix1d: Option<f64>,
    pub vix: Option<f64>,
    pub vvix: Option<f64>,
    pub skew: Option<f64>,
    pub trin: Option<f64>,
    /// Capture time (RFC 3339), set by the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

impl MarketSnapshot {
    /// Apply the defaulting rules and reject snapshots missing critical data.
    pub fn validate(&self) -> EngineResult<Quote> {
        let spot = self
            .spot
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or(EngineError::MissingCriticalData("spot"))?;

        let open = self
            .open
            .filter(|o| o.is_finite() && *o != 0.0)
            .ok_or(EngineError::MissingCriticalData("open"))?;

        let vix1d = self
            .vix1d
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or(EngineError::MissingCriticalData("vix1d"))?;

        Ok(Quote {
            spot,
            open,
            vix1d,
            vix: finite(self.vix),
            vvix: finite(self.vvix),
            skew: finite(self.skew),
            trin: finite(self.trin).unwrap_or(DEFAULT_TRIN),
        })
    }
}

#[inline]
fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Validated market inputs. Critical fields are guaranteed present and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Quote {
    pub spot: f64,
    pub open: f64,
    pub vix1d: f64,
    pub vix: Option<f64>,
    pub vvix: Option<f64>,
    pub skew: Option<f64>,
    pub trin: f64,
}

impl Quote {
    /// Signed session move as a fraction of the open.
    #[inline]
    pub fn move_from_open(&self) -> f64 {
        (self.spot - self.open) / self.open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AccountContext {
    pub balance: f64,
}

impl AccountContext {
    pub fn new(balance: f64) -> EngineResult<Self> {
        if !balance.is_finite() || balance <= 0.0 {
            return Err(EngineError::InvalidBalance(balance));
        }
        Ok(Self { balance })
    }
}

// ── Analysis output ──

/// A decision plus everything the presentation layer needs to render it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Analysis {
    pub id: String,
    pub timestamp: String,
    pub snapshot: MarketSnapshot,
    pub price_change_pct: f64,
    pub risk: RiskAssessment,
    pub decision: StrategyDecision,
    pub legs: SmallVec<[OptionLeg; 4]>,
}

impl Analysis {
    /// Run the decider and package the result for display.
    /// Shared by the engine loop and the request/response endpoint.
    pub fn compute(
        decider: &StrategyDecider,
        snapshot: MarketSnapshot,
        account: &AccountContext,
    ) -> EngineResult<Self> {
        let (risk, decision) = decider.analyze(&snapshot, account)?;
        let price_change_pct = snapshot.validate()?.move_from_open() * 100.0;
        let legs = legs::legs_for(&decision);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            snapshot,
            price_change_pct,
            risk,
            decision,
            legs,
        })
    }
}

// ── Messages INTO the engine (bounded channels) ──

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Snapshot(Box<MarketSnapshot>),
}

// ── Messages OUT of the engine ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "analysis")]
    Analysis(Box<Analysis>),

    #[serde(rename = "no_recommendation")]
    NoRecommendation { reason: String, timestamp: String },

    #[serde(rename = "engine_state")]
    EngineStateMsg { state: String, reason: String },
}

// ── Engine snapshot for dashboard (sent via watch channel) ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSnapshot {
    pub engine_state: EngineState,
    pub updated_at: String,
    pub last_analysis: Option<Analysis>,
    pub last_error: Option<String>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            engine_state: EngineState::Connecting,
            updated_at: String::new(),
            last_analysis: None,
            last_error: None,
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub snapshots_received: AtomicU64,
    pub decisions_made: AtomicU64,
    pub rejections: AtomicU64,
    pub feed_errors: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            snapshots_received: AtomicU64::new(0),
            decisions_made: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            feed_errors: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,
    pub account: AccountContext,

    // Pure and immutable: shared by the engine and request handlers
    pub decider: StrategyDecider,

    // Engine -> Dashboard: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<EngineSnapshot>,
    pub snapshot_rx: watch::Receiver<EngineSnapshot>,

    // Engine -> Dashboard: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Feed -> Engine: bounded event channel
    pub engine_tx: mpsc::Sender<EngineEvent>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        account: AccountContext,
        engine_tx: mpsc::Sender<EngineEvent>,
    ) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot::default());
        let decider = StrategyDecider::new(config.policy);

        Arc::new(Self {
            config,
            account,
            decider,
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            engine_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> MarketSnapshot {
        MarketSnapshot {
            spot: Some(450.0),
            open: Some(445.0),
            vix1d: Some(20.0),
            vix: Some(15.0),
            vvix: Some(120.0),
            skew: Some(150.0),
            trin: Some(0.8),
            captured_at: None,
        }
    }

    #[test]
    fn test_validate_complete() {
        let q = full().validate().unwrap();
        assert_eq!(q.spot, 450.0);
        assert_eq!(q.trin, 0.8);
        assert_eq!(q.vix, Some(15.0));
    }

    #[test]
    fn test_trin_defaults() {
        let mut snap = full();
        snap.trin = None;
        assert_eq!(snap.validate().unwrap().trin, DEFAULT_TRIN);

        snap.trin = Some(f64::NAN);
        assert_eq!(snap.validate().unwrap().trin, DEFAULT_TRIN);
    }

    #[test]
    fn test_secondary_gaps_are_not_errors() {
        let mut snap = full();
        snap.vix = None;
        snap.vvix = Some(f64::INFINITY);
        snap.skew = None;
        let q = snap.validate().unwrap();
        assert!(q.vix.is_none() && q.vvix.is_none() && q.skew.is_none());
    }

    #[test]
    fn test_critical_gaps_fail() {
        let cases: [(fn(&mut MarketSnapshot), &str); 5] = [
            (|s: &mut MarketSnapshot| s.spot = None, "spot"),
            (|s: &mut MarketSnapshot| s.spot = Some(f64::NAN), "spot"),
            (|s: &mut MarketSnapshot| s.open = Some(0.0), "open"),
            (|s: &mut MarketSnapshot| s.vix1d = None, "vix1d"),
            (|s: &mut MarketSnapshot| s.vix1d = Some(-1.0), "vix1d"),
        ];
        for (mutate, field) in cases {
            let mut snap = full();
            mutate(&mut snap);
            match snap.validate() {
                Err(EngineError::MissingCriticalData(f)) => assert_eq!(f, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_account_balance() {
        assert!(AccountContext::new(28_630.0).is_ok());
        assert!(matches!(AccountContext::new(0.0), Err(EngineError::InvalidBalance(_))));
        assert!(matches!(AccountContext::new(f64::NAN), Err(EngineError::InvalidBalance(_))));
    }

    #[test]
    fn test_analysis_packages_decision() {
        let decider = StrategyDecider::default();
        let account = AccountContext::new(28_630.0).unwrap();
        let analysis = Analysis::compute(&decider, full(), &account).unwrap();

        assert!((analysis.price_change_pct - 1.1236).abs() < 1e-3, "{}", analysis.price_change_pct);
        assert_eq!(analysis.risk.score, 100);
        // Bullish debit: buy 452 call / sell 454 call
        assert_eq!(analysis.legs.len(), 2);
        assert_eq!(analysis.legs[0].strike, 452.0);
        assert_eq!(analysis.legs[1].strike, 454.0);
        assert!(!analysis.id.is_empty());
    }

    #[test]
    fn test_analysis_rejects_missing_spot() {
        let decider = StrategyDecider::default();
        let account = AccountContext::new(28_630.0).unwrap();
        let mut snap = full();
        snap.spot = None;
        assert!(matches!(
            Analysis::compute(&decider, snap, &account),
            Err(EngineError::MissingCriticalData("spot"))
        ));
    }

    #[test]
    fn test_snapshot_deserializes_with_gaps() {
        let snap: MarketSnapshot =
            serde_json::from_str(r#"{"spot": 450.0, "open": 450.0, "vix1d": 12.0}"#).unwrap();
        assert_eq!(snap.trin, None);
        assert_eq!(snap.validate().unwrap().trin, 1.0);
    }
}
