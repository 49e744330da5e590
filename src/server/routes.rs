use crate::models::OptionType;
use crate::state::{AccountContext, Analysis, AppState, EngineSnapshot, MarketSnapshot};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct DecideRequest {
    pub snapshot: MarketSnapshot,
    /// Falls back to the configured account balance
    pub balance: Option<f64>,
}

#[derive(serde::Deserialize)]
pub struct StrikeQuery {
    pub spot: f64,
    pub iv: f64,
    pub delta: f64,
    pub option_type: OptionType,
}

/// GET /api/state -- current engine snapshot (from watch channel, no lock)
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Json<EngineSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// POST /api/decide -- run the decider on a caller-supplied snapshot
pub async fn post_decide(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecideRequest>,
) -> Response {
    let account = match req.balance {
        Some(balance) => match AccountContext::new(balance) {
            Ok(a) => a,
            Err(e) => return unprocessable(e.to_string()),
        },
        None => state.account,
    };

    match Analysis::compute(&state.decider, req.snapshot, &account) {
        Ok(analysis) => Json(analysis).into_response(),
        Err(e) => {
            tracing::info!(error = %e, "ad-hoc decision rejected");
            unprocessable(e.to_string())
        }
    }
}

/// POST /api/assess -- risk score and bias only
pub async fn post_assess(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<MarketSnapshot>,
) -> Response {
    match state.decider.assess(&snapshot) {
        Ok(risk) => Json(risk).into_response(),
        Err(e) => unprocessable(e.to_string()),
    }
}

/// GET /api/strike -- strike-from-delta estimate
pub async fn get_strike(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StrikeQuery>,
) -> Response {
    match state
        .decider
        .estimator()
        .estimate(q.spot, q.iv, q.delta, q.option_type)
    {
        Ok(strike) => Json(serde_json::json!({
            "spot": q.spot,
            "iv": q.iv,
            "delta": q.delta,
            "option_type": q.option_type,
            "strike": strike,
        }))
        .into_response(),
        Err(e) => unprocessable(e.to_string()),
    }
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "snapshots_received": state.counters.snapshots_received.load(Relaxed),
        "decisions_made": state.counters.decisions_made.load(Relaxed),
        "rejections": state.counters.rejections.load(Relaxed),
        "feed_errors": state.counters.feed_errors.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
