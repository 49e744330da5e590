mod config;
mod errors;
mod feeds;
mod models;
mod risk;
mod server;
mod state;
mod strategy;

use crate::state::*;
use crate::strategy::legs;
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("0dte maestro starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let account = match AccountContext::new(cfg.account_balance) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("account error: {e}");
            std::process::exit(1);
        }
    };

    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(64);
    let app_state = AppState::new(cfg.clone(), account, engine_tx);

    tracing::info!(
        balance = account.balance,
        policy = ?app_state.decider.policy(),
        "strategy engine configured"
    );

    // ── Spawn tasks ──

    // 1. Market data feed
    let feed_state = app_state.clone();
    tokio::spawn(async move {
        feeds::yahoo::run_market_feed(feed_state).await;
    });

    // 2. Engine task
    let engine_state = app_state.clone();
    tokio::spawn(async move {
        run_engine(engine_state, engine_rx).await;
    });

    // 3. Axum HTTP + WS server
    let app = server::router(app_state.clone());

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

/// Core engine loop. Receives snapshots, runs the decider, publishes results.
/// The decision itself is pure; only publishing touches channels.
async fn run_engine(state: Arc<AppState>, mut rx: mpsc::Receiver<EngineEvent>) {
    tracing::info!("engine task started");

    let mut engine_state = EngineState::Connecting;

    while let Some(event) = rx.recv().await {
        if let Err(e) = process_event(event, &mut engine_state, &state) {
            state.counters.rejections.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "cannot recommend a strategy");
        }
    }

    tracing::info!("engine task shutting down");
}

fn process_event(
    event: EngineEvent,
    engine_state: &mut EngineState,
    state: &Arc<AppState>,
) -> Result<(), errors::EngineError> {
    match event {
        EngineEvent::Snapshot(snapshot) => {
            state.counters.snapshots_received.fetch_add(1, Ordering::Relaxed);
            let now = chrono::Utc::now().to_rfc3339();

            match Analysis::compute(&state.decider, *snapshot, &state.account) {
                Ok(analysis) => {
                    state.counters.decisions_made.fetch_add(1, Ordering::Relaxed);

                    let d = &analysis.decision;
                    tracing::info!(
                        score = analysis.risk.score,
                        bias = %d.bias,
                        kind = %d.kind,
                        long = ?d.long_strike,
                        short = ?d.short_strike,
                        put_short = ?d.put_short_strike,
                        contracts = d.contracts,
                        target_profit = d.target_profit,
                        "{}",
                        legs::ticket(d, &analysis.legs)
                    );

                    transition(engine_state, EngineState::Live, "analysis published", state);
                    state.broadcast(WsMessage::Analysis(Box::new(analysis.clone())));

                    let _ = state.snapshot_tx.send(EngineSnapshot {
                        engine_state: *engine_state,
                        updated_at: now,
                        last_analysis: Some(analysis),
                        last_error: None,
                    });
                }
                Err(e) if e.is_rejection() => {
                    // Never leave a stale recommendation standing
                    transition(engine_state, EngineState::Degraded, &e.to_string(), state);
                    state.broadcast(WsMessage::NoRecommendation {
                        reason: e.to_string(),
                        timestamp: now.clone(),
                    });
                    let _ = state.snapshot_tx.send(EngineSnapshot {
                        engine_state: *engine_state,
                        updated_at: now,
                        last_analysis: None,
                        last_error: Some(e.to_string()),
                    });
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

fn transition(current: &mut EngineState, next: EngineState, reason: &str, state: &Arc<AppState>) {
    if *current == next {
        return;
    }
    tracing::info!(from = %current, to = %next, reason, "engine state change");
    *current = next;
    state.broadcast(WsMessage::EngineStateMsg {
        state: next.to_string(),
        reason: reason.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> (Arc<AppState>, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let account = AccountContext::new(28_630.0).unwrap();
        (AppState::new(config::AppConfig::for_tests(), account, tx), rx)
    }

    fn calm() -> MarketSnapshot {
        MarketSnapshot {
            spot: Some(450.0),
            open: Some(450.0),
            vix1d: Some(12.0),
            vix: Some(15.0),
            vvix: Some(90.0),
            skew: Some(120.0),
            trin: Some(1.0),
            captured_at: None,
        }
    }

    #[test]
    fn test_snapshot_goes_live() {
        let (state, _rx) = test_state();
        let mut ws_rx = state.ws_tx.subscribe();
        let mut engine_state = EngineState::Connecting;

        process_event(EngineEvent::Snapshot(Box::new(calm())), &mut engine_state, &state).unwrap();

        assert_eq!(engine_state, EngineState::Live);
        let snap = state.snapshot_rx.borrow().clone();
        let analysis = snap.last_analysis.expect("analysis should be published");
        assert_eq!(analysis.decision.kind, strategy::decider::StrategyKind::IronCondor);
        assert_eq!(analysis.legs.len(), 4);

        assert!(matches!(ws_rx.try_recv(), Ok(WsMessage::EngineStateMsg { .. })));
        assert!(matches!(ws_rx.try_recv(), Ok(WsMessage::Analysis(_))));
    }

    #[test]
    fn test_missing_data_degrades_and_clears() {
        let (state, _rx) = test_state();
        let mut engine_state = EngineState::Connecting;

        process_event(EngineEvent::Snapshot(Box::new(calm())), &mut engine_state, &state).unwrap();

        let mut broken = calm();
        broken.vix1d = None;
        let res = process_event(EngineEvent::Snapshot(Box::new(broken)), &mut engine_state, &state);

        assert!(matches!(res, Err(errors::EngineError::MissingCriticalData("vix1d"))));
        assert_eq!(engine_state, EngineState::Degraded);
        let snap = state.snapshot_rx.borrow().clone();
        assert!(snap.last_analysis.is_none(), "stale analysis must be cleared");
        assert!(snap.last_error.unwrap_or_default().contains("vix1d"));
    }
}
