use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::state::{AppState, EngineEvent, MarketSnapshot};
use futures_util::future::join_all;
use portable_atomic::Ordering;
use reqwest::Client;
use std::sync::Arc;

/// Yahoo Finance chart API poller. Builds one MarketSnapshot per interval
/// from the underlying and the five indices, and sends it to the engine.
///
/// A ticker that fails is left as `None` in the snapshot; whether that is
/// fatal is decided downstream by validation, not here.
pub async fn run_market_feed(state: Arc<AppState>) {
    let config = &state.config;
    tracing::info!(
        underlying = %config.tickers.underlying,
        interval_secs = config.poll_interval_secs,
        "market data feed started"
    );

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
        .build()
        .unwrap_or_default();

    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(config.poll_interval_secs));
    let mut consecutive_errors: u32 = 0;

    loop {
        interval.tick().await;

        match fetch_snapshot(&client, config).await {
            Ok(snapshot) => {
                consecutive_errors = 0;

                if state
                    .engine_tx
                    .send(EngineEvent::Snapshot(Box::new(snapshot)))
                    .await
                    .is_err()
                {
                    tracing::error!("engine channel closed, market feed shutting down");
                    return;
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                state.counters.feed_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    consecutive = consecutive_errors,
                    "market snapshot fetch failed"
                );

                // Exponential backoff on repeated failures (cap at 30s)
                if consecutive_errors > 3 {
                    let backoff = std::cmp::min(consecutive_errors * 2, 30);
                    tokio::time::sleep(tokio::time::Duration::from_secs(backoff as u64)).await;
                }
            }
        }
    }
}

/// Fetch all six series concurrently and assemble a snapshot.
/// Fails only when no ticker returned anything.
pub async fn fetch_snapshot(client: &Client, config: &AppConfig) -> EngineResult<MarketSnapshot> {
    let t = &config.tickers;
    let symbols = [&t.underlying, &t.vix1d, &t.vix, &t.vvix, &t.skew, &t.trin];
    let base_url = config.market_data_base_url.as_str();

    let results = join_all(
        symbols
            .iter()
            .map(|symbol| fetch_series(client, base_url, symbol)),
    )
    .await;

    let mut points: [Option<SeriesPoint>; 6] = [None; 6];
    for (slot, (symbol, result)) in points.iter_mut().zip(symbols.iter().zip(results)) {
        match result {
            Ok(point) => *slot = Some(point),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "ticker fetch failed"),
        }
    }

    if points.iter().all(Option::is_none) {
        return Err(EngineError::MarketData("no ticker returned data".into()));
    }

    let [underlying, vix1d, vix, vvix, skew, trin] = points;
    let close = |p: Option<SeriesPoint>| p.and_then(|p| p.last_close);

    Ok(MarketSnapshot {
        spot: close(underlying),
        open: underlying.and_then(|p| p.first_open),
        vix1d: close(vix1d),
        vix: close(vix),
        vvix: close(vvix),
        skew: close(skew),
        trin: close(trin),
        captured_at: Some(chrono::Utc::now().to_rfc3339()),
    })
}

async fn fetch_series(client: &Client, base_url: &str, symbol: &str) -> EngineResult<SeriesPoint> {
    let url = format!(
        "{}/v8/finance/chart/{}",
        base_url.trim_end_matches('/'),
        symbol.replace('^', "%5E")
    );

    let resp = client
        .get(&url)
        .query(&[("range", "1d"), ("interval", "1m")])
        .send()
        .await
        .map_err(|e| EngineError::MarketData(format!("{symbol}: request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EngineError::MarketData(format!("{symbol}: HTTP {status}: {body}")));
    }

    let body = resp.text().await?;
    parse_chart(&body)
}

// Chart API response format (trimmed):
// {
//   "chart": {
//     "result": [{
//       "meta": { "symbol": "SPY", "regularMarketPrice": 450.12 },
//       "timestamp": [1718890200, 1718890260, ...],
//       "indicators": { "quote": [{ "open": [449.9, null, ...], "close": [450.0, null, ...] }] }
//     }],
//     "error": null
//   }
// }

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: Option<Chart>,
}

#[derive(serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    indicators: Option<Indicators>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(serde::Deserialize)]
struct Indicators {
    quote: Option<Vec<QuoteSeries>>,
}

#[derive(serde::Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// First open and last close of one intraday series, nulls skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub first_open: Option<f64>,
    pub last_close: Option<f64>,
}

fn parse_chart(body: &str) -> EngineResult<SeriesPoint> {
    let resp: ChartResponse = serde_json::from_str(body)?;
    let chart = resp
        .chart
        .ok_or_else(|| EngineError::MarketData("missing chart object".into()))?;

    if let Some(err) = chart.error {
        return Err(EngineError::MarketData(format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| EngineError::MarketData("empty chart result".into()))?;

    let series = result
        .indicators
        .and_then(|i| i.quote)
        .and_then(|q| q.into_iter().next());

    let (first_open, mut last_close) = match series {
        Some(s) => (
            s.open.iter().flatten().copied().find(|v| v.is_finite()),
            s.close.iter().rev().flatten().copied().find(|v| v.is_finite()),
        ),
        None => (None, None),
    };

    // Thin index series sometimes carry only the meta price
    if last_close.is_none() {
        last_close = result
            .meta
            .and_then(|m| m.regular_market_price)
            .filter(|v| v.is_finite());
    }

    Ok(SeriesPoint { first_open, last_close })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_nulls() {
        let body = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":451.0},
            "indicators":{"quote":[{"open":[null,445.2,446.0],"close":[445.5,450.1,null]}]}}],"error":null}}"#;
        let p = parse_chart(body).unwrap();
        assert_eq!(p.first_open, Some(445.2));
        assert_eq!(p.last_close, Some(450.1));
    }

    #[test]
    fn test_parse_meta_fallback() {
        let body = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":0.92},
            "indicators":{"quote":[{}]}}],"error":null}}"#;
        let p = parse_chart(body).unwrap();
        assert_eq!(p.first_open, None);
        assert_eq!(p.last_close, Some(0.92));
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body) {
            Err(EngineError::MarketData(msg)) => assert!(msg.contains("Not Found"), "{msg}"),
            other => panic!("expected market data error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_chart("<html>"), Err(EngineError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_error() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let config = AppConfig::for_tests();
        let res = fetch_snapshot(&client, &config).await;
        assert!(matches!(res, Err(EngineError::MarketData(_))), "{res:?}");
    }
}
