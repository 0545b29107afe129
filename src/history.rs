use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::date_at_offset;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Past daily closes for one instrument, oldest first.
pub type HistoricalSeries = Vec<DailyClose>;

/// Daily close history keyed by venue symbol (e.g. `2330.TW`).
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_closes(&self, symbol: &str, range: &str) -> Result<HistoricalSeries>;
}

/// One way to turn an instrument id into a history-source symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionStrategy {
    pub suffix: String,
}

impl ResolutionStrategy {
    pub fn suffix(s: impl Into<String>) -> Self {
        Self { suffix: s.into() }
    }

    pub fn symbol_for(&self, instrument_id: &str) -> String {
        format!("{instrument_id}{}", self.suffix)
    }

    pub fn from_suffixes(suffixes: &[String]) -> Vec<Self> {
        suffixes.iter().map(|s| Self::suffix(s.clone())).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub symbol: String,
    pub series: HistoricalSeries,
}

/// Try each strategy once, in order. First non-empty series wins; errors
/// and empty series fall through to the next strategy.
pub async fn resolve<H: HistorySource + ?Sized>(
    source: &H,
    instrument_id: &str,
    strategies: &[ResolutionStrategy],
    range: &str,
) -> Option<Resolved> {
    for strategy in strategies {
        let symbol = strategy.symbol_for(instrument_id);
        match source.fetch_closes(&symbol, range).await {
            Ok(series) if !series.is_empty() => return Some(Resolved { symbol, series }),
            Ok(_) => log::debug!("history.empty symbol={symbol}"),
            Err(e) => log::debug!("history.fetch_failed symbol={symbol} err={e:#}"),
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn series_from_chart(env: ChartEnvelope) -> Result<HistoricalSeries> {
    if let Some(err) = env.chart.error {
        return Err(anyhow!(
            "chart error {}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        ));
    }
    let Some(result) = env.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut out: HistoricalSeries = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = date_at_offset(*ts, result.meta.gmtoffset)?;
            Some(DailyClose { date, close })
        })
        .collect();
    out.sort_by_key(|d| d.date);
    // Intraday refreshes can surface the session twice; keep the latest.
    out.dedup_by(|later, earlier| {
        if later.date == earlier.date {
            earlier.close = later.close;
            true
        } else {
            false
        }
    });
    Ok(out)
}

/// Yahoo Finance v8 chart client (daily bars).
pub struct YahooClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ma5board/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build yahoo http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HistorySource for YahooClient {
    async fn fetch_closes(&self, symbol: &str, range: &str) -> Result<HistoricalSeries> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let resp = self
            .http
            .get(&url)
            .query(&[("range", range), ("interval", "1d")])
            .send()
            .await
            .with_context(|| format!("yahoo.chart request {symbol}"))?;

        let status = resp.status();
        let env: ChartEnvelope = resp
            .json()
            .await
            .with_context(|| format!("yahoo.chart decode {symbol} http {status}"))?;
        series_from_chart(env).with_context(|| format!("yahoo.chart {symbol}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[derive(Default)]
    struct FakeHistory {
        by_symbol: HashMap<String, Result<HistoricalSeries, String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HistorySource for FakeHistory {
        async fn fetch_closes(&self, symbol: &str, _range: &str) -> Result<HistoricalSeries> {
            self.calls.lock().push(symbol.to_string());
            match self.by_symbol.get(symbol) {
                Some(Ok(s)) => Ok(s.clone()),
                Some(Err(e)) => Err(anyhow!(e.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn strategies() -> Vec<ResolutionStrategy> {
        ResolutionStrategy::from_suffixes(&[".TW".into(), ".TWO".into()])
    }

    #[tokio::test]
    async fn first_non_empty_strategy_wins() {
        let mut fake = FakeHistory::default();
        let s = vec![DailyClose { date: d(2024, 3, 4), close: 10.0 }];
        fake.by_symbol.insert("6488.TWO".into(), Ok(s.clone()));

        let got = resolve(&fake, "6488", &strategies(), "1mo").await.unwrap();
        assert_eq!(got.symbol, "6488.TWO");
        assert_eq!(got.series, s);
        assert_eq!(*fake.calls.lock(), vec!["6488.TW", "6488.TWO"]);
    }

    #[tokio::test]
    async fn stops_after_first_success() {
        let mut fake = FakeHistory::default();
        let tw = vec![DailyClose { date: d(2024, 3, 4), close: 600.0 }];
        let two = vec![DailyClose { date: d(2024, 3, 4), close: 1.0 }];
        fake.by_symbol.insert("2330.TW".into(), Ok(tw.clone()));
        fake.by_symbol.insert("2330.TWO".into(), Ok(two));

        let got = resolve(&fake, "2330", &strategies(), "1mo").await.unwrap();
        assert_eq!(got.series, tw);
        assert_eq!(fake.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn errors_fall_through_and_all_failing_is_none() {
        let mut fake = FakeHistory::default();
        fake.by_symbol.insert("9999.TW".into(), Err("boom".into()));
        assert!(resolve(&fake, "9999", &strategies(), "1mo").await.is_none());
        assert_eq!(fake.calls.lock().len(), 2);
    }

    #[test]
    fn chart_drops_null_closes_and_dates_in_exchange_time() {
        // 2024-03-04T01:30:00Z and 2024-03-05T01:30:00Z, plus a null bar.
        let env: ChartEnvelope = serde_json::from_value(json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 28800},
                    "timestamp": [1709515800, 1709602200, 1709688600],
                    "indicators": {"quote": [{"close": [10.5, null, 11.25]}]}
                }],
                "error": null
            }
        }))
        .unwrap();
        let series = series_from_chart(env).unwrap();
        assert_eq!(
            series,
            vec![
                DailyClose { date: d(2024, 3, 4), close: 10.5 },
                DailyClose { date: d(2024, 3, 6), close: 11.25 },
            ]
        );
    }

    #[test]
    fn chart_duplicate_day_keeps_latest_close() {
        let env: ChartEnvelope = serde_json::from_value(json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 28800},
                    "timestamp": [1709515800, 1709530000],
                    "indicators": {"quote": [{"close": [10.0, 10.4]}]}
                }]
            }
        }))
        .unwrap();
        let series = series_from_chart(env).unwrap();
        assert_eq!(series, vec![DailyClose { date: d(2024, 3, 4), close: 10.4 }]);
    }

    #[test]
    fn chart_error_is_reported() {
        let env: ChartEnvelope = serde_json::from_value(json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
        }))
        .unwrap();
        let err = series_from_chart(env).unwrap_err().to_string();
        assert!(err.contains("Not Found"), "{err}");
    }
}
