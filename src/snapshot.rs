use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Volume column names in preference order.
pub const VOLUME_COLUMNS: [&str; 2] = ["total_volume", "volume"];

pub type RawRow = Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub instrument_id: String,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CoercedSnapshot {
    pub rows: Vec<SnapshotRow>,
    pub dropped: usize,
    pub volume_column: Option<&'static str>,
    /// Newest trading date stamped on any row.
    pub session_date: Option<NaiveDate>,
}

/// Real-time cross-section of every tradable instrument.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Vec<RawRow>>;
}

/// First volume column present in any row.
pub fn detect_volume_column(rows: &[RawRow]) -> Option<&'static str> {
    VOLUME_COLUMNS
        .into_iter()
        .find(|col| rows.iter().any(|r| r.contains_key(*col)))
}

fn coerce_f64(v: Option<&JsonValue>) -> Option<f64> {
    let x = match v? {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn coerce_id(v: Option<&JsonValue>) -> Option<String> {
    let id = match v? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Leading `YYYY-MM-DD` of a date or datetime field.
fn coerce_date(v: Option<&JsonValue>) -> Option<NaiveDate> {
    let s = v?.as_str()?.trim();
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn parse_row(r: &RawRow, vol_key: &str) -> Option<SnapshotRow> {
    Some(SnapshotRow {
        instrument_id: coerce_id(r.get("stock_id"))?,
        close: coerce_f64(r.get("close"))?,
        high: coerce_f64(r.get("high"))?,
        low: coerce_f64(r.get("low"))?,
        volume: coerce_f64(r.get(vol_key))?,
        change: coerce_f64(r.get("change_price")),
    })
}

/// Turn raw rows into typed rows. Rows whose id, close, high, low or
/// volume cannot be read as numbers are dropped and counted.
pub fn coerce_rows(raw: &[RawRow]) -> CoercedSnapshot {
    let volume_column = detect_volume_column(raw);
    let vol_key = volume_column.unwrap_or("volume");

    let mut out = CoercedSnapshot {
        rows: Vec::with_capacity(raw.len()),
        dropped: 0,
        volume_column,
        session_date: raw.iter().filter_map(|r| coerce_date(r.get("date"))).max(),
    };

    for r in raw {
        match parse_row(r, vol_key) {
            Some(row) => out.rows.push(row),
            None => out.dropped += 1,
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct FinMindResponse {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    data: Vec<RawRow>,
}

/// FinMind v4 tick snapshot client.
pub struct FinMindClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FinMindClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build finmind http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/v4/taiwan_stock_tick_snapshot", self.base_url)
    }
}

#[async_trait]
impl SnapshotSource for FinMindClient {
    async fn fetch_snapshot(&self) -> Result<Vec<RawRow>> {
        let mut req = self.http.get(self.url());
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.context("finmind.snapshot request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("finmind.snapshot http {status}: {}", body.trim()));
        }

        let body: FinMindResponse = resp.json().await.context("finmind.snapshot decode")?;
        if let Some(code) = body.status {
            if code != 200 {
                return Err(anyhow!(
                    "finmind.snapshot status {code}: {}",
                    body.msg.unwrap_or_default()
                ));
            }
        }
        Ok(body.data)
    }
}
