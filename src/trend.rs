use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{history::Resolved, ranking::RankedInstrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Above,
    Below,
    Insufficient,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Above => "above",
            TrendLabel::Below => "below",
            TrendLabel::Insufficient => "insufficient",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub instrument_id: String,
    pub current_price: f64,
    pub change: Option<f64>,
    pub moving_average: Option<f64>,
    pub trend_label: TrendLabel,
    pub traded_value_million: f64,
    pub history_symbol: Option<String>,
}

/// Closing prices feeding the average, oldest first, at most `period` long.
///
/// When the newest historical bar is already dated on (or after) `today`,
/// the history alone is used. Otherwise the live price stands in for
/// today's close and is appended before taking the tail.
pub fn build_window(
    series: &[crate::history::DailyClose],
    current_price: f64,
    today: NaiveDate,
    period: usize,
) -> Vec<f64> {
    let Some(last) = series.last() else {
        return Vec::new();
    };

    let mut closes: Vec<f64> = series.iter().map(|d| d.close).collect();
    if last.date < today {
        closes.push(current_price);
    }
    let start = closes.len().saturating_sub(period);
    closes.split_off(start)
}

/// Average and label for a window. Short windows are `Insufficient`.
pub fn evaluate(window: &[f64], current_price: f64, period: usize) -> (Option<f64>, TrendLabel) {
    if period == 0 || window.len() < period {
        return (None, TrendLabel::Insufficient);
    }
    let tail = &window[window.len() - period..];
    let ma = tail.iter().sum::<f64>() / period as f64;
    let label = if current_price >= ma {
        TrendLabel::Above
    } else {
        TrendLabel::Below
    };
    (Some(ma), label)
}

pub fn reconcile(
    ranked: &RankedInstrument,
    history: Option<&Resolved>,
    today: NaiveDate,
    period: usize,
) -> AnalysisResult {
    let current_price = ranked.row.close;
    let (moving_average, trend_label) = match history {
        Some(h) if !h.series.is_empty() => {
            let window = build_window(&h.series, current_price, today, period);
            evaluate(&window, current_price, period)
        }
        _ => (None, TrendLabel::Insufficient),
    };

    AnalysisResult {
        instrument_id: ranked.row.instrument_id.clone(),
        current_price,
        change: ranked.row.change,
        moving_average,
        trend_label,
        traded_value_million: ranked.traded_value_million,
        history_symbol: history.map(|h| h.symbol.clone()),
    }
}
