use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    trend::{AnalysisResult, TrendLabel},
    utils::round_dp,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub snapshot_rows: usize,
    pub dropped_rows: usize,
    pub volume_column: Option<String>,
    pub watchlist_size: usize,
    pub ranked: usize,
    pub above: usize,
    pub below: usize,
    pub insufficient: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_ts: f64,
    pub trading_date: NaiveDate,
    pub ma_period: usize,
    pub summary: RefreshSummary,
    pub results: Vec<AnalysisResult>,
}

impl Report {
    pub fn count_labels(&mut self) {
        let (mut above, mut below, mut insufficient) = (0, 0, 0);
        for r in &self.results {
            match r.trend_label {
                TrendLabel::Above => above += 1,
                TrendLabel::Below => below += 1,
                TrendLabel::Insufficient => insufficient += 1,
            }
        }
        self.summary.ranked = self.results.len();
        self.summary.above = above;
        self.summary.below = below;
        self.summary.insufficient = insufficient;
    }

    /// Fixed-width text table, one line per instrument in rank order.
    pub fn render_table(&self) -> String {
        let ma_header = format!("MA{}", self.ma_period);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>4} | {:<8} | {:>10} | {:>8} | {:>10} | {:<12} | {:>12}",
            "#", "ID", "PRICE", "CHANGE", ma_header, "TREND", "VALUE(M)"
        );
        let _ = writeln!(out, "{:-<82}", "");

        for (i, r) in self.results.iter().enumerate() {
            let change = r
                .change
                .map(|c| format!("{:+.2}", c))
                .unwrap_or_else(|| "-".to_string());
            let ma = r
                .moving_average
                .map(|m| format!("{:.2}", round_dp(m, 2)))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:>4} | {:<8} | {:>10.2} | {:>8} | {:>10} | {:<12} | {:>12.1}",
                i + 1,
                r.instrument_id,
                r.current_price,
                change,
                ma,
                r.trend_label,
                round_dp(r.traded_value_million, 1)
            );
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "date={} ranked={} above={} below={} insufficient={} snapshot_rows={} dropped={} watchlist={}",
            self.trading_date,
            s.ranked,
            s.above,
            s.below,
            s.insufficient,
            s.snapshot_rows,
            s.dropped_rows,
            s.watchlist_size
        );
        out
    }
}
