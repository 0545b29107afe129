use serde::{Deserialize, Serialize};

use crate::{snapshot::SnapshotRow, watchlist::Watchlist};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedInstrument {
    #[serde(flatten)]
    pub row: SnapshotRow,
    pub typical_price: f64,
    pub traded_value_million: f64,
}

impl RankedInstrument {
    pub fn from_row(row: SnapshotRow) -> Self {
        let typical_price = typical_price(row.high, row.low, row.close);
        let traded_value_million = traded_value_million(typical_price, row.volume);
        Self {
            row,
            typical_price,
            traded_value_million,
        }
    }

    pub fn instrument_id(&self) -> &str {
        &self.row.instrument_id
    }
}

pub fn typical_price(high: f64, low: f64, close: f64) -> f64 {
    (high + low + close) / 3.0
}

pub fn traded_value_million(typical_price: f64, volume: f64) -> f64 {
    (typical_price * volume) / 1_000_000.0
}

/// Watchlist rows ranked by traded value, highest first, at most `k`.
/// Ties keep snapshot order.
pub fn rank(rows: &[SnapshotRow], watchlist: &Watchlist, k: usize) -> Vec<RankedInstrument> {
    let mut ranked: Vec<RankedInstrument> = rows
        .iter()
        .filter(|r| watchlist.contains(&r.instrument_id))
        .cloned()
        .map(RankedInstrument::from_row)
        .collect();

    // sort_by is stable.
    ranked.sort_by(|a, b| {
        b.traded_value_million
            .partial_cmp(&a.traded_value_million)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, close: f64, high: f64, low: f64, volume: f64) -> SnapshotRow {
        SnapshotRow {
            instrument_id: id.to_string(),
            close,
            high,
            low,
            volume,
            change: None,
        }
    }

    #[test]
    fn traded_value_uses_typical_price() {
        let r = RankedInstrument::from_row(row("A", 10.0, 11.0, 9.0, 1_000_000.0));
        assert_eq!(r.typical_price, 10.0);
        assert_eq!(r.traded_value_million, 10.0);
    }

    #[test]
    fn traded_value_matches_formula_exactly() {
        let (c, h, l, v) = (123.5, 127.0, 120.25, 3_456_789.0);
        let r = RankedInstrument::from_row(row("X", c, h, l, v));
        assert_eq!(r.traded_value_million, ((h + l + c) / 3.0 * v) / 1e6);
    }

    #[test]
    fn filters_to_watchlist_and_sorts_descending() {
        let rows = vec![
            row("A", 10.0, 10.0, 10.0, 100.0),
            row("B", 10.0, 10.0, 10.0, 300.0),
            row("C", 10.0, 10.0, 10.0, 200.0),
            row("Z", 10.0, 10.0, 10.0, 9_999.0),
        ];
        let wl = Watchlist::parse("A,B,C");
        let ranked = rank(&rows, &wl, 300);
        let ids: Vec<_> = ranked.iter().map(|r| r.instrument_id()).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[test]
    fn truncates_to_k_and_keeps_order_invariant() {
        let rows: Vec<_> = (0..50)
            .map(|i| row(&format!("S{i}"), 10.0 + i as f64, 11.0 + i as f64, 9.0, (i * 37 % 11) as f64))
            .collect();
        let wl = Watchlist::from_ids(rows.iter().map(|r| r.instrument_id.clone()));
        let ranked = rank(&rows, &wl, 7);
        assert_eq!(ranked.len(), 7);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].traded_value_million >= w[1].traded_value_million));
    }

    #[test]
    fn ties_keep_input_order() {
        let rows = vec![
            row("first", 10.0, 10.0, 10.0, 100.0),
            row("second", 10.0, 10.0, 10.0, 100.0),
            row("third", 10.0, 10.0, 10.0, 100.0),
        ];
        let wl = Watchlist::parse("third,second,first");
        let ranked = rank(&rows, &wl, 2);
        let ids: Vec<_> = ranked.iter().map(|r| r.instrument_id()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn no_watchlist_match_is_empty() {
        let rows = vec![row("A", 10.0, 10.0, 10.0, 100.0)];
        assert!(rank(&rows, &Watchlist::parse("B"), 300).is_empty());
        assert!(rank(&[], &Watchlist::parse("A"), 300).is_empty());
    }
}
