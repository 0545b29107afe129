use chrono::{FixedOffset, NaiveDate, Utc};

pub fn now_ts() -> f64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs_f64()
}

/// Calendar date "now" in a fixed UTC offset (exchange local time).
pub fn trading_date(utc_offset_hours: i32) -> NaiveDate {
    let now = Utc::now();
    match FixedOffset::east_opt(utc_offset_hours * 3600) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

/// Date of a unix timestamp shifted by `gmtoffset_secs`.
pub fn date_at_offset(unix_secs: i64, gmtoffset_secs: i32) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(gmtoffset_secs)?;
    let dt = chrono::DateTime::from_timestamp(unix_secs, 0)?;
    Some(dt.with_timezone(&offset).date_naive())
}

pub fn round_dp(x: f64, dp: u32) -> f64 {
    let m = 10f64.powi(dp as i32);
    (x * m).round() / m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_at_offset_crosses_midnight() {
        // 2024-03-04T17:00:00Z is already 2024-03-05 in UTC+8.
        let ts = 1_709_571_600;
        assert_eq!(
            date_at_offset(ts, 8 * 3600),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(date_at_offset(ts, 0), NaiveDate::from_ymd_opt(2024, 3, 4));
    }

    #[test]
    fn round_dp_rounds_to_places() {
        assert_eq!(round_dp(10.456, 2), 10.46);
        assert_eq!(round_dp(12.36, 1), 12.4);
    }
}
