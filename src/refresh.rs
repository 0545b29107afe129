use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use crate::{
    config::Settings,
    dashboard::ReportState,
    history::{self, HistorySource, ResolutionStrategy, YahooClient},
    ranking,
    report::{RefreshSummary, Report},
    snapshot::{self, FinMindClient, SnapshotSource},
    trend,
    utils::{now_ts, trading_date},
    watchlist::Watchlist,
};

/// Everything one refresh needs besides its data sources.
#[derive(Debug, Clone)]
pub struct RefreshParams {
    pub top_k: usize,
    pub ma_period: usize,
    pub history_range: String,
    pub strategies: Vec<ResolutionStrategy>,
    /// Used when no snapshot row carries its own trading date.
    pub today: NaiveDate,
}

impl RefreshParams {
    pub fn from_settings(settings: &Settings, today: NaiveDate) -> Self {
        Self {
            top_k: settings.top_k,
            ma_period: settings.ma_period,
            history_range: settings.history_range.clone(),
            strategies: ResolutionStrategy::from_suffixes(&settings.history_suffixes),
            today,
        }
    }
}

/// Rank the watchlist by traded value, then reconcile each ranked
/// instrument's moving average, one at a time.
pub async fn run_refresh<S, H>(
    snapshot_source: &S,
    history_source: &H,
    watchlist: &Watchlist,
    params: &RefreshParams,
) -> Result<Report>
where
    S: SnapshotSource + ?Sized,
    H: HistorySource + ?Sized,
{
    let raw = snapshot_source
        .fetch_snapshot()
        .await
        .context("snapshot fetch")?;
    if raw.is_empty() {
        bail!("no data: snapshot is empty");
    }

    let coerced = snapshot::coerce_rows(&raw);
    // The snapshot keeps showing the last session outside trading hours.
    let session_date = coerced.session_date.unwrap_or(params.today);
    log::debug!(
        "refresh.snapshot rows={} kept={} dropped={} volume_column={:?} session_date={}",
        raw.len(),
        coerced.rows.len(),
        coerced.dropped,
        coerced.volume_column,
        session_date
    );

    let ranked = ranking::rank(&coerced.rows, watchlist, params.top_k);
    if ranked.is_empty() {
        bail!(
            "no data: none of {} watchlist instruments found in snapshot ({} usable rows)",
            watchlist.len(),
            coerced.rows.len()
        );
    }

    let mut results = Vec::with_capacity(ranked.len());
    for (i, inst) in ranked.iter().enumerate() {
        let resolved = history::resolve(
            history_source,
            inst.instrument_id(),
            &params.strategies,
            &params.history_range,
        )
        .await;
        if resolved.is_none() {
            log::debug!("refresh.history_missing id={}", inst.instrument_id());
        }
        results.push(trend::reconcile(
            inst,
            resolved.as_ref(),
            session_date,
            params.ma_period,
        ));
        if (i + 1) % 50 == 0 {
            log::info!("refresh.progress done={} total={}", i + 1, ranked.len());
        }
    }

    let mut report = Report {
        generated_ts: now_ts(),
        trading_date: session_date,
        ma_period: params.ma_period,
        summary: RefreshSummary {
            snapshot_rows: raw.len(),
            dropped_rows: coerced.dropped,
            volume_column: coerced.volume_column.map(str::to_string),
            watchlist_size: watchlist.len(),
            ..Default::default()
        },
        results,
    };
    report.count_labels();

    let s = &report.summary;
    log::info!(
        "refresh.done date={} ranked={} above={} below={} insufficient={}",
        report.trading_date,
        s.ranked,
        s.above,
        s.below,
        s.insufficient
    );
    Ok(report)
}

fn build_sources(settings: &Settings) -> Result<(FinMindClient, YahooClient)> {
    let timeout = Duration::from_secs(settings.http_timeout_secs);
    let finmind = FinMindClient::new(
        &settings.finmind_base_url,
        settings.finmind_token.clone(),
        timeout,
    )?;
    let yahoo = YahooClient::new(&settings.yahoo_base_url, timeout)?;
    Ok((finmind, yahoo))
}

async fn refresh_with<S, H>(settings: &Settings, snapshot_source: &S, history_source: &H) -> Result<Report>
where
    S: SnapshotSource + ?Sized,
    H: HistorySource + ?Sized,
{
    let watchlist = Watchlist::load(&settings.watchlist_path)?;
    if watchlist.is_empty() {
        bail!("watchlist {} has no instrument ids", settings.watchlist_path);
    }
    let params = RefreshParams::from_settings(settings, trading_date(settings.market_utc_offset_hours));
    run_refresh(snapshot_source, history_source, &watchlist, &params).await
}

/// One refresh against the live sources.
pub async fn run_once(settings: &Settings) -> Result<Report> {
    let (finmind, yahoo) = build_sources(settings)?;
    refresh_with(settings, &finmind, &yahoo).await
}

/// Refresh every `refresh_secs`, publishing into `state`. Failures are
/// recorded and the loop carries on to the next tick.
pub async fn run_loop(settings: Settings, state: ReportState) -> Result<()> {
    let (finmind, yahoo) = build_sources(&settings)?;

    let mut tick = tokio::time::interval(Duration::from_secs(settings.refresh_secs));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        match refresh_with(&settings, &finmind, &yahoo).await {
            Ok(report) => state.publish(Arc::new(report)),
            Err(e) => {
                log::error!("refresh.failed {:#}", e);
                state.record_error(&format!("{e:#}"));
            }
        }
    }
}
