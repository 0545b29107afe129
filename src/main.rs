mod config;
mod dashboard;
mod history;
mod ranking;
mod refresh;
mod report;
mod snapshot;
mod trend;
mod utils;
mod watchlist;

use anyhow::Result;
use clap::Parser;

use crate::{config::Settings, dashboard::ReportState};

#[derive(Debug, Parser)]
#[command(name = "ma5board", version)]
struct Cli {
    /// Override RUN_MODE (once|serve)
    #[arg(long)]
    mode: Option<String>,

    /// Override WATCHLIST_PATH
    #[arg(long)]
    watchlist: Option<String>,

    /// Override TOP_K
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the report as JSON instead of a table (once mode)
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(m) = cli.mode {
        settings.run_mode = m.to_lowercase();
    }
    if let Some(p) = cli.watchlist {
        settings.watchlist_path = p;
    }
    if let Some(k) = cli.top_k {
        settings.top_k = k;
    }
    settings.validate()?;

    log::info!(
        "app.start run_mode={} watchlist={} top_k={} ma_period={} token={}",
        settings.run_mode,
        settings.watchlist_path,
        settings.top_k,
        settings.ma_period,
        if settings.finmind_token.is_some() { "set" } else { "unset" }
    );

    if settings.run_mode == "serve" {
        let state = ReportState::new();
        {
            let st = settings.clone();
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = dashboard::serve_reports(st, state).await {
                    log::error!("server.error {:#}", e);
                }
            });
        }
        return refresh::run_loop(settings, state).await;
    }

    let report = refresh::run_once(&settings).await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_table());
    }
    Ok(())
}
