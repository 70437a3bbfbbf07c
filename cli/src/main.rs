use std::env;
use std::fs::OpenOptions;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use dsearch_core::EntryManager;
use dsearch_core::FzfConfig;
use dsearch_core::Loader;
use dsearch_core::load_applications;
use dsearch_core::load_files;
use dsearch_core::refresh_channel;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Terminal launcher: fuzzy-search installed applications and home files,
/// hit Enter to run the selection.
#[derive(Debug, Parser)]
#[command(name = "dsearch", version, about)]
struct Cli {
    /// Log debug output to ~/.dsearch.log (same as setting DEBUG).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.debug)?;
    info!("dsearch starting");

    let (refresh_tx, refresh_rx) = refresh_channel();
    let manager = EntryManager::new(
        refresh_tx,
        FzfConfig {
            exact: true,
            ignore_case: true,
            algo: 0,
        },
    );
    let loaders: Vec<Loader> = vec![
        Box::new(|sink| load_applications(sink)),
        Box::new(|sink| load_files(sink)),
    ];

    dsearch_tui::run(manager, refresh_rx, loaders)
        .await
        .context("terminal ui failed")
}

/// Installs a file subscriber when debugging is requested; otherwise no
/// subscriber is installed and every event is discarded.
fn init_logging(debug_flag: bool) -> Result<Option<WorkerGuard>> {
    let debug_env = env::var_os("DEBUG").is_some_and(|value| !value.is_empty());
    if !debug_flag && !debug_env {
        return Ok(None);
    }

    let home = dirs::home_dir().context("cannot locate home directory")?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(home.join(".dsearch.log"))
        .context("cannot open ~/.dsearch.log")?;
    let (writer, guard) = tracing_appender::non_blocking(log_file);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(EnvFilter::new("debug"))
        .init();
    Ok(Some(guard))
}
