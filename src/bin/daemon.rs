use std::path::Path;

use chrono::Local;
use clap::Parser;
use minilide_monitor::{
    config::{Config, read_config_file},
    daemon::Daemon,
    format_temperature, logging,
    storage::{MonthKey, MonthlyStore, summarize},
    util::get_config_path,
};
use tracing::{info, trace, warn};

#[derive(Debug, Clone, Parser)]
#[command(about = "Temperature monitoring daemon for the Minilide device")]
struct Args {
    /// Config file (defaults to $MINILIDE_CONFIG, then config.json)
    #[arg(short)]
    file: Option<String>,

    /// Run one extraction now and exit
    #[arg(long, conflicts_with = "summary")]
    once: bool,

    /// Print the current month's per-sensor summary and exit
    #[arg(long)]
    summary: bool,
}

fn load_config(file: Option<String>) -> anyhow::Result<Config> {
    match file {
        Some(file) => read_config_file(&file),
        None => {
            let path = get_config_path();
            if Path::new(&path).exists() {
                read_config_file(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.file.clone())?;
    logging::init(&config.logging);
    trace!("started with args: {args:?}");

    if config.notifier.is_none() {
        warn!("No notification channel configured, alerts will only be logged.");
    }

    if args.summary {
        print_summary(&config)?;
        return Ok(());
    }

    let mut daemon = Daemon::from_config(&config)?;

    if args.once {
        daemon.run_once().await?;
        return Ok(());
    }

    info!("Starting the monitoring daemon.");
    daemon.run().await;

    Ok(())
}

fn print_summary(config: &Config) -> anyhow::Result<()> {
    let store = MonthlyStore::new(config.storage.data_dir.clone());
    let key = MonthKey::of(&Local::now().naive_local());
    let readings = store.load_month_or_mirror(key)?;

    println!("Temperature summary for {key} ({} readings)", readings.len());
    println!(
        "{:<20} {:>6} {:>9} {:>9} {:>9} {:>9}",
        "sensor", "n", "min", "max", "mean", "last"
    );
    for summary in summarize(&readings) {
        println!(
            "{:<20} {:>6} {:>9} {:>9} {:>9} {:>9}",
            summary.sensor,
            summary.count,
            format_temperature(summary.min),
            format_temperature(summary.max),
            format_temperature(summary.mean),
            format_temperature(summary.last)
        );
    }

    Ok(())
}
