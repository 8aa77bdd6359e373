//! Sends the scheduled health report when it is due.
//!
//! Run once from cron, or keep it running with `--loop`.

use chrono::Local;
use clap::Parser;
use health_tracker::{
    report::{run_due_reports, OutboxMailer},
    storage, Config,
};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(about = "Send scheduled health reports that are due")]
struct Args {
    /// Report what would be sent without delivering anything
    #[arg(long)]
    dry_run: bool,

    /// Keep checking for due reports instead of exiting after one pass
    #[arg(long = "loop")]
    run_loop: bool,

    /// Seconds between checks in loop mode
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(30..))]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let db = storage::connect(&config.database_url).await?;
    let mailer = OutboxMailer::new(config.outbox_dir.clone());

    if !args.run_loop {
        let summary =
            run_due_reports(&db, &mailer, &config.from_email, Local::now().naive_local(), args.dry_run)
                .await?;
        info!(
            sent = summary.sent,
            skipped = summary.skipped,
            pending = summary.pending,
            "report run finished"
        );
        return Ok(());
    }

    info!(
        interval_secs = args.interval,
        outbox = %mailer.dir().display(),
        "checking for due reports"
    );
    let interval = Duration::from_secs(args.interval);
    loop {
        match run_due_reports(&db, &mailer, &config.from_email, Local::now().naive_local(), args.dry_run)
            .await
        {
            Ok(summary) if summary.sent > 0 || summary.pending > 0 => info!(
                sent = summary.sent,
                pending = summary.pending,
                "report run finished"
            ),
            Ok(_) => {}
            Err(err) => error!("report run failed: {err}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("stopping report loop");
                return Ok(());
            }
        }
    }
}
