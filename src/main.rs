use clap::Parser;
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use sql_replay::cli;
use sql_replay::config::Targets;
use sql_replay::database::PgConnector;
use sql_replay::monitoring::{LogWriter, ReplayReport};
use sql_replay::replay::{Dispatcher, ReplayContext};
use sql_replay::trace::TraceReader;

macro_rules! fatal {
    ($err:expr, $msg:literal) => {{
        error!(fatal = true, error = %$err, $msg);
        process::exit(1);
    }};
    ($err:expr, $msg:literal, $($key:tt = $val:expr),+) => {{
        error!(fatal = true, error = %$err, $($key = %$val),+, $msg);
        process::exit(1);
    }};
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_line_number(false)
        .init();

    let cli_args = cli::CliArguments::parse();

    let targets = Targets::load(&cli_args.config, cli_args.single)
        .unwrap_or_else(|e| fatal!(e, "Failed to load target configuration", path = cli_args.config.display()));
    let comparison = targets.is_comparison();

    info!(
        file = %cli_args.file.display(),
        primary = %targets.primary.addr,
        secondary = ?targets.secondary.as_ref().map(|t| t.addr.as_str()),
        "Starting replay"
    );

    let mut reader = TraceReader::open(&cli_args.file)
        .await
        .unwrap_or_else(|e| fatal!(e, "Failed to open trace file", path = cli_args.file.display()));

    let mut ctx = ReplayContext::new(Arc::new(PgConnector), targets, cli_args.replay_options());
    let stats = Arc::clone(&ctx.stats);

    let log_writer = match &cli_args.log_db {
        Some(path) => {
            let (log_tx, log_rx) = mpsc::channel(10000);
            let writer = LogWriter::open(path, log_rx)
                .await
                .unwrap_or_else(|e| fatal!(e, "Failed to initialize replay log", path = path.display()));
            ctx = ctx.with_log(log_tx);
            Some(tokio::spawn(writer.run()))
        }
        None => None,
    };

    let summary = Dispatcher::new(ctx)
        .run(&mut reader, shutdown_signal())
        .await
        .unwrap_or_else(|e| fatal!(e, "Replay aborted"));

    // Every sender is gone once the dispatcher returns.
    if let Some(writer) = log_writer {
        if let Err(e) = writer.await {
            error!(error = %e, "Replay log writer failed");
        }
    }

    let report = ReplayReport::new(stats.summary(), summary, comparison);
    if cli_args.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fatal!(e, "Failed to render report"),
        }
    } else {
        print!("{}", report);
    }
}
