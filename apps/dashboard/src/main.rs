use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{ControllerConfig, RetryPolicy, RunController, RunEvent};
use shared::domain::WellId;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Headless run dashboard: submits a well selection to the instrument and
/// follows it to completion.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    server_url: String,
    /// Origin declared on every request; must match the instrument's dashboard origin.
    #[arg(long, default_value = "http://localhost:4000")]
    origin: String,
    /// Wells to read, e.g. `A1,A2,B7`.
    #[arg(long, value_delimiter = ',', required = true)]
    wells: Vec<String>,
    #[arg(long, default_value_t = 3000)]
    poll_interval_ms: u64,
    /// Give up after this many resends of an unanswered request.
    #[arg(long)]
    retry_limit: Option<u32>,
    /// Cancel the run after this many seconds.
    #[arg(long)]
    cancel_after: Option<u64>,
    /// Eject the plate once the run has finished.
    #[arg(long)]
    eject: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let selection = args
        .wells
        .iter()
        .map(|name| {
            name.parse::<WellId>()
                .with_context(|| format!("invalid well '{name}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = ControllerConfig {
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        retry: args
            .retry_limit
            .map_or(RetryPolicy::Unbounded, RetryPolicy::Limited),
        ..ControllerConfig::new(args.server_url, args.origin)
    };
    let controller = RunController::new(config);
    let mut events = controller.subscribe_events();
    controller.send_run(selection).await?;

    if let Some(seconds) = args.cancel_after {
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            if let Err(error) = controller.cancel_run().await {
                warn!(%error, "cancel failed");
            }
        });
    }

    loop {
        match events.recv().await {
            Ok(RunEvent::Started {
                selection,
                current_well,
            }) => {
                info!(wells = selection.len(), current = ?current_well, "run started");
            }
            Ok(RunEvent::Progress {
                run_wells,
                pending,
                blank_wells,
                current_well,
            }) => {
                info!(
                    read = run_wells.len(),
                    pending = pending.len(),
                    blank = blank_wells.len(),
                    current = ?current_well,
                    "progress"
                );
            }
            Ok(RunEvent::Results { results }) => {
                info!(readings = results.len(), "results updated");
            }
            Ok(RunEvent::Complete) => {
                info!("run complete");
                break;
            }
            Ok(RunEvent::Cancelled) => {
                info!("run cancelled");
                break;
            }
            Ok(RunEvent::Error(message)) => bail!("run failed: {message}"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped run events"),
            Err(RecvError::Closed) => break,
        }
    }

    for record in controller.results().await {
        println!("{}\t{}\t{}", record.well, record.analyte, record.reading);
    }
    let blank = controller.blank_wells().await;
    if !blank.is_empty() {
        let names: Vec<String> = blank.iter().map(WellId::to_string).collect();
        println!("blank wells: {}", names.join(","));
    }

    if args.eject {
        if !controller.can_eject().await {
            bail!("cannot eject while a run is active");
        }
        let mut outcome = Ok(());
        controller
            .eject_plate(
                || info!("plate ejected"),
                |message| outcome = Err(message),
            )
            .await;
        if let Err(message) = outcome {
            bail!("eject failed: {message}");
        }
    }

    Ok(())
}
