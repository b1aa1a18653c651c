//! pdlens Console Application
//!
//! Streams a simulated USB meter through the report pipeline and prints the
//! protocol log and a live telemetry status line.
//!
//! ```text
//! pdlens                  run until Ctrl-C (or the configured duration)
//! pdlens decode <HEX>...  decode one payload and print its parse tree
//! ```

mod console;
mod diagnostics_layer;
mod settings;

use std::future;
use std::io;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use anyhow::Context;
use console::Console;
use diagnostics_layer::{DiagnosticEvent, DiagnosticsLayer, ProjectCrateFilter};
use pdlens_pipeline::{
    run_pipeline_actor, PipelineCommand, PipelineConfig, PipelineError, PipelineView,
};
use pdlens_sim::{run_decoder_warmup, run_meter_task, MeterCommand, SimDecoder, VirtualMeter};
use settings::Settings;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load();

    // Create channel for diagnostic events (before tracing init so we can capture all logs)
    let (diag_tx, diag_rx) = std_mpsc::channel::<DiagnosticEvent>();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pdlens=info,pdlens_protocol=info,pdlens_pipeline=info,pdlens_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            DiagnosticsLayer::new(diag_tx)
                .with_filter(ProjectCrateFilter::new(settings.diagnostic_level())),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("decode") => decode_once(args[1..].join(" "), diag_rx).await,
        Some(other) => anyhow::bail!("unknown command {:?} (expected `decode <HEX>`)", other),
        None => run(settings, diag_rx).await,
    }
}

/// Stream the virtual meter through the pipeline until stopped
async fn run(
    settings: Settings,
    diag_rx: std_mpsc::Receiver<DiagnosticEvent>,
) -> anyhow::Result<()> {
    settings.pipeline.validate()?;
    if Settings::settings_path().is_some_and(|path| !path.exists()) {
        match settings.save() {
            Ok(path) => info!("Wrote default settings to {}", path.display()),
            Err(e) => warn!("Could not write default settings: {}", e),
        }
    }

    info!(
        "Starting pdlens ({} updates/s, queue capacity {})",
        settings.pipeline.max_updates_per_second, settings.pipeline.queue_capacity
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(1024);
    let (event_tx, mut event_rx) = mpsc::channel(1024);

    let decoder = if settings.decoder_warmup_ms > 0 {
        SimDecoder::cold()
    } else {
        SimDecoder::new()
    };
    let actor = tokio::spawn(run_pipeline_actor(
        decoder.clone(),
        settings.pipeline.clone(),
        cmd_rx,
        event_tx,
    ));
    if settings.decoder_warmup_ms > 0 {
        tokio::spawn(run_decoder_warmup(
            decoder,
            Duration::from_millis(settings.decoder_warmup_ms),
            cmd_tx.clone(),
        ));
    }

    let meter =
        VirtualMeter::from_config(settings.meter.clone()).context("invalid meter settings")?;
    let (meter_tx, meter_rx) = mpsc::channel(16);
    let meter_task = tokio::spawn(run_meter_task(
        meter,
        settings.timing,
        meter_rx,
        cmd_tx.clone(),
    ));

    let mut console = Console::new(io::stdout(), settings.show_trees, diag_rx);
    let status_period = Duration::from_millis(settings.status_interval_ms.max(100));
    let mut status_timer = time::interval(status_period);
    let mut pending_view: Option<oneshot::Receiver<PipelineView>> = None;

    let deadline = run_limit(settings.run_seconds);
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break; };
                console.handle_event(&event)?;
            }

            _ = status_timer.tick(), if pending_view.is_none() => {
                let (tx, rx) = oneshot::channel();
                match cmd_tx.try_send(PipelineCommand::QueryView { response: tx }) {
                    Ok(()) => pending_view = Some(rx),
                    // Skip this status line rather than wait behind the transport
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }

            view = next_view(&mut pending_view) => {
                match view {
                    Some(view) => console.render_status(&view)?,
                    None => break,
                }
            }

            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }

            _ = &mut deadline => {
                info!("Run time of {} s reached", settings.run_seconds);
                break;
            }
        }
    }

    // Nothing is shown past this point; the actor drops what no longer fits
    drop(event_rx);

    let _ = meter_tx.send(MeterCommand::Shutdown).await;
    meter_task.await?.context("virtual meter failed")?;

    if let Ok(view) = query_view(&cmd_tx).await {
        console.print_selected(&view)?;
        console.render_status(&view)?;
        info!(
            "Received {} reports, decoded {}, skipped {}, evicted {} in {} passes ({} events dropped)",
            view.stats.received,
            view.stats.decoded,
            view.stats.skipped,
            view.stats.evicted,
            view.stats.passes,
            view.stats.events_dropped
        );
    }

    let _ = cmd_tx.send(PipelineCommand::Shutdown).await;
    actor.await?;
    Ok(())
}

/// Decode one payload through the pipeline's manual decode path
async fn decode_once(
    payload: String,
    diag_rx: std_mpsc::Receiver<DiagnosticEvent>,
) -> anyhow::Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (event_tx, _event_rx) = mpsc::channel(64);
    let actor = tokio::spawn(run_pipeline_actor(
        SimDecoder::new(),
        PipelineConfig::default(),
        cmd_rx,
        event_tx,
    ));

    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(PipelineCommand::RequestDecode {
            payload: Some(payload),
            response: tx,
        })
        .await
        .map_err(|_| PipelineError::ActorUnavailable)?;
    let decoded = rx.await.map_err(|_| PipelineError::ActorUnavailable)??;

    let mut console = Console::new(io::stdout(), true, diag_rx);
    console.print_decoded(&decoded)?;

    let _ = cmd_tx.send(PipelineCommand::Shutdown).await;
    actor.await?;
    Ok(())
}

async fn query_view(
    cmd_tx: &mpsc::Sender<PipelineCommand>,
) -> Result<PipelineView, PipelineError> {
    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(PipelineCommand::QueryView { response: tx })
        .await
        .map_err(|_| PipelineError::ActorUnavailable)?;
    rx.await.map_err(|_| PipelineError::ActorUnavailable)
}

/// Resolve the outstanding view query, or wait forever when there is none
async fn next_view(
    pending: &mut Option<oneshot::Receiver<PipelineView>>,
) -> Option<PipelineView> {
    match pending.as_mut() {
        Some(rx) => {
            let view = rx.await.ok();
            *pending = None;
            view
        }
        None => future::pending().await,
    }
}

/// Completes after `seconds`, or never when zero
async fn run_limit(seconds: u64) {
    if seconds == 0 {
        future::pending::<()>().await;
    } else {
        time::sleep(Duration::from_secs(seconds)).await;
    }
}
