use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{info, warn};

use crate::analysis::{AnalysisProvider, SimulatedAnalyzer};
use crate::capture::{CaptureEvent, CaptureLoop};
use crate::config::Settings;
use crate::error::{AppError, MediaError};
use crate::media::{MediaDevices, PermissionState, SyntheticMediaDevices, check_permission};

/// Runs capture without a window and prints every event to stdout as one JSON line.
/// Stops on ctrl-c, or after `ui.run_for_secs` when set.
pub async fn run(settings: Settings) -> Result<(), AppError> {
    let devices: Arc<dyn MediaDevices> =
        Arc::new(SyntheticMediaDevices::from_settings(&settings.camera));
    let provider: Arc<dyn AnalysisProvider> =
        Arc::new(SimulatedAnalyzer::from_settings(&settings.analysis));

    let run_for = settings.ui.run_for_secs.map(Duration::from_secs);
    let shutdown = async move {
        match run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Unable to listen for ctrl-c: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
    };

    let written = run_with(&settings, devices, provider, std::io::stdout(), shutdown).await?;
    info!("Headless run finished after {} events", written);
    Ok(())
}

/// Drives a capture loop until `shutdown` resolves, writing events to `out`.
/// Returns how many events were written.
pub async fn run_with<W, F>(
    settings: &Settings,
    devices: Arc<dyn MediaDevices>,
    provider: Arc<dyn AnalysisProvider>,
    mut out: W,
    shutdown: F,
) -> Result<u64, AppError>
where
    W: Write,
    F: Future<Output = ()>,
{
    if let PermissionState::Denied(reason) = check_permission(devices.as_ref()).await {
        warn!("Camera access denied: {}", reason);
        return Err(MediaError::AccessDenied.into());
    }

    let mut capture = CaptureLoop::builder(settings.capture.clone())
        .devices(devices)
        .provider(provider)
        .build()?;
    let mut events = BroadcastStream::new(capture.subscribe());
    capture.start();

    let mut written = 0u64;
    tokio::pin!(shutdown);
    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            item = events.next() => match item {
                Some(Ok(event)) => {
                    if let Err(e) = write_event(&mut out, &event) {
                        break Err(e);
                    }
                    written += 1;
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    warn!("Output lagged behind, skipping {} capture events", n);
                }
                None => break Ok(()),
            },
        }
    };

    capture.shutdown().await;
    while let Some(Some(item)) = events.next().now_or_never() {
        if let Ok(event) = item {
            write_event(&mut out, &event)?;
            written += 1;
        }
    }
    out.flush()?;
    outcome.map(|_| written)
}

fn write_event<W: Write>(out: &mut W, event: &CaptureEvent) -> Result<(), AppError> {
    serde_json::to_writer(&mut *out, event)?;
    out.write_all(b"\n")?;
    Ok(())
}
