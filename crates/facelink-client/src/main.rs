//! facelink-client: connects to the offering side, answers it and runs
//! detection on the received video.

use anyhow::Result;
use clap::Parser;
use facelink_client::pipeline::{answer, build_detector, build_sink};
use facelink_client::ClientArgs;
use facelink_common::init_tracing_with_default;
use facelink_media::sink::run_display;
use facelink_media::DetectionWorker;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientArgs::parse();
    init_tracing_with_default(&args.log_level);
    info!("starting facelink-client v{}", env!("CARGO_PKG_VERSION"));

    let mut sink = build_sink(&args)?;
    let (worker, mut results) =
        DetectionWorker::spawn(build_detector(&args), args.worker_config())?;
    let display = tokio::spawn(async move { run_display(&mut results, &mut sink).await });

    let result = answer(&args, worker.submitter()).await;

    match tokio::task::spawn_blocking(move || worker.shutdown()).await {
        Ok(Ok(stats)) => info!(
            "processed {} frames ({} dropped, {} failed)",
            stats.processed, stats.dropped, stats.failed
        ),
        Ok(Err(e)) => warn!("detection worker shutdown failed: {}", e),
        Err(e) => warn!("detection worker shutdown panicked: {}", e),
    }
    match display.await {
        Ok(shown) => info!("display loop saw {} results", shown),
        Err(e) => warn!("display loop ended abnormally: {}", e),
    }

    Ok(result?)
}
