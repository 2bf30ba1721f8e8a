use std::time::Duration;

use clap::Parser;
use facelink_client::pipeline::answer;
use facelink_client::ClientArgs;
use facelink_common::Error;
use facelink_media::{DetectionWorker, PlaceholderDetector, WorkerConfig};

fn client_args(extra: &[&str]) -> ClientArgs {
    let mut argv = vec!["facelink-client"];
    argv.extend_from_slice(extra);
    ClientArgs::try_parse_from(argv).unwrap()
}

async fn unused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_missing_relay_url_fails_and_worker_still_joins() {
    let (worker, _results) =
        DetectionWorker::spawn(Box::new(PlaceholderDetector), WorkerConfig::default()).unwrap();

    let err = answer(&client_args(&["-s", "websocket"]), worker.submitter())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let stats = tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.submitted, 0);
}

#[tokio::test]
async fn test_unreachable_signaling_closes_session_and_returns() {
    let port = unused_port().await.to_string();
    let args = client_args(&[
        "--signaling-host",
        "127.0.0.1",
        "--signaling-port",
        &port,
        "--signaling-connect-timeout-secs",
        "1",
    ]);
    let (worker, mut results) =
        DetectionWorker::spawn(Box::new(PlaceholderDetector), WorkerConfig::default()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(30), answer(&args, worker.submitter()))
        .await
        .expect("answer hung on an unreachable endpoint")
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(results.recv().await.is_none(), "result queue still open");
}
