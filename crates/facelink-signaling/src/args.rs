use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

/// Available signaling transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignalingKind {
    /// Newline-delimited JSON over TCP
    TcpSocket,
    /// Newline-delimited JSON over a Unix domain socket
    UnixSocket,
    /// Print messages to stdout, paste the peer's messages on stdin
    CopyAndPaste,
    /// JSON text frames through a WebSocket relay
    Websocket,
}

/// Signaling flags shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct SignalingArgs {
    /// Signaling transport
    #[arg(
        short = 's',
        long = "signaling",
        env = "FACELINK_SIGNALING",
        value_enum,
        default_value_t = SignalingKind::TcpSocket
    )]
    pub kind: SignalingKind,

    /// Host for tcp-socket signaling
    #[arg(long, env = "FACELINK_SIGNALING_HOST", default_value = "127.0.0.1")]
    pub signaling_host: String,

    /// Port for tcp-socket signaling
    #[arg(long, env = "FACELINK_SIGNALING_PORT", default_value_t = 1234)]
    pub signaling_port: u16,

    /// Socket path for unix-socket signaling
    #[arg(long, env = "FACELINK_SIGNALING_PATH", default_value = "facelink.socket")]
    pub signaling_path: PathBuf,

    /// Relay URL for websocket signaling (ws:// or wss://)
    #[arg(long, env = "FACELINK_SIGNALING_URL")]
    pub signaling_url: Option<String>,

    /// How long to keep retrying when the signaling endpoint is not up yet
    #[arg(long, env = "FACELINK_SIGNALING_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub signaling_connect_timeout_secs: u64,
}

impl SignalingArgs {
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.signaling_host, self.signaling_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.signaling_connect_timeout_secs)
    }
}
