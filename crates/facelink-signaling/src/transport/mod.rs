//! Concrete signaling transports.

mod lines;
pub mod memory;
pub mod stdio;
pub mod tcp;
#[cfg(unix)]
pub mod unix;
pub mod websocket;

use std::net::IpAddr;
use std::time::Duration;

use facelink_common::helpers::env_bool;
use facelink_common::{Error, Result};
use tracing::info;

pub use memory::MemorySignaling;
pub use stdio::StdioSignaling;
pub use tcp::TcpSignaling;
#[cfg(unix)]
pub use unix::UnixSignaling;
pub use websocket::WebSocketSignaling;

use crate::{SignalingArgs, SignalingChannel, SignalingKind};

/// Upper bound for one encoded signaling message.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Pause between connection attempts while the remote endpoint is not up.
pub(crate) const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

const ALLOW_REMOTE_SIGNALING_ENV: &str = "FACELINK_ALLOW_REMOTE_SIGNALING";

/// Which end of a point-to-point transport this process takes.
///
/// The side that speaks first (the initiator) listens, the side that waits
/// for an offer connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingRole {
    Listen,
    Connect,
}

/// Builds the channel selected on the command line.
///
/// Listening transports bind here so address problems surface before any
/// media setup; the peer is accepted later in `connect`.
pub async fn create_signaling(
    args: &SignalingArgs,
    role: SignalingRole,
) -> Result<Box<dyn SignalingChannel>> {
    let timeout = args.connect_timeout();
    let channel: Box<dyn SignalingChannel> = match args.kind {
        SignalingKind::TcpSocket => {
            let addr = args.tcp_addr();
            match role {
                SignalingRole::Listen => {
                    validate_listen_host(&args.signaling_host)?;
                    Box::new(TcpSignaling::bind(&addr).await?)
                }
                SignalingRole::Connect => Box::new(TcpSignaling::connect_to(addr, timeout)),
            }
        }
        #[cfg(unix)]
        SignalingKind::UnixSocket => match role {
            SignalingRole::Listen => Box::new(UnixSignaling::bind(&args.signaling_path)?),
            SignalingRole::Connect => {
                Box::new(UnixSignaling::connect_to(&args.signaling_path, timeout))
            }
        },
        #[cfg(not(unix))]
        SignalingKind::UnixSocket => {
            return Err(Error::config("unix-socket signaling requires a Unix platform"))
        }
        SignalingKind::CopyAndPaste => Box::new(StdioSignaling::new()),
        SignalingKind::Websocket => {
            let url = args.signaling_url.clone().ok_or_else(|| {
                Error::config("--signaling-url is required for websocket signaling")
            })?;
            Box::new(WebSocketSignaling::new(url, timeout)?)
        }
    };
    info!(kind = ?args.kind, ?role, "signaling transport ready");
    Ok(channel)
}

/// Signaling carries no authentication, so listening beyond loopback is opt-in.
fn validate_listen_host(host: &str) -> Result<()> {
    let loopback = host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false);
    if loopback || env_bool(ALLOW_REMOTE_SIGNALING_ENV, false) {
        return Ok(());
    }
    Err(Error::config(format!(
        "refusing to listen for signaling on non-loopback host {host}; set {ALLOW_REMOTE_SIGNALING_ENV}=1 to override"
    )))
}
