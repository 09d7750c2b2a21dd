//! Inbound FFB listener
//!
//! Runs as its own task for the lifetime of a streaming session. It only
//! decodes; every command is forwarded to the bridge over a channel and applied
//! there, so the haptic device is never touched from this task.

use super::message::{decode_inbound, FfbCommand};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 4096;

pub struct ListenerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn spawn(socket: UdpSocket, commands: mpsc::Sender<FfbCommand>) -> Self {
        let local_addr = socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!("FFB listener started on {}", local_addr);
        let task = tokio::spawn(async move {
            run(socket, commands, token).await;
        });

        Self {
            local_addr,
            cancel,
            task,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener, aborting it if it has not finished within `grace`
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => info!("FFB listener on {} stopped", self.local_addr),
            Ok(Err(e)) => warn!("FFB listener task failed: {}", e),
            Err(_) => {
                warn!(
                    "FFB listener did not stop within {:?}, aborting",
                    grace
                );
                self.task.abort();
            }
        }
    }
}

async fn run(socket: UdpSocket, commands: mpsc::Sender<FfbCommand>, cancel: CancellationToken) {
    let mut buffer = [0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("FFB listener cancelled");
                break;
            }
            received = socket.recv_from(&mut buffer) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        // e.g. ICMP port unreachable surfacing on Windows
                        debug!("FFB listener receive error: {}", e);
                        continue;
                    }
                };

                let decoded = match decode_inbound(&buffer[..len]) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        debug!("Dropping datagram from {}: {}", peer, e);
                        continue;
                    }
                };

                for command in decoded {
                    debug!("Received {} {} from {}", command.address(), command.percent, peer);
                    if commands.send(command).await.is_err() {
                        warn!("Bridge is gone, stopping FFB listener");
                        return;
                    }
                }
            }
        }
    }
}
