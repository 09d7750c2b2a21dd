//! Streaming session with statum typestate
//!
//! ```text
//! Starting ──► Streaming ──► Stopped
//! ```
//!
//! `open` validates the network target and binds both sockets before anything
//! else changes. If the inbound bind fails the already bound outbound socket
//! is dropped with the half-built session, so a retry starts clean.

use super::error::TransportError;
use super::listener::ListenerHandle;
use super::message::{encode_outbound, FfbCommand};
use crate::controller::PollState;
use crate::device::DeviceSnapshot;
use crate::persistence::{NetworkTarget, Profile};
use statum::{machine, state};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Starting,
    Streaming,
    Stopped,
}

/// Counters of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub failed: usize,
}

#[machine]
pub struct StreamSession<S: SessionState> {
    target: SocketAddr,
    address: String,
    outbound: Option<UdpSocket>,
    inbound: Option<UdpSocket>,
    ffb_tx: mpsc::Sender<FfbCommand>,
    listener: Option<ListenerHandle>,
    poll: PollState,
}

impl<S: SessionState> StreamSession<S> {
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

pub fn parse_port(field: &'static str, value: &str) -> Result<u16, TransportError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(TransportError::InvalidPort {
            field,
            value: value.to_string(),
        }),
    }
}

async fn resolve_target(ip: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let host = ip.trim();
    if host.is_empty() {
        return Err(TransportError::InvalidTarget("empty host".to_string()));
    }
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::InvalidTarget(format!("{}:{} ({})", host, port, e)))?;
    addrs
        .next()
        .ok_or_else(|| TransportError::InvalidTarget(format!("{}:{} resolved to nothing", host, port)))
}

impl StreamSession<Starting> {
    /// Validates `network` and binds the outbound and inbound sockets
    pub async fn open(
        network: &NetworkTarget,
        ffb_tx: mpsc::Sender<FfbCommand>,
    ) -> Result<Self, TransportError> {
        let port = parse_port("port", &network.port)?;
        let listen_port = parse_port("listen_port", &network.listen_port)?;

        let address = network.osc_address.trim().to_string();
        if !address.starts_with('/') {
            return Err(TransportError::InvalidAddress(address));
        }

        let target = resolve_target(&network.ip, port).await?;

        let local = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let outbound = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::BindFailed {
                what: "outbound",
                port: 0,
                source,
            })?;

        let inbound = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, listen_port))
            .await
            .map_err(|source| TransportError::BindFailed {
                what: "FFB listener",
                port: listen_port,
                source,
            })?;

        debug!(
            "Sockets bound: outbound {:?}, inbound {:?}",
            outbound.local_addr().ok(),
            inbound.local_addr().ok()
        );

        Ok(Self::new(
            target,
            address,
            Some(outbound),
            Some(inbound),
            ffb_tx,
            None,
            PollState::default(),
        ))
    }

    /// Starts the listener task and clears the change-detection state
    pub fn arm(mut self) -> StreamSession<Streaming> {
        self.poll.reset();
        if let Some(socket) = self.inbound.take() {
            self.listener = Some(ListenerHandle::spawn(socket, self.ffb_tx.clone()));
        }
        info!("Streaming to {} with address {}", self.target, self.address);
        self.transition()
    }
}

impl StreamSession<Streaming> {
    /// Diffs `snapshot` and sends one datagram per changed index
    pub fn tick(&mut self, snapshot: &DeviceSnapshot, profile: &Profile) -> TickReport {
        let mut report = TickReport::default();
        let Some(socket) = self.outbound.as_ref() else {
            return report;
        };

        for message in self.poll.diff(snapshot, profile) {
            let datagram = match encode_outbound(&self.address, &message) {
                Ok(datagram) => datagram,
                Err(e) => {
                    warn!("{}", e);
                    report.failed += 1;
                    continue;
                }
            };
            match socket.try_send_to(&datagram, self.target) {
                Ok(_) => {
                    debug!("{} {}", self.address, message);
                    report.sent += 1;
                }
                Err(e) => {
                    debug!("Dropped {} {}: {}", self.address, message, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    /// Shuts the listener down within `grace` and releases both sockets
    pub async fn stop(mut self, grace: Duration) -> StreamSession<Stopped> {
        if let Some(listener) = self.listener.take() {
            listener.shutdown(grace).await;
        }
        self.outbound = None;
        info!("Stopped streaming to {}", self.target);
        self.transition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::backend::HAT_UP;

    fn network(port: &str, listen_port: &str) -> NetworkTarget {
        NetworkTarget {
            ip: "127.0.0.1".to_string(),
            port: port.to_string(),
            listen_port: listen_port.to_string(),
            osc_address: "/wheel/input".to_string(),
        }
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port("port", " 4041 ").unwrap(), 4041);
        assert!(parse_port("port", "0").is_err());
        assert!(parse_port("port", "70000").is_err());
        assert!(matches!(
            parse_port("listen_port", "abc"),
            Err(TransportError::InvalidPort {
                field: "listen_port",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn invalid_configuration_fails_before_binding() {
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            StreamSession::open(&network("x", "4042"), tx.clone()).await,
            Err(TransportError::InvalidPort { field: "port", .. })
        ));

        let mut bad_address = network("4041", "4042");
        bad_address.osc_address = "wheel".to_string();
        assert!(matches!(
            StreamSession::open(&bad_address, tx).await,
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn occupied_listen_port_is_a_bind_failure() {
        let blocker = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let taken = blocker.local_addr().unwrap().port().to_string();
        let (tx, _rx) = mpsc::channel(1);

        let result = StreamSession::open(&network("4041", &taken), tx).await;
        assert!(matches!(
            result,
            Err(TransportError::BindFailed {
                what: "FFB listener",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn streams_changes_and_stops() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let out_port = receiver.local_addr().unwrap().port().to_string();
        let scratch = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let listen_port = scratch.local_addr().unwrap().port().to_string();
        drop(scratch);

        let (tx, _rx) = mpsc::channel(1);
        let session = StreamSession::open(&network(&out_port, &listen_port), tx)
            .await
            .unwrap();
        let mut session = session.arm();
        assert!(session.listen_addr().is_some());

        let snapshot = DeviceSnapshot {
            axes: vec![0.5],
            buttons: vec![true],
            hats: vec![HAT_UP],
        };
        let profile = Profile::default();
        assert_eq!(
            session.tick(&snapshot, &profile),
            TickReport { sent: 3, failed: 0 }
        );
        assert_eq!(session.tick(&snapshot, &profile), TickReport::default());

        let mut buffer = [0u8; 512];
        let (len, _) = receiver.recv_from(&mut buffer).await.unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buffer[..len]).unwrap();
        match packet {
            rosc::OscPacket::Message(message) => {
                assert_eq!(message.addr, "/wheel/input");
                assert_eq!(message.args[0], rosc::OscType::String("axis".to_string()));
            }
            rosc::OscPacket::Bundle(_) => panic!("unexpected bundle"),
        }

        let stopped = session.stop(Duration::from_secs(1)).await;
        assert_eq!(stopped.address(), "/wheel/input");
    }
}
