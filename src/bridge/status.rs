use crate::device::{DeviceSummary, EffectKind};
use crate::persistence::FfbStrengths;
use serde::Serialize;
use std::net::SocketAddr;

/// Snapshot of the bridge published on every state change
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub streaming: bool,
    pub device: Option<DeviceSummary>,
    pub active_profile: String,
    pub target: Option<SocketAddr>,
    pub listen_addr: Option<SocketAddr>,
    pub ffb: FfbStrengths,
    pub haptic_effects: Vec<EffectKind>,
    pub messages_sent: usize,
    pub messages_failed: usize,
    pub ffb_received: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
    pub last_error: Option<String>,
}
