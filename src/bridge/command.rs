//! Commands accepted by the bridge and the handle that sends them

use super::status::BridgeStatus;
use super::BridgeError;
use crate::controller::PreviewFrame;
use crate::device::{DeviceInfo, DeviceSummary, EffectKind};
use crate::persistence::{AxisConfig, NetworkTarget};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

type Reply<T> = oneshot::Sender<Result<T, BridgeError>>;

/// Profile names and which one is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileList {
    pub names: Vec<String>,
    pub active: String,
}

#[derive(Debug)]
pub enum Command {
    ListDevices {
        response_tx: Reply<Vec<DeviceInfo>>,
    },
    RefreshDevices {
        response_tx: Reply<Vec<DeviceInfo>>,
    },
    SelectDevice {
        index: usize,
        response_tx: Reply<DeviceSummary>,
    },
    StartStreaming {
        response_tx: Reply<()>,
    },
    StopStreaming {
        response_tx: Reply<()>,
    },
    SetFfbStrength {
        kind: EffectKind,
        percent: f64,
        response_tx: Reply<f64>,
    },
    UpdateNetwork {
        target: NetworkTarget,
        response_tx: Reply<()>,
    },
    UpdateAxis {
        index: usize,
        config: AxisConfig,
        response_tx: Reply<()>,
    },
    UpdateButton {
        index: usize,
        id: String,
        response_tx: Reply<()>,
    },
    UpdateHat {
        index: usize,
        id: String,
        response_tx: Reply<()>,
    },
    ResetMappings {
        response_tx: Reply<()>,
    },
    ListProfiles {
        response_tx: Reply<ProfileList>,
    },
    CreateProfile {
        name: String,
        response_tx: Reply<()>,
    },
    SelectProfile {
        name: String,
        response_tx: Reply<()>,
    },
    DeleteProfile {
        name: String,
        response_tx: Reply<()>,
    },
    SaveProfiles {
        response_tx: Reply<()>,
    },
    Shutdown {
        response_tx: Reply<()>,
    },
}

/// Cloneable front door to a running bridge
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Command>,
    preview_rx: watch::Receiver<PreviewFrame>,
    status_rx: watch::Receiver<BridgeStatus>,
}

impl BridgeHandle {
    pub(super) fn new(
        tx: mpsc::Sender<Command>,
        preview_rx: watch::Receiver<PreviewFrame>,
        status_rx: watch::Receiver<BridgeStatus>,
    ) -> Self {
        Self {
            tx,
            preview_rx,
            status_rx,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        response_rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }

    pub fn subscribe_preview(&self) -> watch::Receiver<PreviewFrame> {
        debug!("New subscriber to preview frames");
        self.preview_rx.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<BridgeStatus> {
        debug!("New subscriber to bridge status");
        self.status_rx.clone()
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, BridgeError> {
        self.request(|response_tx| Command::ListDevices { response_tx })
            .await
    }

    pub async fn refresh_devices(&self) -> Result<Vec<DeviceInfo>, BridgeError> {
        self.request(|response_tx| Command::RefreshDevices { response_tx })
            .await
    }

    pub async fn select_device(&self, index: usize) -> Result<DeviceSummary, BridgeError> {
        self.request(|response_tx| Command::SelectDevice { index, response_tx })
            .await
    }

    pub async fn start_streaming(&self) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::StartStreaming { response_tx })
            .await
    }

    pub async fn stop_streaming(&self) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::StopStreaming { response_tx })
            .await
    }

    /// Returns the strength actually applied after clamping
    pub async fn set_ffb_strength(&self, kind: EffectKind, percent: f64) -> Result<f64, BridgeError> {
        self.request(|response_tx| Command::SetFfbStrength {
            kind,
            percent,
            response_tx,
        })
        .await
    }

    pub async fn update_network(&self, target: NetworkTarget) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::UpdateNetwork {
            target,
            response_tx,
        })
        .await
    }

    pub async fn update_axis(&self, index: usize, config: AxisConfig) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::UpdateAxis {
            index,
            config,
            response_tx,
        })
        .await
    }

    pub async fn update_button(&self, index: usize, id: impl Into<String>) -> Result<(), BridgeError> {
        let id = id.into();
        self.request(|response_tx| Command::UpdateButton {
            index,
            id,
            response_tx,
        })
        .await
    }

    pub async fn update_hat(&self, index: usize, id: impl Into<String>) -> Result<(), BridgeError> {
        let id = id.into();
        self.request(|response_tx| Command::UpdateHat {
            index,
            id,
            response_tx,
        })
        .await
    }

    pub async fn reset_mappings(&self) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::ResetMappings { response_tx })
            .await
    }

    pub async fn list_profiles(&self) -> Result<ProfileList, BridgeError> {
        self.request(|response_tx| Command::ListProfiles { response_tx })
            .await
    }

    pub async fn create_profile(&self, name: impl Into<String>) -> Result<(), BridgeError> {
        let name = name.into();
        self.request(|response_tx| Command::CreateProfile { name, response_tx })
            .await
    }

    pub async fn select_profile(&self, name: impl Into<String>) -> Result<(), BridgeError> {
        let name = name.into();
        self.request(|response_tx| Command::SelectProfile { name, response_tx })
            .await
    }

    pub async fn delete_profile(&self, name: impl Into<String>) -> Result<(), BridgeError> {
        let name = name.into();
        self.request(|response_tx| Command::DeleteProfile { name, response_tx })
            .await
    }

    pub async fn save_profiles(&self) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::SaveProfiles { response_tx })
            .await
    }

    /// Saves, stops streaming, closes the device and ends the bridge loop
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.request(|response_tx| Command::Shutdown { response_tx })
            .await
    }
}
