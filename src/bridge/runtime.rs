//! Bridge runtime - the cooperative scheduler
//!
//! One task owns the device manager, the haptic controller, the profile store
//! and the streaming session. It multiplexes four sources with `select!`:
//! operator commands, inbound FFB commands from the listener, the poll tick
//! (only while streaming) and the preview tick. Handlers run to completion one
//! at a time, so no two of them ever touch the device concurrently.

use super::command::{BridgeHandle, Command, ProfileList};
use super::status::BridgeStatus;
use super::BridgeError;
use crate::config::BridgeSettings;
use crate::controller::PreviewFrame;
use crate::device::{DeviceError, DeviceInfo, DeviceManager, DeviceSummary, EffectKind, InputBackend};
use crate::haptics::HapticController;
use crate::osc::{FfbCommand, StreamSession, Streaming};
use crate::persistence::{NetworkTarget, ProfileError, ProfileStore};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const COMMAND_QUEUE: usize = 64;
const FFB_QUEUE: usize = 256;

// status goes out before the reply so a caller sees its own change
macro_rules! respond {
    ($bridge:expr, $response_tx:expr, $result:expr) => {{
        let result = $result;
        $bridge.publish_status();
        if $response_tx.send(result).is_err() {
            warn!("Failed to send response, caller went away");
        }
    }};
}

pub struct Bridge<B: InputBackend> {
    settings: BridgeSettings,
    devices: DeviceManager<B>,
    haptics: HapticController,
    store: ProfileStore,
    session: Option<StreamSession<Streaming>>,
    commands: mpsc::Receiver<Command>,
    ffb_tx: mpsc::Sender<FfbCommand>,
    ffb_rx: mpsc::Receiver<FfbCommand>,
    preview_tx: watch::Sender<PreviewFrame>,
    status_tx: watch::Sender<BridgeStatus>,
    status: BridgeStatus,
}

impl<B: InputBackend> Bridge<B> {
    pub fn new(backend: B, store: ProfileStore, settings: BridgeSettings) -> (Self, BridgeHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (ffb_tx, ffb_rx) = mpsc::channel(FFB_QUEUE);
        let (preview_tx, preview_rx) = watch::channel(PreviewFrame::default());

        let status = BridgeStatus {
            active_profile: store.active_name().to_string(),
            ffb: store.ffb(),
            ..BridgeStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(status.clone());
        debug!("Created bridge channels (commands {}, ffb {})", COMMAND_QUEUE, FFB_QUEUE);

        let bridge = Self {
            settings,
            devices: DeviceManager::new(backend),
            haptics: HapticController::new(store.ffb()),
            store,
            session: None,
            commands,
            ffb_tx,
            ffb_rx,
            preview_tx,
            status_tx,
            status,
        };

        (bridge, BridgeHandle::new(tx, preview_rx, status_rx))
    }

    /// Runs until a shutdown command arrives or every handle is dropped
    pub async fn run(mut self) {
        info!(
            "Bridge running, poll every {:?}, preview every {:?}",
            self.settings.poll_interval, self.settings.preview_interval
        );

        let mut poll = tokio::time::interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut preview = tokio::time::interval(self.settings.preview_interval);
        preview.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let keep_running = match command {
                        Some(command) => self.handle(command).await,
                        None => {
                            info!("All bridge handles dropped");
                            if let Err(e) = self.shutdown().await {
                                warn!("Shutdown incomplete: {}", e);
                            }
                            false
                        }
                    };
                    self.publish_status();
                    if !keep_running {
                        break;
                    }
                }

                Some(command) = self.ffb_rx.recv() => {
                    self.apply_remote_ffb(command);
                }

                _ = poll.tick(), if self.session.is_some() => {
                    self.poll_tick().await;
                }

                _ = preview.tick() => {
                    self.preview_tick();
                }
            }
        }

        info!("Bridge stopped");
    }

    /// Executes one command; returns false once the bridge should exit
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::ListDevices { response_tx } => {
                respond!(self, response_tx, Ok(self.devices.list_devices().to_vec()));
            }
            Command::RefreshDevices { response_tx } => {
                let result = self.refresh_devices();
                respond!(self, response_tx, self.record(result));
            }
            Command::SelectDevice { index, response_tx } => {
                let result = self.ensure_stopped().and_then(|_| self.open_device(index));
                respond!(self, response_tx, self.record(result));
            }
            Command::StartStreaming { response_tx } => {
                let result = self.start_streaming().await;
                respond!(self, response_tx, self.record(result));
            }
            Command::StopStreaming { response_tx } => {
                self.stop_streaming().await;
                respond!(self, response_tx, Ok(()));
            }
            Command::SetFfbStrength {
                kind,
                percent,
                response_tx,
            } => {
                respond!(self, response_tx, Ok(self.set_ffb(kind, percent)));
            }
            Command::UpdateNetwork {
                target,
                response_tx,
            } => {
                let result = self.update_network(target);
                respond!(self, response_tx, self.record(result));
            }
            Command::UpdateAxis {
                index,
                config,
                response_tx,
            } => {
                let result = self.store.set_axis(index, config).map_err(BridgeError::from);
                respond!(self, response_tx, self.record(result));
            }
            Command::UpdateButton {
                index,
                id,
                response_tx,
            } => {
                self.store.set_button(index, id);
                respond!(self, response_tx, Ok(()));
            }
            Command::UpdateHat {
                index,
                id,
                response_tx,
            } => {
                self.store.set_hat(index, id);
                respond!(self, response_tx, Ok(()));
            }
            Command::ResetMappings { response_tx } => {
                self.store.reset_mappings();
                respond!(self, response_tx, Ok(()));
            }
            Command::ListProfiles { response_tx } => {
                respond!(
                    self,
                    response_tx,
                    Ok(ProfileList {
                        names: self.store.profile_names(),
                        active: self.store.active_name().to_string(),
                    })
                );
            }
            Command::CreateProfile { name, response_tx } => {
                let result = self.change_profile(|store| store.create(&name));
                respond!(self, response_tx, self.record(result));
            }
            Command::SelectProfile { name, response_tx } => {
                let result = self.change_profile(|store| store.select(&name));
                respond!(self, response_tx, self.record(result));
            }
            Command::DeleteProfile { name, response_tx } => {
                let result = self.change_profile(|store| store.delete(&name));
                respond!(self, response_tx, self.record(result));
            }
            Command::SaveProfiles { response_tx } => {
                let result = self.save().await;
                respond!(self, response_tx, self.record(result));
            }
            Command::Shutdown { response_tx } => {
                let result = self.shutdown().await;
                respond!(self, response_tx, result);
                return false;
            }
        }
        true
    }

    /// Logs a failed operation and keeps it as the last error in the status
    fn record<T>(&mut self, result: Result<T, BridgeError>) -> Result<T, BridgeError> {
        if let Err(e) = &result {
            error!("{}", e);
            self.status.last_error = Some(e.to_string());
        }
        result
    }

    fn ensure_stopped(&self) -> Result<(), BridgeError> {
        if self.session.is_some() {
            return Err(ProfileError::StreamingActive.into());
        }
        Ok(())
    }

    fn open_device(&mut self, index: usize) -> Result<DeviceSummary, BridgeError> {
        self.haptics.detach(self.devices.haptic_mut());
        let summary = self.devices.open(index)?;

        self.store
            .ensure_indices(summary.axis_count, summary.button_count, summary.hat_count);
        self.haptics.apply_all(None, self.store.ffb());
        if let Some(haptic) = self.devices.haptic_mut() {
            self.haptics.attach(haptic);
        }
        Ok(summary)
    }

    fn refresh_devices(&mut self) -> Result<Vec<DeviceInfo>, BridgeError> {
        self.ensure_stopped()?;
        self.haptics.detach(self.devices.haptic_mut());
        let devices = self.devices.refresh().to_vec();

        match devices.first() {
            Some(first) => {
                if let Err(e) = self.open_device(first.index) {
                    warn!("Failed to open {} after refresh: {}", first, e);
                }
            }
            None => warn!("No input devices found"),
        }
        Ok(devices)
    }

    async fn start_streaming(&mut self) -> Result<(), BridgeError> {
        if self.session.is_some() {
            debug!("Start requested while already streaming");
            return Ok(());
        }

        // sockets first: a bad port must not change anything else
        let session =
            StreamSession::open(&self.store.live().network, self.ffb_tx.clone()).await?;

        if !self.devices.is_open() {
            let index = self
                .devices
                .list_devices()
                .first()
                .map(|device| device.index)
                .ok_or_else(|| DeviceError::DeviceUnavailable("no devices enumerated".to_string()))?;
            self.open_device(index)?;
        }

        let session = session.arm();
        self.status.streaming = true;
        self.status.target = Some(session.target());
        self.status.listen_addr = session.listen_addr();
        self.status.last_error = None;
        if let Some(device) = self.devices.summary() {
            info!(
                "Streaming {} to {} {}",
                device.name,
                session.target(),
                session.address()
            );
        }
        self.session = Some(session);
        Ok(())
    }

    async fn stop_streaming(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop(self.settings.listener_grace).await;
        }
        self.status.streaming = false;
        self.status.target = None;
        self.status.listen_addr = None;
    }

    fn set_ffb(&mut self, kind: EffectKind, percent: f64) -> f64 {
        let kept = self.store.set_ffb(kind, percent);
        self.haptics
            .set_strength(self.devices.haptic_mut(), kind, kept);
        kept
    }

    fn apply_remote_ffb(&mut self, command: FfbCommand) {
        let kept = self.set_ffb(command.kind, command.percent);
        info!("OSC IN: {} -> {:.1}", command.address(), kept);
        self.status.ffb_received += 1;
        self.status.last_activity = Some(chrono::Local::now());
        self.publish_status();
    }

    fn update_network(&mut self, target: NetworkTarget) -> Result<(), BridgeError> {
        self.ensure_stopped()?;
        self.store.set_network(target);
        Ok(())
    }

    /// Runs a profile switch and pushes the new profile's settings to the device
    fn change_profile(
        &mut self,
        change: impl FnOnce(&mut ProfileStore) -> Result<(), ProfileError>,
    ) -> Result<(), BridgeError> {
        self.ensure_stopped()?;
        change(&mut self.store)?;

        if let Some(device) = self.devices.summary() {
            self.store
                .ensure_indices(device.axis_count, device.button_count, device.hat_count);
        }
        self.haptics
            .apply_all(self.devices.haptic_mut(), self.store.ffb());
        Ok(())
    }

    async fn save(&mut self) -> Result<(), BridgeError> {
        self.store
            .save()
            .await
            .map_err(|e| BridgeError::Persistence(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<(), BridgeError> {
        info!("Bridge shutting down");
        let saved = self.save().await;
        if let Err(e) = &saved {
            error!("Failed to save profiles on shutdown: {}", e);
        }

        self.stop_streaming().await;
        self.haptics.detach(self.devices.haptic_mut());
        self.devices.close();
        saved
    }

    async fn poll_tick(&mut self) {
        let snapshot = match self.devices.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Lost the device while streaming, stopping: {}", e);
                self.status.last_error = Some(e.to_string());
                self.stop_streaming().await;
                self.publish_status();
                return;
            }
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let report = session.tick(&snapshot, self.store.live());
        if report.sent > 0 || report.failed > 0 {
            self.status.messages_sent += report.sent;
            self.status.messages_failed += report.failed;
            self.status.last_activity = Some(chrono::Local::now());
            self.publish_status();
        }
    }

    fn preview_tick(&mut self) {
        let frame = match self.devices.summary() {
            None => PreviewFrame::default(),
            Some(device) => match self.devices.snapshot() {
                Ok(snapshot) => PreviewFrame::build(
                    device,
                    &snapshot,
                    self.store.live(),
                    self.session.is_some(),
                ),
                Err(e) => {
                    debug!("Preview read failed: {}", e);
                    return;
                }
            },
        };

        self.preview_tx.send_if_modified(|current| {
            if *current == frame {
                false
            } else {
                *current = frame;
                true
            }
        });
    }

    fn publish_status(&mut self) {
        self.status.device = self.devices.summary();
        self.status.active_profile = self.store.active_name().to_string();
        self.status.ffb = self.store.ffb();
        self.status.haptic_effects = self.haptics.active_effects();

        let status = self.status.clone();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
