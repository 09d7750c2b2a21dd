//! Bridge - ties devices, haptics, profiles and the OSC transport together
//!
//! The [`Bridge`] owns every piece of mutable state and runs on a single task.
//! Everything else talks to it through a [`BridgeHandle`]:
//!
//! ```text
//! BridgeHandle ──Command──► Bridge ──watch──► BridgeStatus / PreviewFrame
//!                             │
//!        listener ──FFB──►    ├── DeviceManager ── HapticController
//!                             ├── ProfileStore
//!                             └── StreamSession<Streaming> ──► UDP
//! ```

pub mod command;
pub mod runtime;
pub mod status;

pub use command::{BridgeHandle, Command, ProfileList};
pub use runtime::Bridge;
pub use status::BridgeStatus;

use crate::device::DeviceError;
use crate::osc::TransportError;
use crate::persistence::ProfileError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Failed to save profiles: {0}")]
    Persistence(String),

    #[error("Bridge is not running")]
    ChannelClosed,
}
