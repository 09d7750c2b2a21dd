//! Device subsystem: enumeration, the open device and its haptic handle
//!
//! 1. [`backend`] - Platform contract ([`InputBackend`], [`HapticDevice`]) and snapshot types
//! 2. [`gilrs_backend`] - Default backend on top of gilrs (plus evdev haptics on Linux)
//! 3. [`classify`] - Wheel detection and button display names
//! 4. [`manager`] - [`DeviceManager`], sole owner of the open device
//!
//! ```text
//! Platform API ──► InputBackend ──► DeviceManager ──► DeviceSnapshot
//!                       │                 │
//!                  HapticDevice ◄─────────┘ (borrowed per call)
//! ```

pub mod backend;
pub mod classify;
pub mod gilrs_backend;
pub mod manager;

#[cfg(target_os = "linux")]
mod evdev_haptic;

#[cfg(test)]
pub mod mock;

pub use backend::{
    ConditionParams, DeviceError, DeviceInfo, DeviceSnapshot, EffectId, EffectKind,
    HapticCapabilities, HapticDevice, HapticError, InputBackend,
};
pub use classify::{ButtonFamily, DeviceClass};
pub use gilrs_backend::GilrsBackend;
pub use manager::{DeviceManager, DeviceSummary};
