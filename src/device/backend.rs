//! Platform backend contract
//!
//! The bridge never talks to a platform input API directly. Everything it needs
//! from the hardware (enumeration, instantaneous state, conditional haptics) goes
//! through the two traits in this file, so the real gilrs/evdev backend and the
//! scripted test backend are interchangeable.

use serde::Serialize;
use std::fmt;

/// Hat bitmask bits as reported by [`DeviceSnapshot::hats`]
pub const HAT_CENTERED: u8 = 0x00;
pub const HAT_UP: u8 = 0x01;
pub const HAT_RIGHT: u8 = 0x02;
pub const HAT_DOWN: u8 = 0x04;
pub const HAT_LEFT: u8 = 0x08;

/// Opaque handle for an opened device, only meaningful to the backend that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

/// Device type as reported by the platform, before any name heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceTypeTag {
    Wheel,
    #[default]
    Unknown,
}

/// One entry of the enumeration list
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}

/// What the backend hands back from a successful open
#[derive(Debug, Clone)]
pub struct OpenedDevice {
    pub handle: DeviceHandle,
    pub name: String,
    pub type_tag: DeviceTypeTag,
    pub axis_count: usize,
    pub button_count: usize,
    pub hat_count: usize,
}

/// Immutable view of every input on a device at one instant
///
/// Axis values are normalized to [-1, 1]. Hats carry the raw direction bitmask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub axes: Vec<f64>,
    pub buttons: Vec<bool>,
    pub hats: Vec<u8>,
}

impl DeviceSnapshot {
    /// Discretize a hat bitmask into an (x, y) pair in {-1, 0, 1}
    ///
    /// Up wins over down and right wins over left when both bits are set.
    pub fn hat_direction(bitmask: u8) -> (i8, i8) {
        let y = if bitmask & HAT_UP != 0 {
            1
        } else if bitmask & HAT_DOWN != 0 {
            -1
        } else {
            0
        };
        let x = if bitmask & HAT_RIGHT != 0 {
            1
        } else if bitmask & HAT_LEFT != 0 {
            -1
        } else {
            0
        };
        (x, y)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No input device available: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),

    #[error("Device {0:?} is no longer connected")]
    Disconnected(DeviceHandle),

    #[error("No device is open")]
    NotOpen,
}

/// Enumeration and readback side of the platform input API
pub trait InputBackend {
    /// Lists the devices currently connected, in a stable ordinal order
    fn enumerate(&mut self) -> Vec<DeviceInfo>;

    /// Opens the device at the given ordinal from the last enumeration
    fn open(&mut self, index: usize) -> Result<OpenedDevice, DeviceError>;

    /// Releases a device handle. Unknown handles are ignored.
    fn close(&mut self, handle: DeviceHandle);

    /// Pumps pending platform events and returns the current input state
    fn snapshot(&mut self, handle: DeviceHandle) -> Result<DeviceSnapshot, DeviceError>;

    /// Opens the haptic interface belonging to an opened device, if it has one
    fn open_haptic(&mut self, handle: DeviceHandle) -> Option<Box<dyn HapticDevice>>;
}

/// The three conditional effects the bridge drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Spring,
    Damper,
    Friction,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Spring, EffectKind::Damper, EffectKind::Friction];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Spring => "spring",
            EffectKind::Damper => "damper",
            EffectKind::Friction => "friction",
        }
    }

    /// Bit of this effect in a [`HapticCapabilities`] mask
    pub fn capability(&self) -> HapticCapabilities {
        match self {
            EffectKind::Spring => HapticCapabilities::SPRING,
            EffectKind::Damper => HapticCapabilities::DAMPER,
            EffectKind::Friction => HapticCapabilities::FRICTION,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability bitmask of a haptic device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HapticCapabilities(pub u32);

impl HapticCapabilities {
    pub const NONE: HapticCapabilities = HapticCapabilities(0);
    pub const SPRING: HapticCapabilities = HapticCapabilities(1 << 0);
    pub const DAMPER: HapticCapabilities = HapticCapabilities(1 << 1);
    pub const FRICTION: HapticCapabilities = HapticCapabilities(1 << 2);
    pub const AUTOCENTER: HapticCapabilities = HapticCapabilities(1 << 3);
    pub const GAIN: HapticCapabilities = HapticCapabilities(1 << 4);

    pub fn contains(&self, other: HapticCapabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn supports(&self, kind: EffectKind) -> bool {
        self.contains(kind.capability())
    }
}

impl std::ops::BitOr for HapticCapabilities {
    type Output = HapticCapabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        HapticCapabilities(self.0 | rhs.0)
    }
}

/// Backend-issued id of an uploaded effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(pub i32);

/// Parameters of a single-axis condition effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionParams {
    pub right_coeff: i16,
    pub left_coeff: i16,
    pub right_sat: u16,
    pub left_sat: u16,
    pub deadband: u16,
    pub center: i16,
}

impl ConditionParams {
    /// Symmetric condition with both coefficients set and saturation at maximum
    pub fn symmetric(coeff: i16) -> Self {
        Self {
            right_coeff: coeff,
            left_coeff: coeff,
            right_sat: u16::MAX,
            left_sat: u16::MAX,
            deadband: 0,
            center: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HapticError {
    #[error("Effect {0} is not supported by this device")]
    Unsupported(EffectKind),

    #[error("Unknown effect id {0:?}")]
    UnknownEffect(EffectId),

    #[error("Haptic device error: {0}")]
    DeviceError(String),
}

/// Conditional-effect side of the platform haptics API
///
/// Effects are infinite-duration; `run_effect` starts playback until the effect
/// is destroyed or the device closed.
pub trait HapticDevice: Send {
    fn capabilities(&self) -> HapticCapabilities;

    /// Auto-centering strength in percent, 0 disables it
    fn set_autocenter(&mut self, percent: u16) -> Result<(), HapticError>;

    /// Overall output gain in percent
    fn set_gain(&mut self, percent: u16) -> Result<(), HapticError>;

    fn create_effect(&mut self, kind: EffectKind) -> Result<EffectId, HapticError>;

    fn run_effect(&mut self, id: EffectId) -> Result<(), HapticError>;

    fn update_effect(&mut self, id: EffectId, params: ConditionParams) -> Result<(), HapticError>;

    fn destroy_effect(&mut self, id: EffectId) -> Result<(), HapticError>;
}
