//! Haptics subsystem
//!
//! [`HapticController`] owns the lifecycle of the spring, damper and friction
//! condition effects on the open device:
//!
//! ```text
//! Unsupported ──► Created ──► Running ──► Updated
//!      ▲                                     │
//!      └──────────── detach / reselect ──────┘
//! ```
//!
//! Inbound `/ffb/*` commands reach it only through the bridge, never directly
//! from the listener task.

pub mod controller;

pub use controller::{coefficient, EffectState, HapticController};
