//! # Persistence Module
//!
//! Named profiles and the config file they live in.
//!
//! - [`profile`] - The [`Profile`] model with its lenient reader and canonical writer
//! - [`store`] - [`ProfileStore`]: active selection, live edits, load/save and legacy migration
//!
//! ## Error Handling Strategy
//! File I/O and codec failures use `color_eyre` with context. A config file
//! that cannot be read or parsed is never fatal: it is logged and the store
//! starts over with a single empty "Default" profile. Operator mistakes
//! (reserved or unknown names) surface as [`ProfileError`].

pub mod profile;
pub mod store;

pub use profile::{AxisConfig, FfbStrengths, NetworkTarget, Profile, ProfileError};
pub use store::{ConfigFormat, ProfileStore, DEFAULT_PROFILE};
