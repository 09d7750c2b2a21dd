//! Controller subsystem: turning device snapshots into output values
//!
//! 1. [`transform`] - Per-axis signal conditioning and output id remapping
//! 2. [`poll`] - Change detection producing one message per changed index
//! 3. [`preview`] - Read-only frames for visualization
//!
//! ```text
//! DeviceSnapshot ──► PollState::diff ──► OutboundMessage ──► osc
//!       │                  │
//!       └──► PreviewFrame ◄┘ (same transform, no state)
//! ```

pub mod poll;
pub mod preview;
pub mod transform;

pub use poll::{OutboundMessage, PollState};
pub use preview::PreviewFrame;
pub use transform::{resolve_output_id, transform};
