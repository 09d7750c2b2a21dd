//! Protocol Transport over OSC/UDP
//!
//! - [`message`] - rosc based codec for outbound state and inbound `/ffb/*` commands
//! - [`session`] - [`StreamSession`] typestate owning both sockets for one streaming run
//! - [`listener`] - Inbound task forwarding [`FfbCommand`]s to the bridge
//! - [`error`] - [`TransportError`]
//!
//! ```text
//! PollState ──► encode ──► UDP out (fire-and-forget)
//! UDP in ──► listener task ──► mpsc ──► Bridge ──► HapticController
//! ```

pub mod error;
pub mod listener;
pub mod message;
pub mod session;

pub use error::TransportError;
pub use message::FfbCommand;
pub use session::{SessionState, StreamSession, Streaming, TickReport};
