//! Transport errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// A port field is not an integer in 1..=65535
    #[error("Invalid {field}: {value:?} is not a port number")]
    InvalidPort { field: &'static str, value: String },

    /// The target host cannot be resolved
    #[error("Invalid target {0}")]
    InvalidTarget(String),

    /// Outbound address pattern does not start with '/'
    #[error("Invalid OSC address {0:?}")]
    InvalidAddress(String),

    #[error("Failed to bind {what} socket on port {port}: {source}")]
    BindFailed {
        what: &'static str,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode OSC packet: {0}")]
    Encode(String),

    #[error("Failed to decode OSC packet: {0}")]
    Decode(String),
}
