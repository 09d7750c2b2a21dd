//! OSC wire codec
//!
//! Outbound: `<address> "axis" <int> <float>`, `<address> "button" <int> <int>`
//! and `<address> "hat" <int> <int> <int>`.
//! Inbound: `/ffb/spring`, `/ffb/damper` and `/ffb/friction` with a numeric
//! first argument. Anything else is dropped without an error.

use super::error::TransportError;
use crate::controller::OutboundMessage;
use crate::device::EffectKind;
use crate::persistence::profile::clamp_percent;
use rosc::{OscMessage, OscPacket, OscType};
use tracing::debug;

/// A remote strength change, already clamped to [0, 100]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FfbCommand {
    pub kind: EffectKind,
    pub percent: f64,
}

impl FfbCommand {
    pub fn address(&self) -> String {
        ffb_address(self.kind)
    }
}

pub fn ffb_address(kind: EffectKind) -> String {
    format!("/ffb/{}", kind.as_str())
}

fn outbound_args(message: &OutboundMessage) -> Vec<OscType> {
    let kind = OscType::String(message.kind().to_string());
    match message {
        OutboundMessage::Axis { id, value } => {
            vec![kind, OscType::Int(*id), OscType::Float(*value as f32)]
        }
        OutboundMessage::Button { id, pressed } => {
            vec![kind, OscType::Int(*id), OscType::Int(i32::from(*pressed))]
        }
        OutboundMessage::Hat { id, x, y } => vec![
            kind,
            OscType::Int(*id),
            OscType::Int(i32::from(*x)),
            OscType::Int(i32::from(*y)),
        ],
    }
}

pub fn encode_outbound(address: &str, message: &OutboundMessage) -> Result<Vec<u8>, TransportError> {
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: outbound_args(message),
    });
    rosc::encoder::encode(&packet).map_err(|e| TransportError::Encode(format!("{:?}", e)))
}

/// Extracts every FFB command from a datagram, bundles included
pub fn decode_inbound(datagram: &[u8]) -> Result<Vec<FfbCommand>, TransportError> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)
        .map_err(|e| TransportError::Decode(format!("{:?}", e)))?;
    let mut commands = Vec::new();
    collect_commands(packet, &mut commands);
    Ok(commands)
}

fn collect_commands(packet: OscPacket, commands: &mut Vec<FfbCommand>) {
    match packet {
        OscPacket::Message(message) => {
            if let Some(command) = parse_ffb(&message) {
                commands.push(command);
            }
        }
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                collect_commands(packet, commands);
            }
        }
    }
}

fn parse_ffb(message: &OscMessage) -> Option<FfbCommand> {
    let kind = EffectKind::ALL
        .into_iter()
        .find(|kind| message.addr == ffb_address(*kind));
    let Some(kind) = kind else {
        debug!("Ignoring OSC message for {}", message.addr);
        return None;
    };

    let value = match message.args.first() {
        Some(OscType::Float(v)) => f64::from(*v),
        Some(OscType::Double(v)) => *v,
        Some(OscType::Int(v)) => f64::from(*v),
        Some(OscType::Long(v)) => *v as f64,
        Some(OscType::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                debug!("Ignoring non-numeric {} payload {:?}", message.addr, s);
                return None;
            }
        },
        other => {
            debug!("Ignoring {} with payload {:?}", message.addr, other);
            return None;
        }
    };

    if !value.is_finite() {
        debug!("Ignoring non-finite {} payload", message.addr);
        return None;
    }

    Some(FfbCommand {
        kind,
        percent: clamp_percent(value),
    })
}
