//! Profile data model and its on-disk schema
//!
//! Profiles are read leniently: every key is optional, ports and ids may be
//! strings or numbers, and unparsable map indices are skipped. They are always
//! written back in one canonical shape (ports and ids as strings, index keys as
//! decimal strings) so a load of a saved profile reproduces it exactly.

use crate::device::EffectKind;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "4041";
pub const DEFAULT_LISTEN_PORT: &str = "4042";
pub const DEFAULT_OSC_ADDRESS: &str = "/wheel/input";

pub const DEFAULT_SPRING: f64 = 50.0;
pub const DEFAULT_DAMPER: f64 = 20.0;
pub const DEFAULT_FRICTION: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile '{0}' is reserved and cannot be deleted")]
    ReservedProfile(String),

    #[error("Profile '{0}' does not exist")]
    ProfileNotFound(String),

    #[error("Profile '{0}' already exists")]
    ProfileExists(String),

    #[error("Invalid profile name: {0:?}")]
    InvalidName(String),

    #[error("Invalid axis configuration: {0}")]
    InvalidAxis(String),

    #[error("Not allowed while streaming, stop streaming first")]
    StreamingActive,
}

/// Where outbound messages go and where inbound FFB commands arrive
///
/// Kept as the operator typed it; ports are only parsed when streaming starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTarget {
    pub ip: String,
    pub port: String,
    pub listen_port: String,
    pub osc_address: String,
}

impl Default for NetworkTarget {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT.to_string(),
            listen_port: DEFAULT_LISTEN_PORT.to_string(),
            osc_address: DEFAULT_OSC_ADDRESS.to_string(),
        }
    }
}

/// FFB strengths in percent, always within [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FfbStrengths {
    pub spring: f64,
    pub damper: f64,
    pub friction: f64,
}

impl Default for FfbStrengths {
    fn default() -> Self {
        Self {
            spring: DEFAULT_SPRING,
            damper: DEFAULT_DAMPER,
            friction: DEFAULT_FRICTION,
        }
    }
}

impl FfbStrengths {
    pub fn get(&self, kind: EffectKind) -> f64 {
        match kind {
            EffectKind::Spring => self.spring,
            EffectKind::Damper => self.damper,
            EffectKind::Friction => self.friction,
        }
    }

    pub fn set(&mut self, kind: EffectKind, percent: f64) {
        let percent = clamp_percent(percent);
        match kind {
            EffectKind::Spring => self.spring = percent,
            EffectKind::Damper => self.damper = percent,
            EffectKind::Friction => self.friction = percent,
        }
    }
}

/// Clamps a strength into [0, 100]; NaN becomes 0
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Signal conditioning and output id of one hardware axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisConfig {
    /// Output id as entered, parsed when a message is built
    pub osc_id: String,
    pub inverted: bool,
    pub sensitivity: f64,
    pub deadzone: f64,
}

impl AxisConfig {
    pub fn for_index(index: usize) -> Self {
        Self {
            osc_id: index.to_string(),
            inverted: false,
            sensitivity: 1.0,
            deadzone: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(ProfileError::InvalidAxis(format!(
                "sensitivity must be a positive number, got {}",
                self.sensitivity
            )));
        }
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(ProfileError::InvalidAxis(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }
        Ok(())
    }
}

/// One named configuration set
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawProfile")]
pub struct Profile {
    pub network: NetworkTarget,
    pub ffb: FfbStrengths,
    pub axes: BTreeMap<usize, AxisConfig>,
    pub buttons: BTreeMap<usize, String>,
    pub hats: BTreeMap<usize, String>,
}

impl Profile {
    /// Axis config for `index`, the per-index default when none is stored
    pub fn axis(&self, index: usize) -> AxisConfig {
        self.axes
            .get(&index)
            .cloned()
            .unwrap_or_else(|| AxisConfig::for_index(index))
    }

    pub fn button_id(&self, index: usize) -> &str {
        self.buttons.get(&index).map(String::as_str).unwrap_or("")
    }

    pub fn hat_id(&self, index: usize) -> &str {
        self.hats.get(&index).map(String::as_str).unwrap_or("")
    }

    /// Registers defaults for every index of a newly opened device that has no entry yet
    pub fn ensure_indices(&mut self, axes: usize, buttons: usize, hats: usize) {
        for index in 0..axes {
            self.axes
                .entry(index)
                .or_insert_with(|| AxisConfig::for_index(index));
        }
        for index in 0..buttons {
            self.buttons.entry(index).or_insert_with(|| index.to_string());
        }
        for index in 0..hats {
            self.hats.entry(index).or_insert_with(|| index.to_string());
        }
    }

    /// Restores every known axis, button and hat to its identity mapping
    pub fn reset_mappings(&mut self) {
        for (index, axis) in self.axes.iter_mut() {
            *axis = AxisConfig::for_index(*index);
        }
        for (index, id) in self.buttons.iter_mut() {
            *id = index.to_string();
        }
        for (index, id) in self.hats.iter_mut() {
            *id = index.to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Writing

#[derive(Serialize)]
struct ProfileRecord<'a> {
    ip: &'a str,
    port: &'a str,
    listen_port: &'a str,
    osc_address: &'a str,
    ffb_spring: f64,
    ffb_damper: f64,
    ffb_friction: f64,
    axes: BTreeMap<String, &'a AxisConfig>,
    buttons: BTreeMap<String, &'a str>,
    hats: BTreeMap<String, &'a str>,
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ProfileRecord {
            ip: &self.network.ip,
            port: &self.network.port,
            listen_port: &self.network.listen_port,
            osc_address: &self.network.osc_address,
            ffb_spring: self.ffb.spring,
            ffb_damper: self.ffb.damper,
            ffb_friction: self.ffb.friction,
            axes: self.axes.iter().map(|(i, a)| (i.to_string(), a)).collect(),
            buttons: self
                .buttons
                .iter()
                .map(|(i, id)| (i.to_string(), id.as_str()))
                .collect(),
            hats: self
                .hats
                .iter()
                .map(|(i, id)| (i.to_string(), id.as_str()))
                .collect(),
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Reading

/// A scalar that older documents may have stored as a string, a number or a bool
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Lenient {
    fn into_text(self) -> String {
        match self {
            Lenient::Text(s) => s,
            Lenient::Int(i) => i.to_string(),
            Lenient::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                (f as i64).to_string()
            }
            Lenient::Float(f) => f.to_string(),
            Lenient::Bool(b) => b.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Lenient::Int(i) => Some(*i as f64),
            Lenient::Float(f) => Some(*f),
            Lenient::Text(s) => s.trim().parse().ok(),
            Lenient::Bool(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Lenient::Bool(b) => Some(*b),
            Lenient::Int(i) => Some(*i != 0),
            Lenient::Float(f) => Some(*f != 0.0),
            Lenient::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAxis {
    osc_id: Option<Lenient>,
    inverted: Option<Lenient>,
    sensitivity: Option<Lenient>,
    deadzone: Option<Lenient>,
}

impl RawAxis {
    /// Builds the axis config, replacing any field that fails validation by its default
    fn into_config(self, index: usize) -> AxisConfig {
        let mut config = AxisConfig::for_index(index);
        if let Some(osc_id) = self.osc_id {
            config.osc_id = osc_id.into_text();
        }
        if let Some(inverted) = self.inverted.and_then(|v| v.as_bool()) {
            config.inverted = inverted;
        }

        if let Some(sensitivity) = self.sensitivity.and_then(|v| v.as_f64()) {
            let candidate = AxisConfig {
                sensitivity,
                ..config.clone()
            };
            match candidate.validate() {
                Ok(()) => config = candidate,
                Err(e) => warn!("Axis {}: {}, using {}", index, e, config.sensitivity),
            }
        }
        if let Some(deadzone) = self.deadzone.and_then(|v| v.as_f64()) {
            let candidate = AxisConfig {
                deadzone,
                ..config.clone()
            };
            match candidate.validate() {
                Ok(()) => config = candidate,
                Err(e) => warn!("Axis {}: {}, using {}", index, e, config.deadzone),
            }
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProfile {
    ip: Option<Lenient>,
    port: Option<Lenient>,
    listen_port: Option<Lenient>,
    osc_address: Option<Lenient>,
    ffb_spring: Option<Lenient>,
    // name used before damper and friction existed
    ffb_stiffness: Option<Lenient>,
    ffb_damper: Option<Lenient>,
    ffb_friction: Option<Lenient>,
    axes: BTreeMap<String, RawAxis>,
    buttons: BTreeMap<String, Lenient>,
    hats: BTreeMap<String, Lenient>,
}

fn parse_index(section: &str, key: &str) -> Option<usize> {
    match key.trim().parse() {
        Ok(index) => Some(index),
        Err(_) => {
            warn!("Skipping {} entry with non-numeric index {:?}", section, key);
            None
        }
    }
}

fn index_map(section: &str, raw: BTreeMap<String, Lenient>) -> BTreeMap<usize, String> {
    raw.into_iter()
        .filter_map(|(key, value)| parse_index(section, &key).map(|i| (i, value.into_text())))
        .collect()
}

fn text_or(value: Option<Lenient>, default: &str) -> String {
    value
        .map(Lenient::into_text)
        .unwrap_or_else(|| default.to_string())
}

fn percent_or(value: Option<&Lenient>, default: f64) -> f64 {
    clamp_percent(value.and_then(Lenient::as_f64).unwrap_or(default))
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        let spring = raw.ffb_spring.as_ref().or(raw.ffb_stiffness.as_ref());

        Profile {
            network: NetworkTarget {
                ip: text_or(raw.ip, DEFAULT_IP),
                port: text_or(raw.port, DEFAULT_PORT),
                listen_port: text_or(raw.listen_port, DEFAULT_LISTEN_PORT),
                osc_address: text_or(raw.osc_address, DEFAULT_OSC_ADDRESS),
            },
            ffb: FfbStrengths {
                spring: percent_or(spring, DEFAULT_SPRING),
                damper: percent_or(raw.ffb_damper.as_ref(), DEFAULT_DAMPER),
                friction: percent_or(raw.ffb_friction.as_ref(), DEFAULT_FRICTION),
            },
            axes: raw
                .axes
                .into_iter()
                .filter_map(|(key, axis)| {
                    parse_index("axes", &key).map(|i| (i, axis.into_config(i)))
                })
                .collect(),
            buttons: index_map("buttons", raw.buttons),
            hats: index_map("hats", raw.hats),
        }
    }
}
