//! Device classification and button display names
//!
//! Both functions here are pure lookups on the device name. The button labels
//! are presentation metadata: nothing in this file feeds the numeric ids that go
//! out on the wire.

use super::backend::DeviceTypeTag;
use serde::{Deserialize, Serialize};

const WHEEL_KEYWORDS: [&str; 7] = [
    "wheel",
    "racing",
    "g29",
    "g920",
    "thrustmaster",
    "fanatec",
    "moza",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Wheel,
    Standard,
}

impl DeviceClass {
    pub fn classify(type_tag: DeviceTypeTag, name: &str) -> Self {
        let name = name.to_lowercase();
        if type_tag == DeviceTypeTag::Wheel || WHEEL_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            DeviceClass::Wheel
        } else {
            DeviceClass::Standard
        }
    }
}

/// Known controller families with their own button naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonFamily {
    PlayStation,
    Nintendo,
    LogitechWheel,
    Xbox,
    Generic,
}

const PLAYSTATION_LABELS: &[&str] = &[
    "Cross / A",
    "Circle / B",
    "Square / X",
    "Triangle / Y",
    "Share",
    "Playstation Button",
    "Options",
    "L Thumbstick Button",
    "R Thumbstick Button",
    "L1",
    "R1",
    "D-pad UP",
    "D-pad DOWN",
    "D-pad LEFT",
    "D-pad RIGHT",
    "Pad",
];

const NINTENDO_LABELS: &[&str] = &[
    "B", "A", "Y", "X", "L", "R", "ZL", "ZR", "Minus", "Plus", "L3", "R3", "Home", "Capture",
];

const LOGITECH_WHEEL_LABELS: &[&str] = &[
    "Cross",
    "Square",
    "Circle",
    "Triangle",
    "R-Paddle",
    "L-Paddle",
    "Options",
    "Share",
    "RSB",
    "LSB",
    "Center Logo Button",
    "L3",
    "Gear 1",
    "Gear 2",
    "Gear 3",
    "Gear 4",
    "Gear 5",
    "Gear 6",
    "Gear R",
    "Plus",
    "Minus",
    "Dial R",
    "Dial L",
    "Enter",
];

const XBOX_LABELS: &[&str] = &[
    "A", "B", "X", "Y", "LB", "RB", "Back", "Start", "LS", "RS", "Guide",
];

impl ButtonFamily {
    /// Picks the family from the device name, first match wins
    pub fn detect(name: &str) -> Self {
        let name = name.to_lowercase();
        let matches = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if matches(&["playstation", "dualshock", "dualsense", "ps4", "ps5"]) {
            ButtonFamily::PlayStation
        } else if matches(&["nintendo", "switch", "pro controller", "joy-con"]) {
            ButtonFamily::Nintendo
        } else if matches(&["g29", "g920", "g923"]) {
            ButtonFamily::LogitechWheel
        } else if matches(&["xbox", "xinput", "controller", "gamepad"]) {
            // generic pads default to the XInput layout
            ButtonFamily::Xbox
        } else {
            ButtonFamily::Generic
        }
    }

    fn table(&self) -> &'static [&'static str] {
        match self {
            ButtonFamily::PlayStation => PLAYSTATION_LABELS,
            ButtonFamily::Nintendo => NINTENDO_LABELS,
            ButtonFamily::LogitechWheel => LOGITECH_WHEEL_LABELS,
            ButtonFamily::Xbox => XBOX_LABELS,
            ButtonFamily::Generic => &[],
        }
    }

    pub fn label(&self, index: usize) -> String {
        self.table()
            .get(index)
            .map(|label| label.to_string())
            .unwrap_or_else(|| format!("Btn {}", index))
    }
}
