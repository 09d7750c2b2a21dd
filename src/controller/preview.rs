//! Read-only visualization frame
//!
//! Built on the preview tick from its own snapshot. It uses the same transform
//! as the polling engine but never touches [`super::PollState`].

use super::transform::{resolve_output_id, transform};
use crate::device::{DeviceSnapshot, DeviceSummary};
use crate::persistence::Profile;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisPreview {
    pub index: usize,
    pub output_id: i32,
    pub raw: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonPreview {
    pub index: usize,
    pub output_id: i32,
    pub label: String,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HatPreview {
    pub index: usize,
    pub output_id: i32,
    pub x: i8,
    pub y: i8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewFrame {
    pub device: Option<DeviceSummary>,
    pub streaming: bool,
    pub axes: Vec<AxisPreview>,
    pub buttons: Vec<ButtonPreview>,
    pub hats: Vec<HatPreview>,
}

impl PreviewFrame {
    pub fn build(
        device: DeviceSummary,
        snapshot: &DeviceSnapshot,
        profile: &Profile,
        streaming: bool,
    ) -> Self {
        let axes = snapshot
            .axes
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let config = profile.axis(index);
                AxisPreview {
                    index,
                    output_id: resolve_output_id(&config.osc_id, index),
                    raw: *raw,
                    value: transform(*raw, &config),
                }
            })
            .collect();

        let buttons = snapshot
            .buttons
            .iter()
            .enumerate()
            .map(|(index, pressed)| ButtonPreview {
                index,
                output_id: resolve_output_id(profile.button_id(index), index),
                label: device.family.label(index),
                pressed: *pressed,
            })
            .collect();

        let hats = snapshot
            .hats
            .iter()
            .enumerate()
            .map(|(index, bitmask)| {
                let (x, y) = DeviceSnapshot::hat_direction(*bitmask);
                HatPreview {
                    index,
                    output_id: resolve_output_id(profile.hat_id(index), index),
                    x,
                    y,
                }
            })
            .collect();

        Self {
            device: Some(device),
            streaming,
            axes,
            buttons,
            hats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::backend::HAT_RIGHT;
    use crate::device::{ButtonFamily, DeviceClass};
    use crate::persistence::AxisConfig;

    fn summary() -> DeviceSummary {
        DeviceSummary {
            index: 0,
            name: "Sony DualSense".to_string(),
            class: DeviceClass::Standard,
            family: ButtonFamily::PlayStation,
            axis_count: 1,
            button_count: 2,
            hat_count: 1,
            has_haptics: false,
        }
    }

    #[test]
    fn frame_carries_raw_transformed_and_labels() {
        let mut profile = Profile::default();
        profile.axes.insert(
            0,
            AxisConfig {
                osc_id: "5".to_string(),
                inverted: false,
                sensitivity: 2.0,
                deadzone: 0.0,
            },
        );
        let snapshot = DeviceSnapshot {
            axes: vec![0.3],
            buttons: vec![true, false],
            hats: vec![HAT_RIGHT],
        };

        let frame = PreviewFrame::build(summary(), &snapshot, &profile, true);

        assert!(frame.streaming);
        assert_eq!(
            frame.axes,
            vec![AxisPreview {
                index: 0,
                output_id: 5,
                raw: 0.3,
                value: 0.6,
            }]
        );
        assert_eq!(frame.buttons[0].label, "Cross / A");
        assert_eq!(frame.buttons[1].label, "Circle / B");
        assert!(frame.buttons[0].pressed);
        assert_eq!(frame.hats[0].x, 1);
        assert_eq!(frame.hats[0].y, 0);
    }
}
