//! Polling & Change-Detection Engine
//!
//! Each tick takes one [`DeviceSnapshot`], compares it with what was seen last
//! and produces exactly one [`OutboundMessage`] per changed index. Axes are
//! compared on the raw sample rounded to three decimals, buttons on their
//! state and hats on the discretized (x, y) pair.

use super::transform::{resolve_output_id, round3, transform};
use crate::device::DeviceSnapshot;
use crate::persistence::Profile;
use std::collections::HashMap;
use std::fmt;

/// One state change ready to go on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Axis { id: i32, value: f64 },
    Button { id: i32, pressed: bool },
    Hat { id: i32, x: i8, y: i8 },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Axis { .. } => "axis",
            OutboundMessage::Button { .. } => "button",
            OutboundMessage::Hat { .. } => "hat",
        }
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundMessage::Axis { id, value } => write!(f, "[\"axis\", {}, {}]", id, value),
            OutboundMessage::Button { id, pressed } => {
                write!(f, "[\"button\", {}, {}]", id, u8::from(*pressed))
            }
            OutboundMessage::Hat { id, x, y } => write!(f, "[\"hat\", {}, {}, {}]", id, x, y),
        }
    }
}

/// Last observed value of every index, owned by the streaming session
#[derive(Debug, Default, Clone)]
pub struct PollState {
    axes: HashMap<usize, f64>,
    buttons: HashMap<usize, bool>,
    hats: HashMap<usize, (i8, i8)>,
}

impl PollState {
    pub fn reset(&mut self) {
        self.axes.clear();
        self.buttons.clear();
        self.hats.clear();
    }

    /// Records `snapshot` and returns the messages for every index that changed
    ///
    /// After a reset every index counts as changed, so the first tick of a
    /// session publishes the full device state.
    pub fn diff(&mut self, snapshot: &DeviceSnapshot, profile: &Profile) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();

        for (index, raw) in snapshot.axes.iter().enumerate() {
            let sample = round3(*raw);
            if self.axes.get(&index) == Some(&sample) {
                continue;
            }
            self.axes.insert(index, sample);

            let config = profile.axis(index);
            messages.push(OutboundMessage::Axis {
                id: resolve_output_id(&config.osc_id, index),
                value: transform(sample, &config),
            });
        }

        for (index, pressed) in snapshot.buttons.iter().enumerate() {
            if self.buttons.get(&index) == Some(pressed) {
                continue;
            }
            self.buttons.insert(index, *pressed);
            messages.push(OutboundMessage::Button {
                id: resolve_output_id(profile.button_id(index), index),
                pressed: *pressed,
            });
        }

        for (index, bitmask) in snapshot.hats.iter().enumerate() {
            let direction = DeviceSnapshot::hat_direction(*bitmask);
            if self.hats.get(&index) == Some(&direction) {
                continue;
            }
            self.hats.insert(index, direction);
            messages.push(OutboundMessage::Hat {
                id: resolve_output_id(profile.hat_id(index), index),
                x: direction.0,
                y: direction.1,
            });
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::backend::{HAT_DOWN, HAT_LEFT, HAT_UP};
    use crate::persistence::AxisConfig;

    fn snapshot(axes: Vec<f64>, buttons: Vec<bool>, hats: Vec<u8>) -> DeviceSnapshot {
        DeviceSnapshot {
            axes,
            buttons,
            hats,
        }
    }

    #[test]
    fn first_tick_publishes_everything() {
        let mut state = PollState::default();
        let messages = state.diff(
            &snapshot(vec![0.25, -1.0], vec![false, true], vec![HAT_UP]),
            &Profile::default(),
        );
        assert_eq!(
            messages,
            vec![
                OutboundMessage::Axis { id: 0, value: 0.25 },
                OutboundMessage::Axis { id: 1, value: -1.0 },
                OutboundMessage::Button {
                    id: 0,
                    pressed: false
                },
                OutboundMessage::Button {
                    id: 1,
                    pressed: true
                },
                OutboundMessage::Hat { id: 0, x: 0, y: 1 },
            ]
        );
    }

    #[test]
    fn repeated_sample_emits_once() {
        let mut state = PollState::default();
        let profile = Profile::default();
        let sample = snapshot(vec![0.5], vec![true], vec![HAT_LEFT]);

        assert_eq!(state.diff(&sample, &profile).len(), 3);
        assert!(state.diff(&sample, &profile).is_empty());
        assert!(state.diff(&sample, &profile).is_empty());
    }

    #[test]
    fn only_changed_indices_are_sent() {
        let mut state = PollState::default();
        let profile = Profile::default();
        state.diff(&snapshot(vec![0.0, 0.0], vec![false, false], vec![0]), &profile);

        let messages = state.diff(
            &snapshot(vec![0.0, 0.3], vec![false, true], vec![0]),
            &profile,
        );
        assert_eq!(
            messages,
            vec![
                OutboundMessage::Axis { id: 1, value: 0.3 },
                OutboundMessage::Button {
                    id: 1,
                    pressed: true
                },
            ]
        );
    }

    #[test]
    fn sub_resolution_jitter_is_ignored() {
        let mut state = PollState::default();
        let profile = Profile::default();
        state.diff(&snapshot(vec![0.1234], vec![], vec![]), &profile);
        assert!(state
            .diff(&snapshot(vec![0.12349], vec![], vec![]), &profile)
            .is_empty());
    }

    #[test]
    fn hats_compare_direction_not_bitmask() {
        let mut state = PollState::default();
        let profile = Profile::default();
        state.diff(&snapshot(vec![], vec![], vec![HAT_UP]), &profile);
        // down is shadowed by up, so the direction is unchanged
        assert!(state
            .diff(&snapshot(vec![], vec![], vec![HAT_UP | HAT_DOWN]), &profile)
            .is_empty());
    }

    #[test]
    fn remapped_ids_and_transform_are_applied() {
        let mut profile = Profile::default();
        profile.axes.insert(
            0,
            AxisConfig {
                osc_id: "12".to_string(),
                inverted: true,
                sensitivity: 1.0,
                deadzone: 0.1,
            },
        );
        profile.buttons.insert(0, "30".to_string());
        profile.hats.insert(0, "oops".to_string());

        let mut state = PollState::default();
        let messages = state.diff(
            &snapshot(vec![0.5], vec![true], vec![HAT_DOWN]),
            &profile,
        );
        assert_eq!(
            messages,
            vec![
                OutboundMessage::Axis {
                    id: 12,
                    value: -0.444
                },
                OutboundMessage::Button {
                    id: 30,
                    pressed: true
                },
                OutboundMessage::Hat { id: 0, x: 0, y: -1 },
            ]
        );
    }

    #[test]
    fn reset_republishes_state() {
        let mut state = PollState::default();
        let profile = Profile::default();
        let sample = snapshot(vec![0.7], vec![], vec![]);
        state.diff(&sample, &profile);
        state.reset();
        assert_eq!(state.diff(&sample, &profile).len(), 1);
    }

    #[test]
    fn display_matches_wire_arguments() {
        let axis = OutboundMessage::Axis { id: 2, value: 0.5 };
        let button = OutboundMessage::Button {
            id: 1,
            pressed: true,
        };
        let hat = OutboundMessage::Hat { id: 0, x: -1, y: 1 };
        assert_eq!(axis.to_string(), "[\"axis\", 2, 0.5]");
        assert_eq!(button.to_string(), "[\"button\", 1, 1]");
        assert_eq!(hat.to_string(), "[\"hat\", 0, -1, 1]");
        assert_eq!(hat.kind(), "hat");
    }
}
