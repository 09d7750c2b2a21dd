//! Axis Transform Pipeline
//!
//! Pure functions only. The polling engine and the preview both call
//! [`transform`] with the same configuration and must see the same number.

use crate::persistence::AxisConfig;

/// Maps a raw normalized axis sample to its output value
///
/// Deadzone, rescale, sensitivity, inversion, clamp to [-1, 1], round to three
/// decimals, in that order. A deadzone of 1 or more silences the axis, and so
/// does a configuration that produces a non-finite value.
pub fn transform(raw: f64, config: &AxisConfig) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }

    let magnitude = raw.abs();
    let mut value = if magnitude < config.deadzone || config.deadzone >= 1.0 {
        0.0
    } else {
        raw.signum() * (magnitude - config.deadzone) / (1.0 - config.deadzone)
    };

    value *= config.sensitivity;
    if config.inverted {
        value = -value;
    }
    if !value.is_finite() {
        return 0.0;
    }

    let value = round3(value.clamp(-1.0, 1.0));
    // no negative zero on the wire
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Output id for a hardware index: the configured id when it parses, the index otherwise
pub fn resolve_output_id(configured: &str, index: usize) -> i32 {
    configured
        .trim()
        .parse()
        .unwrap_or_else(|_| i32::try_from(index).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(deadzone: f64, sensitivity: f64, inverted: bool) -> AxisConfig {
        AxisConfig {
            osc_id: "0".to_string(),
            inverted,
            sensitivity,
            deadzone,
        }
    }

    #[test]
    fn deadzone_rescale_examples() {
        let cfg = config(0.1, 1.0, false);
        assert_eq!(transform(-1.0, &cfg), -1.0);
        assert_eq!(transform(0.05, &cfg), 0.0);
        assert_eq!(transform(0.5, &cfg), 0.444);
        assert_eq!(transform(-0.5, &cfg), -0.444);
    }

    #[test]
    fn full_deadzone_silences_axis() {
        let cfg = config(1.0, 1.0, false);
        assert_eq!(transform(1.0, &cfg), 0.0);
        assert_eq!(transform(-0.999, &cfg), 0.0);
    }

    #[test]
    fn sensitivity_saturates_at_unit_range() {
        let cfg = config(0.0, 3.0, false);
        assert_eq!(transform(0.2, &cfg), 0.6);
        assert_eq!(transform(0.5, &cfg), 1.0);
        assert_eq!(transform(-0.5, &cfg), -1.0);
    }

    #[test]
    fn zero_is_never_negative() {
        let cfg = config(0.0, 1.0, true);
        let value = transform(0.0, &cfg);
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
        assert!(transform(-0.0001, &config(0.0, 1.0, false)).is_sign_positive());
    }

    #[test]
    fn non_finite_input_is_zero() {
        let cfg = config(0.0, 1.0, false);
        assert_eq!(transform(f64::NAN, &cfg), 0.0);
        assert_eq!(transform(f64::INFINITY, &cfg), 0.0);
    }

    #[test]
    fn non_finite_config_is_zero() {
        assert_eq!(transform(0.0, &config(0.0, f64::INFINITY, false)), 0.0);
        assert_eq!(transform(0.5, &config(f64::NAN, 1.0, false)), 0.0);
        assert_eq!(transform(0.5, &config(0.0, f64::NAN, true)), 0.0);
        assert_eq!(transform(0.5, &config(f64::NEG_INFINITY, 1.0, false)), 0.0);
    }

    #[test]
    fn output_id_fallback() {
        assert_eq!(resolve_output_id("7", 2), 7);
        assert_eq!(resolve_output_id(" -3 ", 2), -3);
        assert_eq!(resolve_output_id("", 2), 2);
        assert_eq!(resolve_output_id("steer", 5), 5);
        assert_eq!(resolve_output_id("1.5", 4), 4);
    }

    proptest! {
        #[test]
        fn identity_config_only_rounds(raw in -1.0f64..=1.0) {
            let value = transform(raw, &config(0.0, 1.0, false));
            prop_assert_eq!(value, round3(raw) + 0.0);
        }

        #[test]
        fn inside_deadzone_is_zero(deadzone in 0.01f64..1.0, fraction in 0.0f64..1.0, negative in any::<bool>()) {
            let raw = deadzone * fraction * if negative { -1.0 } else { 1.0 };
            prop_assert_eq!(transform(raw, &config(deadzone, 1.0, false)), 0.0);
        }

        #[test]
        fn output_stays_in_unit_range(
            raw in -1.0f64..=1.0,
            deadzone in 0.0f64..1.0,
            sensitivity in 0.001f64..100.0,
            inverted in any::<bool>(),
        ) {
            let value = transform(raw, &config(deadzone, sensitivity, inverted));
            prop_assert!((-1.0..=1.0).contains(&value));
        }

        #[test]
        fn arbitrary_config_never_leaves_unit_range(
            raw in -1.0f64..=1.0,
            deadzone in proptest::num::f64::ANY,
            sensitivity in proptest::num::f64::ANY,
            inverted in any::<bool>(),
        ) {
            let value = transform(raw, &config(deadzone, sensitivity, inverted));
            prop_assert!(value.is_finite());
            prop_assert!((-1.0..=1.0).contains(&value));
        }

        #[test]
        fn inversion_negates(
            raw in -1.0f64..=1.0,
            deadzone in 0.0f64..1.0,
            sensitivity in 0.001f64..10.0,
        ) {
            let plain = transform(raw, &config(deadzone, sensitivity, false));
            let inverted = transform(raw, &config(deadzone, sensitivity, true));
            prop_assert_eq!(inverted, -plain);
        }
    }
}
