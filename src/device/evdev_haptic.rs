//! Linux conditional haptics through the evdev force-feedback interface
//!
//! gilrs only knows rumble, so the event node of the opened gamepad is located
//! by vendor/product id and driven directly. Damper is never advertised: the
//! kernel takes condition parameters for FF_DAMPER, but the evdev crate models
//! `FFEffectKind::Damper` as a unit variant with nowhere to put them, so an upload
//! would always play with zero coefficients.

use super::backend::{
    ConditionParams, EffectId, EffectKind, HapticCapabilities, HapticDevice, HapticError,
};
use evdev::{
    Device, EventType, FFCondition, FFEffect, FFEffectData, FFEffectKind, FFEffectType, FFReplay,
    FFTrigger, InputEvent,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct EvdevHaptic {
    device: Device,
    caps: HapticCapabilities,
    effects: HashMap<EffectId, (EffectKind, FFEffect)>,
    next_id: i32,
}

impl EvdevHaptic {
    /// Finds the first event node with the given ids that supports a condition effect
    pub fn open_matching(vendor: u16, product: u16) -> Option<Self> {
        for (path, device) in evdev::enumerate() {
            let input_id = device.input_id();
            if input_id.vendor() != vendor || input_id.product() != product {
                continue;
            }
            let Some(supported) = device.supported_ff() else {
                continue;
            };

            let mut caps = HapticCapabilities::NONE;
            if supported.contains(FFEffectType::FF_SPRING) {
                caps = caps | HapticCapabilities::SPRING;
            }
            if supported.contains(FFEffectType::FF_FRICTION) {
                caps = caps | HapticCapabilities::FRICTION;
            }
            if supported.contains(FFEffectType::FF_GAIN) {
                caps = caps | HapticCapabilities::GAIN;
            }
            if supported.contains(FFEffectType::FF_AUTOCENTER) {
                caps = caps | HapticCapabilities::AUTOCENTER;
            }
            if supported.contains(FFEffectType::FF_DAMPER) {
                debug!("{} reports FF_DAMPER, not driven", path.display());
            }

            if !caps.supports(EffectKind::Spring) && !caps.supports(EffectKind::Friction) {
                debug!("{} has no usable condition effects", path.display());
                continue;
            }

            info!(
                "Using {} ({}) for haptics, capabilities {:#x}",
                path.display(),
                device.name().unwrap_or("unnamed"),
                caps.0
            );
            return Some(Self {
                device,
                caps,
                effects: HashMap::new(),
                next_id: 0,
            });
        }

        debug!(
            "No force-feedback node found for {:04x}:{:04x}",
            vendor, product
        );
        None
    }

    fn effect_data(kind: EffectKind, params: ConditionParams) -> Result<FFEffectData, HapticError> {
        let condition = FFCondition {
            right_saturation: params.right_sat,
            left_saturation: params.left_sat,
            right_coefficient: params.right_coeff,
            left_coefficient: params.left_coeff,
            deadband: params.deadband,
            center: params.center,
        };
        // steering is a single axis, the second condition stays neutral
        let neutral = FFCondition {
            right_saturation: 0,
            left_saturation: 0,
            right_coefficient: 0,
            left_coefficient: 0,
            deadband: 0,
            center: 0,
        };
        let conditions = [condition, neutral];

        let kind = match kind {
            EffectKind::Spring => FFEffectKind::Spring {
                condition: conditions,
            },
            EffectKind::Friction => FFEffectKind::Friction {
                condition: conditions,
            },
            // FFEffectKind::Damper has no condition fields
            EffectKind::Damper => return Err(HapticError::Unsupported(EffectKind::Damper)),
        };

        Ok(FFEffectData {
            direction: 0,
            trigger: FFTrigger {
                button: 0,
                interval: 0,
            },
            // zero length plays until the effect is erased
            replay: FFReplay {
                length: 0,
                delay: 0,
            },
            kind,
        })
    }

    fn write_ff_setting(&mut self, code: FFEffectType, percent: u16) -> Result<(), HapticError> {
        let value = (u32::from(percent.min(100)) * 0xFFFF / 100) as i32;
        self.device
            .send_events(&[InputEvent::new(EventType::FORCEFEEDBACK, code.0, value)])
            .map_err(|e| HapticError::DeviceError(e.to_string()))
    }

    fn effect_mut(&mut self, id: EffectId) -> Result<&mut (EffectKind, FFEffect), HapticError> {
        self.effects
            .get_mut(&id)
            .ok_or(HapticError::UnknownEffect(id))
    }
}

impl HapticDevice for EvdevHaptic {
    fn capabilities(&self) -> HapticCapabilities {
        self.caps
    }

    fn set_autocenter(&mut self, percent: u16) -> Result<(), HapticError> {
        if !self.caps.contains(HapticCapabilities::AUTOCENTER) {
            debug!("Autocenter not supported, skipping");
            return Ok(());
        }
        self.write_ff_setting(FFEffectType::FF_AUTOCENTER, percent)
    }

    fn set_gain(&mut self, percent: u16) -> Result<(), HapticError> {
        if !self.caps.contains(HapticCapabilities::GAIN) {
            debug!("Gain not supported, skipping");
            return Ok(());
        }
        self.write_ff_setting(FFEffectType::FF_GAIN, percent)
    }

    fn create_effect(&mut self, kind: EffectKind) -> Result<EffectId, HapticError> {
        if !self.caps.supports(kind) {
            return Err(HapticError::Unsupported(kind));
        }
        let data = Self::effect_data(kind, ConditionParams::symmetric(0))?;
        let effect = self
            .device
            .upload_ff_effect(data)
            .map_err(|e| HapticError::DeviceError(e.to_string()))?;

        let id = EffectId(self.next_id);
        self.next_id += 1;
        self.effects.insert(id, (kind, effect));
        Ok(id)
    }

    fn run_effect(&mut self, id: EffectId) -> Result<(), HapticError> {
        let (_, effect) = self.effect_mut(id)?;
        effect
            .play(1)
            .map_err(|e| HapticError::DeviceError(e.to_string()))
    }

    fn update_effect(&mut self, id: EffectId, params: ConditionParams) -> Result<(), HapticError> {
        let (kind, effect) = self.effect_mut(id)?;
        let data = Self::effect_data(*kind, params)?;
        effect
            .update(data)
            .map_err(|e| HapticError::DeviceError(e.to_string()))
    }

    fn destroy_effect(&mut self, id: EffectId) -> Result<(), HapticError> {
        match self.effects.remove(&id) {
            // dropping the effect erases it from the device
            Some(_) => Ok(()),
            None => {
                warn!("Destroy of unknown effect {:?}", id);
                Err(HapticError::UnknownEffect(id))
            }
        }
    }
}
