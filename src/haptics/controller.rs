//! Haptic Effect Controller
//!
//! Keeps one slot per conditional effect. A slot only holds an effect id while
//! the open device advertises that effect; every other slot stays
//! [`EffectState::Unsupported`] and swallows strength updates. The device itself
//! is never stored here, each call borrows it from the device manager.

use crate::device::{ConditionParams, EffectId, EffectKind, HapticDevice};
use crate::persistence::profile::clamp_percent;
use crate::persistence::FfbStrengths;
use tracing::{debug, info, warn};

/// Largest condition coefficient a device accepts
pub const MAX_COEFFICIENT: i16 = i16::MAX;

/// Lifecycle of one effect on the open device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    Unsupported,
    Created(EffectId),
    Running(EffectId),
    Updated(EffectId),
}

impl EffectState {
    fn id(&self) -> Option<EffectId> {
        match self {
            EffectState::Unsupported => None,
            EffectState::Created(id) | EffectState::Running(id) | EffectState::Updated(id) => {
                Some(*id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EffectSlot {
    kind: EffectKind,
    state: EffectState,
    strength: f64,
    // last coefficient pushed to the device
    applied: Option<i16>,
}

/// Converts a strength percentage to a symmetric condition coefficient
pub fn coefficient(percent: f64) -> i16 {
    let scaled = (clamp_percent(percent) / 100.0 * f64::from(MAX_COEFFICIENT)).round();
    scaled as i16
}

#[derive(Debug, Clone)]
pub struct HapticController {
    slots: [EffectSlot; 3],
}

impl HapticController {
    pub fn new(strengths: FfbStrengths) -> Self {
        let slot = |kind: EffectKind| EffectSlot {
            kind,
            state: EffectState::Unsupported,
            strength: strengths.get(kind),
            applied: None,
        };
        Self {
            slots: EffectKind::ALL.map(slot),
        }
    }

    fn slot_mut(&mut self, kind: EffectKind) -> &mut EffectSlot {
        let index = match kind {
            EffectKind::Spring => 0,
            EffectKind::Damper => 1,
            EffectKind::Friction => 2,
        };
        &mut self.slots[index]
    }

    pub fn state(&self, kind: EffectKind) -> EffectState {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map(|slot| slot.state)
            .unwrap_or(EffectState::Unsupported)
    }

    pub fn strength(&self, kind: EffectKind) -> f64 {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map(|slot| slot.strength)
            .unwrap_or(0.0)
    }

    /// Effects currently live on the device
    pub fn active_effects(&self) -> Vec<EffectKind> {
        self.slots
            .iter()
            .filter(|slot| slot.state != EffectState::Unsupported)
            .map(|slot| slot.kind)
            .collect()
    }

    /// Prepares a freshly opened haptic device and arms every supported effect
    ///
    /// Auto-centering is switched off and gain set to maximum, then each
    /// supported effect is created, started and given its current strength.
    pub fn attach(&mut self, haptic: &mut dyn HapticDevice) {
        let caps = haptic.capabilities();
        info!("Attaching haptics, capabilities {:#x}", caps.0);

        if let Err(e) = haptic.set_autocenter(0) {
            warn!("Failed to disable autocenter: {}", e);
        }
        if let Err(e) = haptic.set_gain(100) {
            warn!("Failed to set gain: {}", e);
        }

        for slot in self.slots.iter_mut() {
            slot.applied = None;
            slot.state = EffectState::Unsupported;

            if !caps.supports(slot.kind) {
                debug!("Effect {} not supported by device", slot.kind);
                continue;
            }

            let id = match haptic.create_effect(slot.kind) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Failed to create {} effect: {}", slot.kind, e);
                    continue;
                }
            };
            slot.state = EffectState::Created(id);

            match haptic.run_effect(id) {
                Ok(()) => {
                    slot.state = EffectState::Running(id);
                    debug!("{} effect {:?} running", slot.kind, id);
                }
                Err(e) => warn!("Failed to start {} effect: {}", slot.kind, e),
            }
        }

        for kind in EffectKind::ALL {
            let strength = self.strength(kind);
            self.push(haptic, kind, strength);
        }
    }

    /// Forgets every effect. With a handle the effects are also destroyed on the device.
    pub fn detach(&mut self, haptic: Option<&mut dyn HapticDevice>) {
        if let Some(haptic) = haptic {
            for slot in self.slots.iter() {
                if let Some(id) = slot.state.id() {
                    if let Err(e) = haptic.destroy_effect(id) {
                        warn!("Failed to destroy {} effect: {}", slot.kind, e);
                    }
                }
            }
        }
        for slot in self.slots.iter_mut() {
            slot.state = EffectState::Unsupported;
            slot.applied = None;
        }
        debug!("Haptic effects detached");
    }

    /// Records a new strength and pushes it to the running effect, if any
    ///
    /// Values outside [0, 100] are clamped. Returns the strength kept.
    pub fn set_strength(
        &mut self,
        haptic: Option<&mut dyn HapticDevice>,
        kind: EffectKind,
        percent: f64,
    ) -> f64 {
        let percent = clamp_percent(percent);
        self.slot_mut(kind).strength = percent;
        if let Some(haptic) = haptic {
            self.push(haptic, kind, percent);
        }
        percent
    }

    /// Applies a whole set of strengths, e.g. after a profile switch
    pub fn apply_all(&mut self, haptic: Option<&mut dyn HapticDevice>, strengths: FfbStrengths) {
        for kind in EffectKind::ALL {
            self.slot_mut(kind).strength = clamp_percent(strengths.get(kind));
        }
        if let Some(haptic) = haptic {
            for kind in EffectKind::ALL {
                let strength = self.strength(kind);
                self.push(haptic, kind, strength);
            }
        }
    }

    fn push(&mut self, haptic: &mut dyn HapticDevice, kind: EffectKind, percent: f64) {
        let slot = self.slot_mut(kind);
        let id = match slot.state.id() {
            Some(id) => id,
            None => return,
        };

        let coeff = coefficient(percent);
        if slot.applied == Some(coeff) {
            return;
        }

        match haptic.update_effect(id, ConditionParams::symmetric(coeff)) {
            Ok(()) => {
                slot.applied = Some(coeff);
                slot.state = EffectState::Updated(id);
                debug!("{} effect set to {:.1}% (coefficient {})", kind, percent, coeff);
            }
            Err(e) => warn!("Failed to update {} effect: {}", kind, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{HapticCall, MockBackend, MockDevice};
    use crate::device::{DeviceManager, HapticCapabilities};
    use proptest::prelude::*;

    fn wheel_manager(caps: HapticCapabilities) -> (DeviceManager<MockBackend>, MockBackendLog) {
        let backend = MockBackend::new(vec![
            MockDevice::new("Fanatec CSL DD", 3, 12, 1).with_haptics(caps)
        ]);
        let log = backend.log();
        let mut manager = DeviceManager::new(backend);
        manager.open(0).unwrap();
        (manager, log)
    }

    type MockBackendLog = std::sync::Arc<std::sync::Mutex<crate::device::mock::MockLog>>;

    #[test]
    fn coefficient_scaling() {
        assert_eq!(coefficient(0.0), 0);
        assert_eq!(coefficient(100.0), 32767);
        assert_eq!(coefficient(50.0), 16384);
        assert_eq!(coefficient(-20.0), 0);
        assert_eq!(coefficient(250.0), 32767);
    }

    #[test]
    fn attach_arms_supported_effects_only() {
        let (mut manager, log) =
            wheel_manager(HapticCapabilities::SPRING | HapticCapabilities::FRICTION);
        let mut controller = HapticController::new(FfbStrengths::default());

        controller.attach(manager.haptic_mut().unwrap());

        assert!(matches!(
            controller.state(EffectKind::Spring),
            EffectState::Updated(_)
        ));
        assert_eq!(
            controller.state(EffectKind::Damper),
            EffectState::Unsupported
        );
        assert_eq!(
            controller.active_effects(),
            vec![EffectKind::Spring, EffectKind::Friction]
        );

        let log = log.lock().unwrap();
        assert_eq!(log.haptic[0], HapticCall::Autocenter(0));
        assert_eq!(log.haptic[1], HapticCall::Gain(100));
        assert_eq!(
            log.last_update(EffectKind::Spring),
            Some(ConditionParams::symmetric(16384))
        );
        assert_eq!(
            log.last_update(EffectKind::Friction),
            Some(ConditionParams::symmetric(3277))
        );
        assert_eq!(log.last_update(EffectKind::Damper), None);
    }

    #[test]
    fn unsupported_effect_ignores_updates() {
        let (mut manager, log) = wheel_manager(HapticCapabilities::SPRING);
        let mut controller = HapticController::new(FfbStrengths::default());
        controller.attach(manager.haptic_mut().unwrap());
        let before = log.lock().unwrap().update_count();

        let kept = controller.set_strength(manager.haptic_mut(), EffectKind::Damper, 80.0);

        assert_eq!(kept, 80.0);
        assert_eq!(controller.strength(EffectKind::Damper), 80.0);
        assert_eq!(log.lock().unwrap().update_count(), before);
    }

    #[test]
    fn strength_before_any_device_is_recorded_then_applied() {
        let mut controller = HapticController::new(FfbStrengths::default());
        controller.set_strength(None, EffectKind::Spring, 90.0);
        assert_eq!(controller.state(EffectKind::Spring), EffectState::Unsupported);

        let (mut manager, log) = wheel_manager(HapticCapabilities::SPRING);
        controller.attach(manager.haptic_mut().unwrap());
        assert_eq!(
            log.lock().unwrap().last_update(EffectKind::Spring),
            Some(ConditionParams::symmetric(coefficient(90.0)))
        );
    }

    #[test]
    fn unchanged_coefficient_is_not_pushed_again() {
        let (mut manager, log) = wheel_manager(HapticCapabilities::SPRING);
        let mut controller = HapticController::new(FfbStrengths::default());
        controller.attach(manager.haptic_mut().unwrap());

        controller.set_strength(manager.haptic_mut(), EffectKind::Spring, 150.0);
        let after_first = log.lock().unwrap().update_count();
        controller.set_strength(manager.haptic_mut(), EffectKind::Spring, 100.0);
        assert_eq!(log.lock().unwrap().update_count(), after_first);
    }

    #[test]
    fn detach_destroys_and_resets() {
        let (mut manager, log) = wheel_manager(HapticCapabilities::SPRING);
        let mut controller = HapticController::new(FfbStrengths::default());
        controller.attach(manager.haptic_mut().unwrap());

        controller.detach(manager.haptic_mut());

        assert_eq!(controller.state(EffectKind::Spring), EffectState::Unsupported);
        assert!(log
            .lock()
            .unwrap()
            .haptic
            .iter()
            .any(|call| matches!(call, HapticCall::Destroy(_))));
    }

    proptest! {
        #[test]
        fn out_of_range_behaves_like_clamped(value in -500.0f64..500.0) {
            let (mut clamped_mgr, clamped_log) = wheel_manager(HapticCapabilities::SPRING);
            let (mut raw_mgr, raw_log) = wheel_manager(HapticCapabilities::SPRING);
            let mut clamped = HapticController::new(FfbStrengths::default());
            let mut raw = HapticController::new(FfbStrengths::default());
            clamped.attach(clamped_mgr.haptic_mut().unwrap());
            raw.attach(raw_mgr.haptic_mut().unwrap());

            raw.set_strength(raw_mgr.haptic_mut(), EffectKind::Spring, value);
            clamped.set_strength(clamped_mgr.haptic_mut(), EffectKind::Spring, value.clamp(0.0, 100.0));

            prop_assert_eq!(raw.strength(EffectKind::Spring), clamped.strength(EffectKind::Spring));
            prop_assert_eq!(
                raw_log.lock().unwrap().last_update(EffectKind::Spring),
                clamped_log.lock().unwrap().last_update(EffectKind::Spring)
            );
        }
    }
}
