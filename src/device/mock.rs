//! Scripted in-memory backend for tests
//!
//! Device state lives behind a shared mutex so a test can move a stick or press
//! a button between ticks, and every backend/haptic call is recorded in a shared
//! [`MockLog`].

use super::backend::{
    ConditionParams, DeviceError, DeviceHandle, DeviceInfo, DeviceSnapshot, DeviceTypeTag,
    EffectId, EffectKind, HapticCapabilities, HapticDevice, HapticError, InputBackend,
    OpenedDevice,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum HapticCall {
    Autocenter(u16),
    Gain(u16),
    Create(EffectKind, EffectId),
    Run(EffectId),
    Update(EffectId, ConditionParams),
    Destroy(EffectId),
}

#[derive(Debug, Default)]
pub struct MockLog {
    pub opened: Vec<usize>,
    pub closed: Vec<usize>,
    pub haptic: Vec<HapticCall>,
}

impl MockLog {
    /// Last condition pushed for the effect of the given kind
    pub fn last_update(&self, kind: EffectKind) -> Option<ConditionParams> {
        let ids: Vec<EffectId> = self
            .haptic
            .iter()
            .filter_map(|call| match call {
                HapticCall::Create(k, id) if *k == kind => Some(*id),
                _ => None,
            })
            .collect();
        self.haptic.iter().rev().find_map(|call| match call {
            HapticCall::Update(id, params) if ids.contains(id) => Some(*params),
            _ => None,
        })
    }

    pub fn update_count(&self) -> usize {
        self.haptic
            .iter()
            .filter(|call| matches!(call, HapticCall::Update(..)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub type_tag: DeviceTypeTag,
    pub haptics: Option<HapticCapabilities>,
    pub state: Arc<Mutex<DeviceSnapshot>>,
    pub unplugged: Arc<AtomicBool>,
}

impl MockDevice {
    pub fn new(name: &str, axes: usize, buttons: usize, hats: usize) -> Self {
        Self {
            name: name.to_string(),
            type_tag: DeviceTypeTag::Unknown,
            haptics: None,
            state: Arc::new(Mutex::new(DeviceSnapshot {
                axes: vec![0.0; axes],
                buttons: vec![false; buttons],
                hats: vec![0; hats],
            })),
            unplugged: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_haptics(mut self, caps: HapticCapabilities) -> Self {
        self.haptics = Some(caps);
        self
    }

    pub fn with_type_tag(mut self, tag: DeviceTypeTag) -> Self {
        self.type_tag = tag;
        self
    }

    pub fn set_axis(&self, index: usize, value: f64) {
        self.state.lock().unwrap().axes[index] = value;
    }

    pub fn set_button(&self, index: usize, pressed: bool) {
        self.state.lock().unwrap().buttons[index] = pressed;
    }

    pub fn set_hat(&self, index: usize, bitmask: u8) {
        self.state.lock().unwrap().hats[index] = bitmask;
    }

    /// Every later snapshot of this device fails with `Disconnected`
    pub fn unplug(&self) {
        self.unplugged.store(true, Ordering::SeqCst);
    }
}

pub struct MockBackend {
    devices: Vec<MockDevice>,
    log: Arc<Mutex<MockLog>>,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            log: Arc::new(Mutex::new(MockLog::default())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }
}

impl InputBackend for MockBackend {
    fn enumerate(&mut self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, d)| DeviceInfo {
                index,
                name: d.name.clone(),
            })
            .collect()
    }

    fn open(&mut self, index: usize) -> Result<OpenedDevice, DeviceError> {
        let device = self
            .devices
            .get(index)
            .ok_or_else(|| DeviceError::DeviceUnavailable(format!("no mock device {}", index)))?;
        self.log.lock().unwrap().opened.push(index);
        let state = device.state.lock().unwrap();
        Ok(OpenedDevice {
            handle: DeviceHandle(index),
            name: device.name.clone(),
            type_tag: device.type_tag,
            axis_count: state.axes.len(),
            button_count: state.buttons.len(),
            hat_count: state.hats.len(),
        })
    }

    fn close(&mut self, handle: DeviceHandle) {
        self.log.lock().unwrap().closed.push(handle.0);
    }

    fn snapshot(&mut self, handle: DeviceHandle) -> Result<DeviceSnapshot, DeviceError> {
        self.devices
            .get(handle.0)
            .filter(|d| !d.unplugged.load(Ordering::SeqCst))
            .map(|d| d.state.lock().unwrap().clone())
            .ok_or(DeviceError::Disconnected(handle))
    }

    fn open_haptic(&mut self, handle: DeviceHandle) -> Option<Box<dyn HapticDevice>> {
        let caps = self.devices.get(handle.0)?.haptics?;
        Some(Box::new(MockHaptic {
            caps,
            log: self.log.clone(),
            next_id: 0,
            effects: HashMap::new(),
        }))
    }
}

pub struct MockHaptic {
    caps: HapticCapabilities,
    log: Arc<Mutex<MockLog>>,
    next_id: i32,
    effects: HashMap<EffectId, EffectKind>,
}

impl MockHaptic {
    fn record(&self, call: HapticCall) {
        self.log.lock().unwrap().haptic.push(call);
    }

    fn known(&self, id: EffectId) -> Result<(), HapticError> {
        if self.effects.contains_key(&id) {
            Ok(())
        } else {
            Err(HapticError::UnknownEffect(id))
        }
    }
}

impl HapticDevice for MockHaptic {
    fn capabilities(&self) -> HapticCapabilities {
        self.caps
    }

    fn set_autocenter(&mut self, percent: u16) -> Result<(), HapticError> {
        self.record(HapticCall::Autocenter(percent));
        Ok(())
    }

    fn set_gain(&mut self, percent: u16) -> Result<(), HapticError> {
        self.record(HapticCall::Gain(percent));
        Ok(())
    }

    fn create_effect(&mut self, kind: EffectKind) -> Result<EffectId, HapticError> {
        if !self.caps.supports(kind) {
            return Err(HapticError::Unsupported(kind));
        }
        let id = EffectId(self.next_id);
        self.next_id += 1;
        self.effects.insert(id, kind);
        self.record(HapticCall::Create(kind, id));
        Ok(id)
    }

    fn run_effect(&mut self, id: EffectId) -> Result<(), HapticError> {
        self.known(id)?;
        self.record(HapticCall::Run(id));
        Ok(())
    }

    fn update_effect(&mut self, id: EffectId, params: ConditionParams) -> Result<(), HapticError> {
        self.known(id)?;
        self.record(HapticCall::Update(id, params));
        Ok(())
    }

    fn destroy_effect(&mut self, id: EffectId) -> Result<(), HapticError> {
        self.known(id)?;
        self.effects.remove(&id);
        self.record(HapticCall::Destroy(id));
        Ok(())
    }
}
