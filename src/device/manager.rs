//! Device Manager - owner of the open device and its haptic handle
//!
//! Exactly one device is open at a time. Every read and every haptic write goes
//! through this type; other components only ever borrow the haptic handle for
//! the duration of a single call.

use super::backend::{
    DeviceError, DeviceInfo, DeviceSnapshot, HapticDevice, InputBackend, OpenedDevice,
};
use super::classify::{ButtonFamily, DeviceClass};
use serde::Serialize;
use tracing::{debug, info};

/// Read-only description of the open device for status and preview consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub index: usize,
    pub name: String,
    pub class: DeviceClass,
    pub family: ButtonFamily,
    pub axis_count: usize,
    pub button_count: usize,
    pub hat_count: usize,
    pub has_haptics: bool,
}

struct OpenDevice {
    index: usize,
    device: OpenedDevice,
    class: DeviceClass,
    family: ButtonFamily,
    haptic: Option<Box<dyn HapticDevice>>,
}

pub struct DeviceManager<B: InputBackend> {
    backend: B,
    devices: Vec<DeviceInfo>,
    open: Option<OpenDevice>,
}

impl<B: InputBackend> DeviceManager<B> {
    pub fn new(mut backend: B) -> Self {
        let devices = backend.enumerate();
        info!("Device manager found {} input device(s)", devices.len());
        for device in &devices {
            info!("  {}", device);
        }
        Self {
            backend,
            devices,
            open: None,
        }
    }

    /// Devices from the most recent enumeration
    pub fn list_devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Closes the open device and enumerates again
    pub fn refresh(&mut self) -> &[DeviceInfo] {
        self.close();
        self.devices = self.backend.enumerate();
        info!("Refreshed device list: {} device(s)", self.devices.len());
        for device in &self.devices {
            debug!("  {}", device);
        }
        &self.devices
    }

    /// Opens the device at `index`, closing whatever was open before
    pub fn open(&mut self, index: usize) -> Result<DeviceSummary, DeviceError> {
        if self.devices.is_empty() {
            return Err(DeviceError::DeviceUnavailable(
                "no devices enumerated".to_string(),
            ));
        }
        if !self.devices.iter().any(|d| d.index == index) {
            return Err(DeviceError::DeviceUnavailable(format!(
                "no device at index {}",
                index
            )));
        }

        self.close();

        let device = self.backend.open(index)?;
        let class = DeviceClass::classify(device.type_tag, &device.name);
        let family = ButtonFamily::detect(&device.name);
        let haptic = self.backend.open_haptic(device.handle);

        info!(
            "Opened device [{}] {} ({:?}, {} axes, {} buttons, {} hats, haptics: {})",
            index,
            device.name,
            class,
            device.axis_count,
            device.button_count,
            device.hat_count,
            haptic.is_some()
        );

        self.open = Some(OpenDevice {
            index,
            device,
            class,
            family,
            haptic,
        });

        self.summary().ok_or(DeviceError::NotOpen)
    }

    /// Releases the device and haptic handle. Safe to call when nothing is open.
    pub fn close(&mut self) {
        if let Some(open) = self.open.take() {
            // haptic handle goes first, it may reference the device node
            drop(open.haptic);
            self.backend.close(open.device.handle);
            info!("Closed device [{}] {}", open.index, open.device.name);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn summary(&self) -> Option<DeviceSummary> {
        self.open.as_ref().map(|open| DeviceSummary {
            index: open.index,
            name: open.device.name.clone(),
            class: open.class,
            family: open.family,
            axis_count: open.device.axis_count,
            button_count: open.device.button_count,
            hat_count: open.device.hat_count,
            has_haptics: open.haptic.is_some(),
        })
    }

    /// Reads the full input state of the open device
    pub fn snapshot(&mut self) -> Result<DeviceSnapshot, DeviceError> {
        let handle = match &self.open {
            Some(open) => open.device.handle,
            None => return Err(DeviceError::NotOpen),
        };
        match self.backend.snapshot(handle) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                // polled every few ms, callers decide how loud a failure is
                debug!("Failed to read device state: {}", e);
                Err(e)
            }
        }
    }

    /// Borrow of the haptic handle, `None` when nothing is open or the device has no haptics
    pub fn haptic_mut(&mut self) -> Option<&mut dyn HapticDevice> {
        match self.open.as_mut()?.haptic.as_mut() {
            Some(haptic) => Some(haptic.as_mut() as &mut dyn HapticDevice),
            None => None,
        }
    }
}

impl<B: InputBackend> Drop for DeviceManager<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::backend::{DeviceTypeTag, HapticCapabilities};
    use crate::device::mock::{MockBackend, MockDevice};

    fn backend() -> MockBackend {
        MockBackend::new(vec![
            MockDevice::new("Xbox Wireless Controller", 6, 11, 1),
            MockDevice::new("Logitech G29 Driving Force Racing Wheel", 4, 24, 1)
                .with_haptics(HapticCapabilities::SPRING | HapticCapabilities::DAMPER),
        ])
    }

    #[test]
    fn lists_enumerated_devices() {
        let manager = DeviceManager::new(backend());
        let names: Vec<_> = manager.list_devices().iter().map(|d| d.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "[0] Xbox Wireless Controller",
                "[1] Logitech G29 Driving Force Racing Wheel"
            ]
        );
    }

    #[test]
    fn open_classifies_and_attaches_haptics() {
        let mut manager = DeviceManager::new(backend());

        let pad = manager.open(0).unwrap();
        assert_eq!(pad.class, DeviceClass::Standard);
        assert_eq!(pad.family, ButtonFamily::Xbox);
        assert!(!pad.has_haptics);
        assert!(manager.haptic_mut().is_none());

        let wheel = manager.open(1).unwrap();
        assert_eq!(wheel.class, DeviceClass::Wheel);
        assert_eq!(wheel.family, ButtonFamily::LogitechWheel);
        assert_eq!(wheel.axis_count, 4);
        assert!(manager.haptic_mut().is_some());
    }

    #[test]
    fn reopen_closes_previous_device() {
        let backend = backend();
        let log = backend.log();
        let mut manager = DeviceManager::new(backend);

        manager.open(0).unwrap();
        manager.open(1).unwrap();

        assert_eq!(log.lock().unwrap().closed, vec![0]);
        assert_eq!(manager.summary().unwrap().index, 1);
    }

    #[test]
    fn open_unknown_index_is_unavailable() {
        let mut manager = DeviceManager::new(backend());
        assert!(matches!(
            manager.open(7),
            Err(DeviceError::DeviceUnavailable(_))
        ));

        let mut empty = DeviceManager::new(MockBackend::new(Vec::new()));
        assert!(matches!(
            empty.open(0),
            Err(DeviceError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut manager = DeviceManager::new(backend());
        manager.close();
        manager.open(1).unwrap();
        manager.close();
        manager.close();
        assert!(!manager.is_open());
        assert!(matches!(manager.snapshot(), Err(DeviceError::NotOpen)));
    }

    #[test]
    fn platform_wheel_tag_wins_over_name() {
        let backend = MockBackend::new(vec![
            MockDevice::new("USB Input Device", 2, 8, 0).with_type_tag(DeviceTypeTag::Wheel)
        ]);
        let mut manager = DeviceManager::new(backend);

        let device = manager.open(0).unwrap();
        assert_eq!(device.class, DeviceClass::Wheel);
        assert_eq!(device.family, ButtonFamily::Generic);
    }

    #[test]
    fn unplugged_device_stays_open_but_fails_reads() {
        let pad = MockDevice::new("Xbox Wireless Controller", 6, 11, 1);
        let mut manager = DeviceManager::new(MockBackend::new(vec![pad.clone()]));
        manager.open(0).unwrap();
        assert!(manager.snapshot().is_ok());

        pad.unplug();
        for _ in 0..3 {
            assert!(matches!(
                manager.snapshot(),
                Err(DeviceError::Disconnected(_))
            ));
        }
        assert!(manager.is_open());
    }
}
