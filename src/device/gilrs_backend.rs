//! gilrs implementation of [`InputBackend`]
//!
//! gilrs gives us enumeration, hotplug and normalized state for every pad it
//! can see. It does not expose raw axis ordinals, so each gamepad is presented
//! through fixed ordinal tables: the axes and buttons below, in this order,
//! filtered down to the ones the device actually has. The D-pad becomes hat 0.

use super::backend::{
    DeviceError, DeviceHandle, DeviceInfo, DeviceSnapshot, DeviceTypeTag, HapticDevice,
    InputBackend, OpenedDevice, HAT_CENTERED, HAT_DOWN, HAT_LEFT, HAT_RIGHT, HAT_UP,
};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

const AXIS_ORDER: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const BUTTON_ORDER: [Button; 15] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::C,
    Button::Z,
];

const DPAD_BUTTONS: [Button; 4] = [
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

/// Threshold above which a D-pad axis counts as pressed
const DPAD_AXIS_THRESHOLD: f32 = 0.5;

#[derive(Debug)]
struct OpenGamepad {
    id: GamepadId,
    axes: Vec<Axis>,
    buttons: Vec<Button>,
    hat: Option<HatSource>,
}

#[derive(Debug, Clone, Copy)]
enum HatSource {
    Buttons,
    Axes,
}

pub struct GilrsBackend {
    gilrs: Gilrs,
    // gamepad order of the last enumeration, index == ordinal
    order: Vec<GamepadId>,
    open: HashMap<usize, OpenGamepad>,
    next_handle: usize,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        Ok(Self {
            gilrs,
            order: Vec::new(),
            open: HashMap::new(),
            next_handle: 0,
        })
    }

    /// Drains pending gilrs events so the cached gamepad state is current
    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => info!("Controller {} connected", id),
                EventType::Disconnected => warn!("Controller {} disconnected", id),
                _ => {}
            }
        }
    }

    fn hat_bitmask(gamepad: &Gamepad<'_>, source: HatSource) -> u8 {
        let (up, down, left, right) = match source {
            HatSource::Buttons => (
                gamepad.is_pressed(Button::DPadUp),
                gamepad.is_pressed(Button::DPadDown),
                gamepad.is_pressed(Button::DPadLeft),
                gamepad.is_pressed(Button::DPadRight),
            ),
            HatSource::Axes => {
                let x = gamepad.value(Axis::DPadX);
                let y = gamepad.value(Axis::DPadY);
                (
                    y > DPAD_AXIS_THRESHOLD,
                    y < -DPAD_AXIS_THRESHOLD,
                    x < -DPAD_AXIS_THRESHOLD,
                    x > DPAD_AXIS_THRESHOLD,
                )
            }
        };

        let mut bitmask = HAT_CENTERED;
        if up {
            bitmask |= HAT_UP;
        }
        if down {
            bitmask |= HAT_DOWN;
        }
        if left {
            bitmask |= HAT_LEFT;
        }
        if right {
            bitmask |= HAT_RIGHT;
        }
        bitmask
    }
}

impl InputBackend for GilrsBackend {
    fn enumerate(&mut self) -> Vec<DeviceInfo> {
        self.pump();
        self.order = self.gilrs.gamepads().map(|(id, _)| id).collect();

        self.order
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                self.gilrs.connected_gamepad(*id).map(|gamepad| DeviceInfo {
                    index,
                    name: gamepad.name().to_string(),
                })
            })
            .collect()
    }

    fn open(&mut self, index: usize) -> Result<OpenedDevice, DeviceError> {
        self.pump();
        let id = *self.order.get(index).ok_or_else(|| {
            DeviceError::DeviceUnavailable(format!("no gamepad at index {}", index))
        })?;
        let gamepad = self.gilrs.connected_gamepad(id).ok_or_else(|| {
            DeviceError::DeviceUnavailable(format!("gamepad {} is not connected", id))
        })?;

        let axes: Vec<Axis> = AXIS_ORDER
            .iter()
            .copied()
            .filter(|axis| gamepad.axis_code(*axis).is_some())
            .collect();
        let buttons: Vec<Button> = BUTTON_ORDER
            .iter()
            .copied()
            .filter(|button| gamepad.button_code(*button).is_some())
            .collect();
        let hat = if DPAD_BUTTONS
            .iter()
            .any(|button| gamepad.button_code(*button).is_some())
        {
            Some(HatSource::Buttons)
        } else if gamepad.axis_code(Axis::DPadX).is_some() {
            Some(HatSource::Axes)
        } else {
            None
        };

        debug!(
            "Gamepad {} ({}) axes: {:?}, buttons: {:?}, hat: {:?}",
            id,
            gamepad.name(),
            axes,
            buttons,
            hat
        );

        let opened = OpenedDevice {
            handle: DeviceHandle(self.next_handle),
            name: gamepad.name().to_string(),
            // gilrs does not report a device type, the name heuristics decide
            type_tag: DeviceTypeTag::Unknown,
            axis_count: axes.len(),
            button_count: buttons.len(),
            hat_count: usize::from(hat.is_some()),
        };

        self.open.insert(
            self.next_handle,
            OpenGamepad {
                id,
                axes,
                buttons,
                hat,
            },
        );
        self.next_handle += 1;

        Ok(opened)
    }

    fn close(&mut self, handle: DeviceHandle) {
        if self.open.remove(&handle.0).is_none() {
            debug!("Ignoring close of unknown handle {:?}", handle);
        }
    }

    fn snapshot(&mut self, handle: DeviceHandle) -> Result<DeviceSnapshot, DeviceError> {
        self.pump();
        let open = self
            .open
            .get(&handle.0)
            .ok_or(DeviceError::Disconnected(handle))?;
        let gamepad = self
            .gilrs
            .connected_gamepad(open.id)
            .ok_or(DeviceError::Disconnected(handle))?;

        Ok(DeviceSnapshot {
            axes: open
                .axes
                .iter()
                .map(|axis| gamepad.value(*axis) as f64)
                .collect(),
            buttons: open
                .buttons
                .iter()
                .map(|button| gamepad.is_pressed(*button))
                .collect(),
            hats: open
                .hat
                .map(|source| vec![Self::hat_bitmask(&gamepad, source)])
                .unwrap_or_default(),
        })
    }

    #[cfg(target_os = "linux")]
    fn open_haptic(&mut self, handle: DeviceHandle) -> Option<Box<dyn HapticDevice>> {
        let open = self.open.get(&handle.0)?;
        let gamepad = self.gilrs.connected_gamepad(open.id)?;
        let (vendor, product) = match (gamepad.vendor_id(), gamepad.product_id()) {
            (Some(vendor), Some(product)) => (vendor, product),
            _ => {
                debug!("Gamepad {} has no vendor/product id, no haptics", open.id);
                return None;
            }
        };

        super::evdev_haptic::EvdevHaptic::open_matching(vendor, product)
            .map(|haptic| Box::new(haptic) as Box<dyn HapticDevice>)
    }

    #[cfg(not(target_os = "linux"))]
    fn open_haptic(&mut self, _handle: DeviceHandle) -> Option<Box<dyn HapticDevice>> {
        debug!("Conditional haptics are only available on Linux");
        None
    }
}
