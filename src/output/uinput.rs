//! Virtual keyboard and mouse on Linux uinput

use crate::output::{ActuatorError, KeyOutput, OutputKey, PointerOutput};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};

fn evdev_key(key: OutputKey) -> Key {
    match key {
        OutputKey::Ctrl => Key::KEY_LEFTCTRL,
        OutputKey::Shift => Key::KEY_LEFTSHIFT,
        OutputKey::Alt => Key::KEY_LEFTALT,
        OutputKey::Enter => Key::KEY_ENTER,
        OutputKey::Backspace => Key::KEY_BACKSPACE,
        OutputKey::Menu => Key::KEY_MENU,
        OutputKey::Escape => Key::KEY_ESC,
        OutputKey::Tab => Key::KEY_TAB,
        OutputKey::Space => Key::KEY_SPACE,
        OutputKey::Left => Key::KEY_LEFT,
        OutputKey::Right => Key::KEY_RIGHT,
        OutputKey::Up => Key::KEY_UP,
        OutputKey::Down => Key::KEY_DOWN,
        OutputKey::F1 => Key::KEY_F1,
        OutputKey::F2 => Key::KEY_F2,
        OutputKey::VolumeMute => Key::KEY_MUTE,
        OutputKey::VolumeUp => Key::KEY_VOLUMEUP,
        OutputKey::VolumeDown => Key::KEY_VOLUMEDOWN,
        OutputKey::MouseLeft => Key::BTN_LEFT,
        OutputKey::MouseRight => Key::BTN_RIGHT,
        OutputKey::MouseMiddle => Key::BTN_MIDDLE,
    }
}

/// One uinput device carrying every [`OutputKey`] plus relative X/Y motion.
///
/// Shared by the keyboard mappers and all pointer actuators.
pub struct UinputOutput {
    device: Mutex<VirtualDevice>,
}

impl UinputOutput {
    pub fn create(name: &str) -> Result<Self, ActuatorError> {
        let mut keys = AttributeSet::<Key>::new();
        for key in OutputKey::ALL {
            keys.insert(evdev_key(*key));
        }
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| ActuatorError::DeviceCreation(e.to_string()))?
            .name(name)
            .with_keys(&keys)
            .map_err(|e| ActuatorError::DeviceCreation(e.to_string()))?
            .with_relative_axes(&axes)
            .map_err(|e| ActuatorError::DeviceCreation(e.to_string()))?
            .build()
            .map_err(|e| ActuatorError::DeviceCreation(e.to_string()))?;

        info!("Created uinput device {}", name);
        Ok(Self {
            device: Mutex::new(device),
        })
    }

    fn emit(&self, events: &[InputEvent]) -> Result<(), ActuatorError> {
        let mut device = self
            .device
            .lock()
            .map_err(|_| ActuatorError::Io(std::io::Error::other("uinput device lock poisoned")))?;
        device.emit(events)?;
        Ok(())
    }

    fn emit_key(&self, key: OutputKey, value: i32) -> Result<(), ActuatorError> {
        debug!("uinput key {} = {}", key, value);
        self.emit(&[InputEvent::new(EventType::KEY, evdev_key(key).code(), value)])
    }
}

impl fmt::Debug for UinputOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UinputOutput").finish_non_exhaustive()
    }
}

impl KeyOutput for UinputOutput {
    fn press(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.emit_key(key, 1)
    }

    fn release(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.emit_key(key, 0)
    }
}

impl PointerOutput for UinputOutput {
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError> {
        self.emit(&[
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, dx),
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy),
        ])
    }
}
