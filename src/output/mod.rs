//! Output actuators
//!
//! Discrete outputs press and release keys. Continuous outputs move the
//! pointer; a [`pointer::Pointer`] keeps moving at its last velocity on its
//! own worker until it is stopped.

pub mod logging;
pub mod pointer;
pub mod recording;
#[cfg(target_os = "linux")]
pub mod uinput;

pub use logging::LoggingOutput;
pub use pointer::{Pointer, PointerHandle, PointerSettings};
pub use recording::{OutputEvent, RecordingOutput};

use std::fmt;

/// Keys and buttons the actuators can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKey {
    Ctrl,
    Shift,
    Alt,
    Enter,
    Backspace,
    Menu,
    Escape,
    Tab,
    Space,
    Left,
    Right,
    Up,
    Down,
    F1,
    F2,
    VolumeMute,
    VolumeUp,
    VolumeDown,
    MouseLeft,
    MouseRight,
    MouseMiddle,
}

impl OutputKey {
    pub const ALL: &'static [OutputKey] = &[
        OutputKey::Ctrl,
        OutputKey::Shift,
        OutputKey::Alt,
        OutputKey::Enter,
        OutputKey::Backspace,
        OutputKey::Menu,
        OutputKey::Escape,
        OutputKey::Tab,
        OutputKey::Space,
        OutputKey::Left,
        OutputKey::Right,
        OutputKey::Up,
        OutputKey::Down,
        OutputKey::F1,
        OutputKey::F2,
        OutputKey::VolumeMute,
        OutputKey::VolumeUp,
        OutputKey::VolumeDown,
        OutputKey::MouseLeft,
        OutputKey::MouseRight,
        OutputKey::MouseMiddle,
    ];

    pub fn is_pointer_button(self) -> bool {
        matches!(
            self,
            OutputKey::MouseLeft | OutputKey::MouseRight | OutputKey::MouseMiddle
        )
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors raised while driving an output
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    /// Writing to the OS input layer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output device could not be created
    #[error("Failed to create output device: {0}")]
    DeviceCreation(String),
}

/// Discrete output. Pressing a pressed key or releasing a released key is not an error.
pub trait KeyOutput: Send + Sync + fmt::Debug {
    fn press(&self, key: OutputKey) -> Result<(), ActuatorError>;

    fn release(&self, key: OutputKey) -> Result<(), ActuatorError>;

    /// Whether this backend can emit `key`, checked once at startup
    fn supports(&self, _key: OutputKey) -> bool {
        true
    }
}

/// Relative pointer movement
pub trait PointerOutput: Send + Sync + fmt::Debug {
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError>;
}
