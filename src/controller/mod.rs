//! Input devices
//!
//! Each device is polled on its own thread and exposes its state as
//! immutable snapshots:
//!
//! 1. [`state`] - Signal keys, normalization, device state and snapshots
//! 2. [`controller_handle`] - Polling worker and snapshot publishing
//! 3. [`gamepad`] - Gamepad backend (gilrs)
//! 4. [`board`] / [`firmata`] - Microcontroller backend over a serial link
//!
//! # Architecture
//!
//! ```text
//! Backend ──► poll_once ──► DeviceState ──► watch<Snapshot> ──► Dispatch
//! ```

pub mod board;
pub mod controller_handle;
pub mod firmata;
pub mod gamepad;
pub mod state;

pub use board::{BoardDevice, BoardPin, BoardSettings, LinkStatus, SerialConnector};
pub use controller_handle::{DeviceError, DeviceHandle, DeviceSettings, InputDevice};
pub use gamepad::{GamepadDevice, GamepadKey};
pub use state::{DeviceState, SignalKey, SignalKind, Snapshot};
