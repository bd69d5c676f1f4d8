use crate::controller::controller_handle::{DeviceError, InputDevice};
use crate::controller::state::{DeviceState, SignalKey, SignalKind};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Signals of a standard dual-stick gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GamepadKey {
    A,
    B,
    X,
    Y,
    /// Horizontal d-pad, -1 left / 1 right
    H,
    /// Vertical d-pad, -1 up / 1 down
    V,
    LB,
    RB,
    LT,
    RT,
    Start,
    Back,
    Center,
    LStickX,
    LStickY,
    RStickX,
    RStickY,
    LThumb,
    RThumb,
}

impl SignalKey for GamepadKey {
    const ALL: &'static [Self] = &[
        GamepadKey::A,
        GamepadKey::B,
        GamepadKey::X,
        GamepadKey::Y,
        GamepadKey::H,
        GamepadKey::V,
        GamepadKey::LB,
        GamepadKey::RB,
        GamepadKey::LT,
        GamepadKey::RT,
        GamepadKey::Start,
        GamepadKey::Back,
        GamepadKey::Center,
        GamepadKey::LStickX,
        GamepadKey::LStickY,
        GamepadKey::RStickX,
        GamepadKey::RStickY,
        GamepadKey::LThumb,
        GamepadKey::RThumb,
    ];

    fn kind(self) -> SignalKind {
        match self {
            GamepadKey::H | GamepadKey::V => SignalKind::Directional,
            GamepadKey::LT | GamepadKey::RT => SignalKind::Trigger,
            GamepadKey::LStickX | GamepadKey::LStickY | GamepadKey::RStickX | GamepadKey::RStickY => {
                SignalKind::Axis
            }
            _ => SignalKind::Binary,
        }
    }

    fn label(self) -> &'static str {
        match self {
            GamepadKey::A => "a",
            GamepadKey::B => "b",
            GamepadKey::X => "x",
            GamepadKey::Y => "y",
            GamepadKey::H => "dpad_h",
            GamepadKey::V => "dpad_v",
            GamepadKey::LB => "lb",
            GamepadKey::RB => "rb",
            GamepadKey::LT => "lt",
            GamepadKey::RT => "rt",
            GamepadKey::Start => "start",
            GamepadKey::Back => "back",
            GamepadKey::Center => "center",
            GamepadKey::LStickX => "l_stick_x",
            GamepadKey::LStickY => "l_stick_y",
            GamepadKey::RStickX => "r_stick_x",
            GamepadKey::RStickY => "r_stick_y",
            GamepadKey::LThumb => "l_thumb",
            GamepadKey::RThumb => "r_thumb",
        }
    }
}

impl fmt::Display for GamepadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Digital buttons
const BUTTON_TABLE: &[(Button, GamepadKey)] = &[
    (Button::South, GamepadKey::A),
    (Button::East, GamepadKey::B),
    (Button::North, GamepadKey::X),
    (Button::West, GamepadKey::Y),
    (Button::LeftTrigger, GamepadKey::LB),
    (Button::RightTrigger, GamepadKey::RB),
    (Button::Start, GamepadKey::Start),
    (Button::Select, GamepadKey::Back),
    (Button::Mode, GamepadKey::Center),
    (Button::LeftThumb, GamepadKey::LThumb),
    (Button::RightThumb, GamepadKey::RThumb),
];

// Analog triggers reported as buttons with a value
const TRIGGER_TABLE: &[(Button, GamepadKey)] = &[
    (Button::LeftTrigger2, GamepadKey::LT),
    (Button::RightTrigger2, GamepadKey::RT),
];

// D-pad buttons folded into the two directional signals
const DPAD_TABLE: &[(Button, GamepadKey, f32)] = &[
    (Button::DPadLeft, GamepadKey::H, -1.0),
    (Button::DPadRight, GamepadKey::H, 1.0),
    (Button::DPadUp, GamepadKey::V, -1.0),
    (Button::DPadDown, GamepadKey::V, 1.0),
];

// gilrs reports Y axes up-positive; pointer space is down-positive
const AXIS_TABLE: &[(Axis, GamepadKey, f32)] = &[
    (Axis::LeftStickX, GamepadKey::LStickX, 1.0),
    (Axis::LeftStickY, GamepadKey::LStickY, -1.0),
    (Axis::RightStickX, GamepadKey::RStickX, 1.0),
    (Axis::RightStickY, GamepadKey::RStickY, -1.0),
    (Axis::LeftZ, GamepadKey::LT, 1.0),
    (Axis::RightZ, GamepadKey::RT, 1.0),
    (Axis::DPadX, GamepadKey::H, 1.0),
    (Axis::DPadY, GamepadKey::V, -1.0),
];

/// Backend input stripped of platform codes and timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    ButtonPressed(Button),
    ButtonReleased(Button),
    ButtonChanged(Button, f32),
    AxisChanged(Axis, f32),
}

impl RawInput {
    fn from_event(event: &EventType) -> Option<Self> {
        match *event {
            EventType::ButtonPressed(button, _) => Some(RawInput::ButtonPressed(button)),
            EventType::ButtonReleased(button, _) => Some(RawInput::ButtonReleased(button)),
            EventType::ButtonChanged(button, value, _) => {
                Some(RawInput::ButtonChanged(button, value))
            }
            EventType::AxisChanged(axis, value, _) => Some(RawInput::AxisChanged(axis, value)),
            _ => None,
        }
    }
}

/// Merges one backend input into the state. Unmapped buttons and axes are ignored.
pub fn apply_raw_input(state: &mut DeviceState<GamepadKey>, input: RawInput) -> bool {
    match input {
        RawInput::ButtonPressed(button) => {
            if let Some(key) = lookup_button(button) {
                return state.set(key, 1.0);
            }
            if let Some((key, direction)) = lookup_dpad(button) {
                return state.set(key, direction);
            }
            false
        }
        RawInput::ButtonReleased(button) => {
            if let Some(key) = lookup_button(button) {
                return state.set(key, 0.0);
            }
            if let Some((key, direction)) = lookup_dpad(button) {
                // releasing left must not cancel a right that was pressed meanwhile
                if state.get(key) == direction {
                    return state.set(key, 0.0);
                }
            }
            false
        }
        RawInput::ButtonChanged(button, value) => match lookup_trigger(button) {
            Some(key) => state.set(key, value),
            None => false,
        },
        RawInput::AxisChanged(axis, value) => match lookup_axis(axis) {
            Some((key, sign)) => state.set(key, value * sign),
            None => false,
        },
    }
}

fn lookup_button(button: Button) -> Option<GamepadKey> {
    BUTTON_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == button)
        .map(|(_, key)| *key)
}

fn lookup_trigger(button: Button) -> Option<GamepadKey> {
    TRIGGER_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == button)
        .map(|(_, key)| *key)
}

fn lookup_dpad(button: Button) -> Option<(GamepadKey, f32)> {
    DPAD_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == button)
        .map(|(_, key, direction)| (*key, *direction))
}

fn lookup_axis(axis: Axis) -> Option<(GamepadKey, f32)> {
    AXIS_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == axis)
        .map(|(_, key, sign)| (*key, *sign))
}

/// Gamepad read through gilrs.
///
/// Follows the first connected gamepad. If gilrs itself cannot be
/// initialized the device keeps retrying with a fixed backoff.
pub struct GamepadDevice {
    gilrs: Option<Gilrs>,
    active_gamepad: Option<GamepadId>,
    retry_interval: Duration,
    next_attempt: Instant,
}

impl GamepadDevice {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            gilrs: None,
            active_gamepad: None,
            retry_interval,
            next_attempt: Instant::now(),
        }
    }

    fn ensure_backend(&mut self) -> Result<(), DeviceError> {
        if self.gilrs.is_some() || Instant::now() < self.next_attempt {
            return Ok(());
        }

        info!("Initializing gilrs controller interface");
        match Gilrs::new() {
            Ok(gilrs) => {
                info!("Successfully initialized gilrs");
                self.active_gamepad = select_gamepad(&gilrs, None);
                self.gilrs = Some(gilrs);
                Ok(())
            }
            Err(e) => {
                self.next_attempt = Instant::now() + self.retry_interval;
                Err(DeviceError::Backend(format!("Failed to initialize gilrs: {}", e)))
            }
        }
    }
}

impl InputDevice for GamepadDevice {
    type Key = GamepadKey;

    fn name(&self) -> &str {
        "gamepad"
    }

    fn poll_once(&mut self, state: &mut DeviceState<GamepadKey>) -> Result<(), DeviceError> {
        self.ensure_backend()?;
        let Some(gilrs) = self.gilrs.as_mut() else {
            return Ok(());
        };

        while let Some(Event { id, event, .. }) = gilrs.next_event() {
            match event {
                EventType::Connected => {
                    if self.active_gamepad.is_none() {
                        info!("Gamepad {} connected, selecting it", id);
                        self.active_gamepad = Some(id);
                        state.reset();
                    }
                    continue;
                }
                EventType::Disconnected => {
                    if self.active_gamepad == Some(id) {
                        warn!("Active gamepad {} disconnected", id);
                        self.active_gamepad = select_gamepad(gilrs, Some(id));
                        state.reset();
                    }
                    continue;
                }
                _ => {}
            }

            if self.active_gamepad != Some(id) {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            match RawInput::from_event(&event) {
                Some(input) => {
                    if apply_raw_input(state, input) {
                        debug!("Gamepad input applied: {:?}", input);
                    }
                }
                None => debug!("Unhandled event type: {:?}", event),
            }
        }

        Ok(())
    }
}

/// Picks the first connected gamepad other than `lost`
fn select_gamepad(gilrs: &Gilrs, lost: Option<GamepadId>) -> Option<GamepadId> {
    let gamepads: Vec<_> = gilrs.gamepads().collect();
    info!("Found {} gamepads:", gamepads.len());
    for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
        info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
    }

    match first_remaining(gamepads.iter().map(|(id, _)| *id), lost) {
        Some(id) => {
            info!("Selected gamepad: {}", id);
            Some(id)
        }
        None => {
            warn!("No gamepad connected, waiting for one");
            None
        }
    }
}

fn first_remaining<I: Copy + PartialEq>(ids: impl IntoIterator<Item = I>, lost: Option<I>) -> Option<I> {
    ids.into_iter().find(|id| Some(*id) != lost)
}
