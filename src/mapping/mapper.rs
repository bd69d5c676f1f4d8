//! Mappers: named groups of listeners implementing one remapping
//!
//! The constructors here are the remapping vocabulary the profiles are
//! written in. Every mapper is built once at startup and never changes.

use crate::controller::state::{SignalKey, Snapshot};
use crate::mapping::command::Command;
use crate::mapping::error::MappingError;
use crate::mapping::event::Event;
use crate::mapping::listener::Listener;
use crate::output::{KeyOutput, OutputKey, Pointer};
use std::sync::Arc;
use std::time::Duration;

/// Named, ordered group of listeners implementing one remapping
///
/// Built by a profile at startup, usually through one of the constructors
/// below, and never mutated afterwards.
///
/// # Examples
///
/// ```rust
/// use padmap::controller::GamepadKey;
/// use padmap::mapping::Mapper;
/// use padmap::output::{KeyOutput, OutputKey, RecordingOutput};
/// use std::sync::Arc;
///
/// let output: Arc<dyn KeyOutput> = Arc::new(RecordingOutput::new());
/// let mappers = vec![
///     Mapper::button(GamepadKey::A, &output, OutputKey::Ctrl),
///     Mapper::direction(GamepadKey::H, &output, (OutputKey::Left, OutputKey::Right)),
/// ];
/// assert_eq!(mappers[0].name(), "button a -> Ctrl");
/// assert!(mappers.iter().all(|mapper| mapper.validate().is_ok()));
/// ```
#[derive(Debug, Clone)]
pub struct Mapper<K: SignalKey> {
    /// Human readable description, used in logs and validation errors
    name: String,

    /// Fired in declaration order
    listeners: Vec<Listener<K>>,
}

impl<K: SignalKey> Mapper<K> {
    /// Creates a mapper from hand-built listeners
    pub fn new(name: impl Into<String>, listeners: Vec<Listener<K>>) -> Self {
        Self {
            name: name.into(),
            listeners,
        }
    }

    /// Description such as `button a -> Ctrl`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fires every listener in declaration order, returns how many held
    pub async fn fire(&self, current: &Snapshot<K>, previous: &Snapshot<K>) -> usize {
        let mut fired = 0;
        for listener in &self.listeners {
            if listener.fire(current, previous).await {
                fired += 1;
            }
        }
        fired
    }

    /// Checks that the output backend can emit every key this mapper uses
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::UnsupportedKey`] for the first key the
    /// backend rejects.
    pub fn validate(&self) -> Result<(), MappingError> {
        let unsupported = self
            .listeners
            .iter()
            .flat_map(|listener| listener.commands.iter())
            .filter_map(Command::target_key)
            .find(|(output, key)| !output.supports(*key));

        match unsupported {
            Some((_, key)) => Err(MappingError::UnsupportedKey {
                mapper: self.name.clone(),
                key,
            }),
            None => Ok(()),
        }
    }

    /// Press `out_key` while `key` is 1, release it on 0
    pub fn button(key: K, output: &Arc<dyn KeyOutput>, out_key: OutputKey) -> Self {
        Self::new(
            format!("button {} -> {}", key, out_key),
            vec![
                Listener::new(
                    Event::on_key_press(&[key]),
                    vec![Command::press(output, out_key)],
                ),
                Listener::new(
                    Event::on_key_release(&[key]),
                    vec![Command::release(output, out_key)],
                ),
            ],
        )
    }

    /// Tap `out_key` for `hold` whenever `key` goes to 1
    pub fn button_pulse(
        key: K,
        output: &Arc<dyn KeyOutput>,
        out_key: OutputKey,
        hold: Duration,
    ) -> Self {
        Self::new(
            format!("pulse {} -> {}", key, out_key),
            vec![Listener::new(
                Event::on_key_press(&[key]),
                pulse(output, out_key, hold),
            )],
        )
    }

    /// Press all `out_keys` in order on 1, release them in the same order on 0
    pub fn button_combination(key: K, output: &Arc<dyn KeyOutput>, out_keys: &[OutputKey]) -> Self {
        let names: Vec<String> = out_keys.iter().map(ToString::to_string).collect();
        Self::new(
            format!("combination {} -> {}", key, names.join("+")),
            vec![
                Listener::new(
                    Event::on_key_press(&[key]),
                    out_keys
                        .iter()
                        .map(|out_key| Command::press(output, *out_key))
                        .collect(),
                ),
                Listener::new(
                    Event::on_key_release(&[key]),
                    out_keys
                        .iter()
                        .map(|out_key| Command::release(output, *out_key))
                        .collect(),
                ),
            ],
        )
    }

    /// Directional signal: -1 presses `negative`, 1 presses `positive`,
    /// 0 releases both
    pub fn direction(
        key: K,
        output: &Arc<dyn KeyOutput>,
        (negative, positive): (OutputKey, OutputKey),
    ) -> Self {
        Self::new(
            format!("direction {} -> {}/{}", key, negative, positive),
            vec![
                Listener::new(
                    Event::on_key_state(&[key], -1.0),
                    vec![Command::press(output, negative)],
                ),
                Listener::new(
                    Event::on_key_state(&[key], 1.0),
                    vec![Command::press(output, positive)],
                ),
                Listener::new(
                    Event::on_key_state(&[key], 0.0),
                    vec![
                        Command::release(output, negative),
                        Command::release(output, positive),
                    ],
                ),
            ],
        )
    }

    /// Like [`Mapper::button`], restricted to pointer buttons
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::ConfigError`] if `button` is a keyboard key.
    pub fn mouse_button(
        key: K,
        output: &Arc<dyn KeyOutput>,
        button: OutputKey,
    ) -> Result<Self, MappingError> {
        if !button.is_pointer_button() {
            return Err(MappingError::ConfigError(format!(
                "{} is not a pointer button",
                button
            )));
        }
        let mut mapper = Self::button(key, output, button);
        mapper.name = format!("mouse button {} -> {}", key, button);
        Ok(mapper)
    }

    /// Drives `pointer` with the deflection of a stick
    pub fn stick_pointer((x, y): (K, K), pointer: &Arc<Pointer>) -> Self {
        Self::new(
            format!("stick {}/{} -> pointer {}", x, y, pointer.name()),
            vec![
                Listener::new(
                    Event::on_stick_move(x, y),
                    vec![Command::SetPointerVelocity(pointer.clone())],
                ),
                Listener::new(
                    Event::on_stick_stop(x, y),
                    vec![Command::StopPointer(pointer.clone())],
                ),
            ],
        )
    }

    /// One pulse of `clockwise` or `counter_clockwise` per encoder detent
    pub fn rotary_encoder(
        data: K,
        clock: K,
        output: &Arc<dyn KeyOutput>,
        (clockwise, counter_clockwise): (OutputKey, OutputKey),
        hold: Duration,
    ) -> Self {
        Self::new(
            format!(
                "rotary {}/{} -> {}/{}",
                data, clock, clockwise, counter_clockwise
            ),
            vec![
                Listener::new(
                    Event::on_clockwise_rotation(data, clock),
                    pulse(output, clockwise, hold),
                ),
                Listener::new(
                    Event::on_counter_clockwise_rotation(data, clock),
                    pulse(output, counter_clockwise, hold),
                ),
            ],
        )
    }
}

fn pulse(output: &Arc<dyn KeyOutput>, key: OutputKey, hold: Duration) -> Vec<Command> {
    vec![
        Command::press(output, key),
        Command::Wait(hold),
        Command::release(output, key),
    ]
}
