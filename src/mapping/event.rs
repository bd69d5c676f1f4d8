//! Event predicates evaluated against device snapshots

use crate::controller::state::{SignalKey, Snapshot};

/// Payload handed from a predicate to its commands
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventContext {
    pub x: f32,
    pub y: f32,
}

/// Closed set of conditions a listener can wait for
///
/// Events are pure predicates over the current snapshot, plus the previous one
/// for the rotation events. They never touch an output.
///
/// # Examples
///
/// ```rust
/// use padmap::controller::{DeviceState, GamepadKey, Snapshot};
/// use padmap::mapping::Event;
///
/// let left = Event::on_key_state(&[GamepadKey::H], -1.0);
///
/// let mut state = DeviceState::new();
/// state.set(GamepadKey::H, -0.8);
/// assert!(left.evaluate(&state.snapshot(), &Snapshot::default()).is_some());
///
/// state.set(GamepadKey::H, 0.0);
/// assert!(left.evaluate(&state.snapshot(), &Snapshot::default()).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Event<K: SignalKey> {
    /// Every key holds `state`
    KeyState { keys: Vec<K>, state: f32 },
    /// Both axes deflected
    StickMove { x: K, y: K },
    /// Both axes centered
    StickStop { x: K, y: K },
    /// Clock rose while data differs from it
    ClockwiseRotation { data: K, clock: K },
    /// Clock rose while data matches it
    CounterClockwiseRotation { data: K, clock: K },
}

impl<K: SignalKey> Event<K> {
    /// Holds while every key reads 1
    pub fn on_key_press(keys: &[K]) -> Self {
        Self::on_key_state(keys, 1.0)
    }

    /// Holds while every key reads 0
    pub fn on_key_release(keys: &[K]) -> Self {
        Self::on_key_state(keys, 0.0)
    }

    /// Holds while every key reads `state`, e.g. -1 for a d-pad pushed left
    pub fn on_key_state(keys: &[K], state: f32) -> Self {
        Event::KeyState {
            keys: keys.to_vec(),
            state,
        }
    }

    /// Holds while both axes are deflected; the context carries `{x, y}`
    pub fn on_stick_move(x: K, y: K) -> Self {
        Event::StickMove { x, y }
    }

    /// Holds while both axes are exactly centered
    pub fn on_stick_stop(x: K, y: K) -> Self {
        Event::StickStop { x, y }
    }

    /// Holds on the pass where `clock` rises and `data` differs from it
    pub fn on_clockwise_rotation(data: K, clock: K) -> Self {
        Event::ClockwiseRotation { data, clock }
    }

    /// Holds on the pass where `clock` rises and `data` matches it
    pub fn on_counter_clockwise_rotation(data: K, clock: K) -> Self {
        Event::CounterClockwiseRotation { data, clock }
    }

    /// Checks the condition. `Some` carries the context for the commands.
    ///
    /// `previous` is the snapshot of the last dispatch pass; only the rotation
    /// events look at it.
    pub fn evaluate(&self, current: &Snapshot<K>, previous: &Snapshot<K>) -> Option<EventContext> {
        let holds = match self {
            Event::KeyState { keys, state } => keys.iter().all(|key| current.get(*key) == *state),
            Event::StickMove { x, y } => {
                let (x, y) = (current.get(*x), current.get(*y));
                if x.abs() > 0.0 && y.abs() > 0.0 {
                    return Some(EventContext { x, y });
                }
                false
            }
            // a single centered axis satisfies neither move nor stop
            Event::StickStop { x, y } => current.get(*x) == 0.0 && current.get(*y) == 0.0,
            Event::ClockwiseRotation { data, clock } => {
                clock_rose(*clock, current, previous) && current.get(*data) != current.get(*clock)
            }
            Event::CounterClockwiseRotation { data, clock } => {
                clock_rose(*clock, current, previous) && current.get(*data) == current.get(*clock)
            }
        };
        holds.then(EventContext::default)
    }
}

fn clock_rose<K: SignalKey>(clock: K, current: &Snapshot<K>, previous: &Snapshot<K>) -> bool {
    previous.get(clock) == 0.0 && current.get(clock) == 1.0
}
