//! Device state and snapshots
//!
//! Every input device owns one [`DeviceState`] keyed by its closed set of
//! [`SignalKey`]s. The polling worker is the only writer; everybody else sees
//! immutable [`Snapshot`]s published through a watch channel.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;

/// How raw backend values are normalized for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Buttons and pins, values in {0, 1}
    Binary,
    /// Hat switches, values in {-1, 0, 1}
    Directional,
    /// Sticks, values in [-1, 1]
    Axis,
    /// Analog triggers, values in [0, 1]
    Trigger,
}

impl SignalKind {
    pub fn normalize(self, raw: f32) -> f32 {
        if raw.is_nan() {
            return 0.0;
        }
        match self {
            SignalKind::Binary => {
                if raw != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            SignalKind::Directional => {
                if raw > 0.0 {
                    1.0
                } else if raw < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            SignalKind::Axis => round_precision(raw.clamp(-1.0, 1.0)),
            SignalKind::Trigger => round_precision(raw.clamp(0.0, 1.0)),
        }
    }
}

/// Analog values keep two decimal digits so jitter does not cause dispatch storms.
fn round_precision(value: f32) -> f32 {
    let rounded = (value * 100.0).round() / 100.0;
    // -0.0 would compare equal but prints oddly in logs
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// One named input channel of a device kind.
///
/// Implementors are closed enums; [`SignalKey::ALL`] lists every variant and
/// fixes the key set of a [`DeviceState`] at construction.
pub trait SignalKey:
    Copy + Ord + Hash + Debug + Display + Send + Sync + 'static
{
    const ALL: &'static [Self];

    fn kind(self) -> SignalKind;

    /// Stable name used in logs and snapshot output
    fn label(self) -> &'static str;
}

/// Live, mutable state of one device
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState<K: SignalKey> {
    values: BTreeMap<K, f32>,
}

impl<K: SignalKey> DeviceState<K> {
    pub fn new() -> Self {
        Self {
            values: K::ALL.iter().map(|key| (*key, 0.0)).collect(),
        }
    }

    /// Stores a raw value after normalizing it for the key's kind.
    /// Returns true when the stored value changed.
    pub fn set(&mut self, key: K, raw: f32) -> bool {
        let value = key.kind().normalize(raw);
        match self.values.insert(key, value) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    pub fn get(&self, key: K) -> f32 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    /// Replaces the whole state with zeros, used after a reconnect
    pub fn reset(&mut self) {
        for value in self.values.values_mut() {
            *value = 0.0;
        }
    }

    pub fn snapshot(&self) -> Snapshot<K> {
        Snapshot {
            values: self.values.clone(),
        }
    }

    /// Value-equality against a published snapshot without allocating
    pub fn matches(&self, snapshot: &Snapshot<K>) -> bool {
        self.values == snapshot.values
    }
}

impl<K: SignalKey> Default for DeviceState<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of a device state at one instant
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<K: SignalKey> {
    values: BTreeMap<K, f32>,
}

impl<K: SignalKey> Snapshot<K> {
    pub fn get(&self, key: K) -> f32 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, f32)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }
}

impl<K: SignalKey> Default for Snapshot<K> {
    fn default() -> Self {
        DeviceState::new().snapshot()
    }
}

impl<K: SignalKey> Display for Snapshot<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (key, value) in self.iter().filter(|(_, value)| *value != 0.0) {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
            first = false;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small key set shared by the mapping tests
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum TestKey {
        A,
        B,
        Hat,
        StickX,
        StickY,
        Trigger,
        Clock,
        Data,
    }

    impl Display for TestKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.label())
        }
    }

    impl SignalKey for TestKey {
        const ALL: &'static [Self] = &[
            TestKey::A,
            TestKey::B,
            TestKey::Hat,
            TestKey::StickX,
            TestKey::StickY,
            TestKey::Trigger,
            TestKey::Clock,
            TestKey::Data,
        ];

        fn kind(self) -> SignalKind {
            match self {
                TestKey::A | TestKey::B | TestKey::Clock | TestKey::Data => SignalKind::Binary,
                TestKey::Hat => SignalKind::Directional,
                TestKey::StickX | TestKey::StickY => SignalKind::Axis,
                TestKey::Trigger => SignalKind::Trigger,
            }
        }

        fn label(self) -> &'static str {
            match self {
                TestKey::A => "a",
                TestKey::B => "b",
                TestKey::Hat => "hat",
                TestKey::StickX => "stick_x",
                TestKey::StickY => "stick_y",
                TestKey::Trigger => "trigger",
                TestKey::Clock => "clock",
                TestKey::Data => "data",
            }
        }
    }

    pub fn snapshot(values: &[(TestKey, f32)]) -> Snapshot<TestKey> {
        let mut state = DeviceState::new();
        for (key, value) in values {
            state.set(*key, *value);
        }
        state.snapshot()
    }

    #[test]
    fn starts_with_every_key_at_zero() {
        let state = DeviceState::<TestKey>::new();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.iter().count(), TestKey::ALL.len());
        assert!(snapshot.iter().all(|(_, value)| value == 0.0));
    }

    #[test]
    fn normalizes_by_signal_kind() {
        let mut state = DeviceState::<TestKey>::new();
        state.set(TestKey::A, 7.0);
        state.set(TestKey::Hat, -0.4);
        state.set(TestKey::StickX, 0.123_456);
        state.set(TestKey::StickY, -3.0);
        state.set(TestKey::Trigger, -0.5);

        assert_eq!(state.get(TestKey::A), 1.0);
        assert_eq!(state.get(TestKey::Hat), -1.0);
        assert_eq!(state.get(TestKey::StickX), 0.12);
        assert_eq!(state.get(TestKey::StickY), -1.0);
        assert_eq!(state.get(TestKey::Trigger), 0.0);
    }

    #[test]
    fn jitter_below_precision_does_not_change_state() {
        let mut state = DeviceState::<TestKey>::new();
        assert!(state.set(TestKey::StickX, 0.501));
        let before = state.snapshot();
        assert!(!state.set(TestKey::StickX, 0.504));
        assert!(state.matches(&before));
    }

    #[test]
    fn reset_restores_zero_state() {
        let mut state = DeviceState::<TestKey>::new();
        state.set(TestKey::A, 1.0);
        state.set(TestKey::StickX, 0.7);
        state.reset();
        assert_eq!(state.snapshot(), Snapshot::default());
    }

    #[test]
    fn labels_are_unique() {
        let labels: std::collections::BTreeSet<_> =
            TestKey::ALL.iter().map(|key| key.label()).collect();
        assert_eq!(labels.len(), TestKey::ALL.len());
    }
}
