use crate::output::{ActuatorError, KeyOutput, OutputKey, PointerOutput};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// One action observed by a [`RecordingOutput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Press(OutputKey),
    Release(OutputKey),
    Move(i32, i32),
}

/// Output that records every action instead of touching the OS.
///
/// The observable actuator in tests; the history grows without bound, so
/// dry runs use [`crate::output::LoggingOutput`] instead. Keys listed with
/// [`RecordingOutput::failing_on`] fail with an I/O error.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    events: Mutex<Vec<OutputEvent>>,
    failing: HashSet<OutputKey>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(keys: &[OutputKey]) -> Self {
        Self {
            failing: keys.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.lock().clone()
    }

    pub fn take_events(&self) -> Vec<OutputEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputEvent>> {
        // a poisoned log is still a usable log
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: OutputEvent) {
        self.lock().push(event);
    }

    fn check(&self, key: OutputKey) -> Result<(), ActuatorError> {
        if self.failing.contains(&key) {
            return Err(ActuatorError::Io(std::io::Error::other(format!(
                "simulated failure for {}",
                key
            ))));
        }
        Ok(())
    }
}

impl KeyOutput for RecordingOutput {
    fn press(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.check(key)?;
        self.record(OutputEvent::Press(key));
        Ok(())
    }

    fn release(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.check(key)?;
        self.record(OutputEvent::Release(key));
        Ok(())
    }
}

impl PointerOutput for RecordingOutput {
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError> {
        self.record(OutputEvent::Move(dx, dy));
        Ok(())
    }
}
