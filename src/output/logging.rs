use crate::output::{ActuatorError, KeyOutput, OutputKey, PointerOutput};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Dry-run backend: logs actions instead of touching the OS.
///
/// Keeps only counters, so it can run unattended for as long as the
/// process lives. Key actions log at info, pointer moves at debug.
#[derive(Debug, Default)]
pub struct LoggingOutput {
    key_actions: AtomicU64,
    moves: AtomicU64,
}

impl LoggingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presses and releases seen so far
    pub fn key_actions(&self) -> u64 {
        self.key_actions.load(Ordering::Relaxed)
    }

    /// Pointer moves seen so far
    pub fn moves(&self) -> u64 {
        self.moves.load(Ordering::Relaxed)
    }
}

impl KeyOutput for LoggingOutput {
    fn press(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.key_actions.fetch_add(1, Ordering::Relaxed);
        info!("Output: press {}", key);
        Ok(())
    }

    fn release(&self, key: OutputKey) -> Result<(), ActuatorError> {
        self.key_actions.fetch_add(1, Ordering::Relaxed);
        info!("Output: release {}", key);
        Ok(())
    }
}

impl PointerOutput for LoggingOutput {
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError> {
        self.moves.fetch_add(1, Ordering::Relaxed);
        debug!("Output: move by ({}, {})", dx, dy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Pointer, PointerSettings};
    use std::sync::Arc;

    #[test]
    fn long_pointer_runs_keep_no_history() {
        let output = Arc::new(LoggingOutput::new());
        let pointer = Pointer::new("fast", PointerSettings::fast(), output.clone());
        pointer.set_velocity(1.0, -1.0);
        pointer.start();

        let mut carry = (0.0, 0.0);
        for _ in 0..10_000 {
            assert_eq!(pointer.tick(&mut carry).unwrap(), (50, -50));
        }

        assert_eq!(output.moves(), 10_000);
        assert_eq!(output.key_actions(), 0);
        // counters only, no per-action storage
        assert_eq!(std::mem::size_of::<LoggingOutput>(), 2 * std::mem::size_of::<AtomicU64>());
    }

    #[test]
    fn key_actions_are_counted() {
        let output = LoggingOutput::new();
        output.press(OutputKey::Enter).unwrap();
        output.release(OutputKey::Enter).unwrap();
        assert_eq!(output.key_actions(), 2);
        assert_eq!(output.moves(), 0);
    }
}
