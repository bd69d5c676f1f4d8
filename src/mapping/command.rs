//! Output commands run by listeners

use crate::mapping::event::EventContext;
use crate::output::{ActuatorError, KeyOutput, OutputKey, Pointer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One atomic output action
#[derive(Clone)]
pub enum Command {
    /// Presses `key` on `output`
    PressKey {
        output: Arc<dyn KeyOutput>,
        key: OutputKey,
    },
    /// Releases `key` on `output`
    ReleaseKey {
        output: Arc<dyn KeyOutput>,
        key: OutputKey,
    },
    /// Takes the velocity from the event context and starts the pointer
    SetPointerVelocity(Arc<Pointer>),
    /// Zeroes the velocity and stops the pointer
    StopPointer(Arc<Pointer>),
    /// Holds the listener, e.g. between press and release of a pulse
    Wait(Duration),
}

impl Command {
    /// [`Command::PressKey`] on a shared output
    pub fn press(output: &Arc<dyn KeyOutput>, key: OutputKey) -> Self {
        Command::PressKey {
            output: output.clone(),
            key,
        }
    }

    /// [`Command::ReleaseKey`] on a shared output
    pub fn release(output: &Arc<dyn KeyOutput>, key: OutputKey) -> Self {
        Command::ReleaseKey {
            output: output.clone(),
            key,
        }
    }

    /// Runs the command. Only the pointer commands read `context`.
    ///
    /// # Errors
    ///
    /// Returns the [`ActuatorError`] of the output backend for key commands.
    pub async fn execute(&self, context: &EventContext) -> Result<(), ActuatorError> {
        match self {
            Command::PressKey { output, key } => output.press(*key),
            Command::ReleaseKey { output, key } => output.release(*key),
            Command::SetPointerVelocity(pointer) => {
                pointer.set_velocity(context.x, context.y);
                pointer.start();
                Ok(())
            }
            Command::StopPointer(pointer) => {
                pointer.set_velocity(0.0, 0.0);
                pointer.stop();
                Ok(())
            }
            Command::Wait(duration) => {
                debug!("Waiting {:?}", duration);
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }

    /// Output key and the backend it goes to, for startup validation
    pub fn target_key(&self) -> Option<(&Arc<dyn KeyOutput>, OutputKey)> {
        match self {
            Command::PressKey { output, key } | Command::ReleaseKey { output, key } => {
                Some((output, *key))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PressKey { key, .. } => write!(f, "PressKey({})", key),
            Command::ReleaseKey { key, .. } => write!(f, "ReleaseKey({})", key),
            Command::SetPointerVelocity(pointer) => {
                write!(f, "SetPointerVelocity({})", pointer.name())
            }
            Command::StopPointer(pointer) => write!(f, "StopPointer({})", pointer.name()),
            Command::Wait(duration) => write!(f, "Wait({:?})", duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputEvent, PointerSettings, RecordingOutput};

    #[tokio::test]
    async fn pointer_velocity_round_trip() {
        let output = Arc::new(RecordingOutput::new());
        let pointer = Arc::new(Pointer::new("test", PointerSettings::standard(), output));

        Command::SetPointerVelocity(pointer.clone())
            .execute(&EventContext { x: 0.4, y: -0.7 })
            .await
            .unwrap();
        assert_eq!(pointer.velocity(), (0.4, -0.7));
        assert!(pointer.is_running());

        Command::StopPointer(pointer.clone())
            .execute(&EventContext::default())
            .await
            .unwrap();
        assert_eq!(pointer.velocity(), (0.0, 0.0));
        assert!(!pointer.is_running());
    }

    #[tokio::test]
    async fn key_commands_drive_the_output() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let context = EventContext::default();

        Command::press(&output, OutputKey::Enter).execute(&context).await.unwrap();
        Command::release(&output, OutputKey::Enter).execute(&context).await.unwrap();
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Press(OutputKey::Enter),
                OutputEvent::Release(OutputKey::Enter)
            ]
        );
    }

    #[tokio::test]
    async fn wait_blocks_for_its_duration() {
        let started = std::time::Instant::now();
        Command::Wait(Duration::from_millis(20))
            .execute(&EventContext::default())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
