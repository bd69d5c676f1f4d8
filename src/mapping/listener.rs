use crate::controller::state::{SignalKey, Snapshot};
use crate::mapping::command::Command;
use crate::mapping::event::Event;
use tracing::{debug, warn};

/// An event paired with the commands it triggers
#[derive(Debug, Clone)]
pub struct Listener<K: SignalKey> {
    pub event: Event<K>,
    pub commands: Vec<Command>,
}

impl<K: SignalKey> Listener<K> {
    pub fn new(event: Event<K>, commands: Vec<Command>) -> Self {
        Self { event, commands }
    }

    /// Runs every command in order if the event holds.
    ///
    /// A failing command is logged and the remaining ones still run.
    /// Returns whether the event held.
    pub async fn fire(&self, current: &Snapshot<K>, previous: &Snapshot<K>) -> bool {
        let Some(context) = self.event.evaluate(current, previous) else {
            return false;
        };

        debug!("Event {:?} holds, running {:?}", self.event, self.commands);
        for command in &self.commands {
            if let Err(e) = command.execute(&context).await {
                warn!("Command {:?} failed: {}", command, e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::tests::{snapshot, TestKey};
    use crate::output::{KeyOutput, OutputEvent, OutputKey, RecordingOutput};
    use std::sync::Arc;

    #[tokio::test]
    async fn commands_run_in_declared_order() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let listener = Listener::new(
            Event::on_key_press(&[TestKey::A]),
            vec![
                Command::press(&output, OutputKey::Ctrl),
                Command::press(&output, OutputKey::F1),
            ],
        );

        let fired = listener
            .fire(&snapshot(&[(TestKey::A, 1.0)]), &Snapshot::default())
            .await;

        assert!(fired);
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Press(OutputKey::Ctrl),
                OutputEvent::Press(OutputKey::F1)
            ]
        );
    }

    #[tokio::test]
    async fn nothing_runs_when_the_event_does_not_hold() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let listener = Listener::new(
            Event::on_key_press(&[TestKey::A]),
            vec![Command::press(&output, OutputKey::Ctrl)],
        );

        assert!(!listener.fire(&snapshot(&[]), &Snapshot::default()).await);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn failing_command_does_not_stop_the_rest() {
        let recorder = Arc::new(RecordingOutput::failing_on(&[OutputKey::Ctrl]));
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let listener = Listener::new(
            Event::on_key_press(&[TestKey::A]),
            vec![
                Command::press(&output, OutputKey::Ctrl),
                Command::press(&output, OutputKey::F1),
            ],
        );

        assert!(
            listener
                .fire(&snapshot(&[(TestKey::A, 1.0)]), &Snapshot::default())
                .await
        );
        assert_eq!(recorder.events(), vec![OutputEvent::Press(OutputKey::F1)]);
    }
}
