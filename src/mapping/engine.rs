//! Dispatch engine: diffs device snapshots and fires mappers
//!
//! One engine runs per input device, in its own tokio task. It waits for the
//! device worker to publish a snapshot, compares it with the last one it
//! dispatched and, when they differ, fires every mapper.
//!
//! ```text
//! watch::Receiver<Snapshot> ──► [diff vs last] ──► Mapper ──► Listener ──► Command
//!                                     │
//!                                 (equal: skip)
//! ```
//!
//! Passes of one engine never overlap: a listener that waits holds back the
//! next pass of that device only.

use crate::controller::state::{SignalKey, Snapshot};
use crate::mapping::error::MappingError;
use crate::mapping::mapper::Mapper;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Edge-triggered dispatcher for one device
///
/// Keeps the last dispatched snapshot and fires every mapper, in declaration
/// order, only when a new snapshot differs from it. No snapshot is stored
/// before the first pass, so the first snapshot always dispatches.
///
/// # Examples
///
/// ```rust
/// use padmap::controller::{DeviceState, GamepadKey};
/// use padmap::mapping::{DispatchEngine, Mapper};
/// use padmap::output::{KeyOutput, OutputKey, RecordingOutput};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let output: Arc<dyn KeyOutput> = Arc::new(RecordingOutput::new());
/// let mut engine = DispatchEngine::new(
///     "gamepad",
///     vec![Mapper::button(GamepadKey::A, &output, OutputKey::Ctrl)],
/// );
///
/// let mut state = DeviceState::new();
/// state.set(GamepadKey::A, 1.0);
/// assert!(engine.dispatch(state.snapshot()).await);
/// // same state again: nothing fires
/// assert!(!engine.dispatch(state.snapshot()).await);
/// # }
/// ```
pub struct DispatchEngine<K: SignalKey> {
    /// Device name, used in logs
    name: String,

    /// Fired in this order on every pass
    mappers: Vec<Mapper<K>>,

    /// Snapshot of the last pass, `None` until the first one
    last: Option<Snapshot<K>>,
}

impl<K: SignalKey> DispatchEngine<K> {
    /// Creates an engine with nothing dispatched yet
    pub fn new(name: &str, mappers: Vec<Mapper<K>>) -> Self {
        info!(
            "Initializing dispatch engine {} with {} mappers",
            name,
            mappers.len()
        );
        Self {
            name: name.to_string(),
            mappers,
            last: None,
        }
    }

    /// Device name the engine was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks every mapper against its output backend
    ///
    /// # Errors
    ///
    /// Returns the first [`MappingError::UnsupportedKey`] found.
    pub fn validate(&self) -> Result<(), MappingError> {
        for mapper in &self.mappers {
            mapper.validate()?;
            debug!("Mapper validated: {}", mapper.name());
        }
        Ok(())
    }

    /// Runs one dispatch pass. Returns `false` if `snapshot` equals the
    /// last dispatched one, in which case no listener runs.
    pub async fn dispatch(&mut self, snapshot: Snapshot<K>) -> bool {
        if self.last.as_ref() == Some(&snapshot) {
            return false;
        }

        info!("{}: state changed", self.name);
        debug!("{}: {}", self.name, snapshot);

        let previous = self.last.take().unwrap_or_default();
        let mut fired = 0;
        for mapper in &self.mappers {
            fired += mapper.fire(&snapshot, &previous).await;
        }
        debug!("{}: {} listeners fired", self.name, fired);

        self.last = Some(snapshot);
        true
    }

    /// Dispatches every snapshot published on `receiver` until `token` is cancelled
    /// or the device worker goes away.
    pub async fn run_until_shutdown(
        mut self,
        mut receiver: watch::Receiver<Snapshot<K>>,
        token: CancellationToken,
    ) {
        info!("Starting dispatch loop for: {}", self.name);

        let initial = receiver.borrow_and_update().clone();
        self.dispatch(initial).await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Shutdown signal received for: {}", self.name);
                    break;
                }

                changed = receiver.changed() => {
                    if changed.is_err() {
                        warn!("Device worker for {} stopped publishing", self.name);
                        break;
                    }
                    let snapshot = receiver.borrow_and_update().clone();
                    self.dispatch(snapshot).await;
                }
            }
        }

        info!("Dispatch loop stopped: {}", self.name);
    }
}

/// Handle to a running dispatch task
#[derive(Debug)]
pub struct DispatchHandle {
    name: String,
    token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Spawns the engine on the current tokio runtime
    pub fn spawn<K: SignalKey>(
        engine: DispatchEngine<K>,
        receiver: watch::Receiver<Snapshot<K>>,
        token: CancellationToken,
    ) -> Self {
        let name = engine.name().to_string();
        info!("Spawning dispatch task: {}", name);

        let task_token = token.clone();
        let task_handle = tokio::spawn(engine.run_until_shutdown(receiver, task_token));

        Self {
            name,
            token,
            task_handle: Some(task_handle),
        }
    }

    /// Name of the engine driven by this task
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancels the task and waits for the pass in flight to finish
    pub async fn shutdown(&mut self) -> Result<(), MappingError> {
        debug!("Sending shutdown signal to dispatch task: {}", self.name);
        self.token.cancel();

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Dispatch task panicked: {} - {}", self.name, e);
                return Err(MappingError::ThreadError(format!(
                    "dispatch task {} failed: {}",
                    self.name, e
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::tests::{snapshot, TestKey};
    use crate::output::{KeyOutput, OutputEvent, OutputKey, RecordingOutput};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> (Arc<RecordingOutput>, DispatchEngine<TestKey>) {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let engine = DispatchEngine::new(
            "test",
            vec![
                Mapper::button(TestKey::A, &output, OutputKey::Ctrl),
                Mapper::button(TestKey::B, &output, OutputKey::Shift),
            ],
        );
        (recorder, engine)
    }

    #[tokio::test]
    async fn first_snapshot_always_dispatches() {
        let (recorder, mut engine) = engine();
        assert!(engine.dispatch(snapshot(&[])).await);
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Release(OutputKey::Ctrl),
                OutputEvent::Release(OutputKey::Shift)
            ]
        );
    }

    #[tokio::test]
    async fn equal_snapshots_fire_nothing() {
        let (recorder, mut engine) = engine();
        engine.dispatch(snapshot(&[(TestKey::A, 1.0)])).await;
        recorder.take_events();

        assert!(!engine.dispatch(snapshot(&[(TestKey::A, 1.0)])).await);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn mappers_fire_in_declaration_order() {
        let (recorder, mut engine) = engine();
        engine
            .dispatch(snapshot(&[(TestKey::A, 1.0), (TestKey::B, 1.0)]))
            .await;
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Press(OutputKey::Ctrl),
                OutputEvent::Press(OutputKey::Shift)
            ]
        );
    }

    #[tokio::test]
    async fn handle_follows_the_watch_channel() {
        let (recorder, engine) = engine();
        let (sender, receiver) = watch::channel(snapshot(&[]));
        let token = CancellationToken::new();
        let mut handle = DispatchHandle::spawn(engine, receiver, token);

        sender.send_replace(snapshot(&[(TestKey::A, 1.0)]));
        let mut waited = 0;
        while !recorder.events().contains(&OutputEvent::Press(OutputKey::Ctrl)) && waited < 100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }

        handle.shutdown().await.unwrap();
        assert!(recorder.events().contains(&OutputEvent::Press(OutputKey::Ctrl)));
    }
}
