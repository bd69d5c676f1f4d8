//! Controller Handle - polling worker and snapshot publishing for one device
//!
//! Every input device runs on its own OS thread. The thread owns the device
//! backend and the live [`DeviceState`]; after each poll it publishes a new
//! [`Snapshot`] through a watch channel whenever the state changed.
//!
//! ```text
//! Backend ──poll_once──► DeviceState ──(changed?)──► watch::Sender<Snapshot>
//!                                                        │
//!                                   DeviceHandle::read ◄─┴─► Dispatch Engine
//! ```

use crate::controller::state::{DeviceState, SignalKey, Snapshot};
use chrono::Local;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Polling backend of an input device.
///
/// Implementations read whatever the backend has to offer without blocking
/// for long and merge it into `state`. Devices are created on the worker
/// thread, so they do not need to be `Send`.
pub trait InputDevice {
    type Key: SignalKey;

    fn name(&self) -> &str;

    /// Performs one read from the backend and merges received updates
    fn poll_once(&mut self, state: &mut DeviceState<Self::Key>) -> Result<(), DeviceError>;
}

/// Errors raised by device backends.
///
/// All variants are I/O class: the polling worker logs them and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The underlying transport failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend library reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// No device is reachable right now
    #[error("Device not found: {0}")]
    NotFound(String),

    /// The device answered with something unexpected during setup
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The polling thread could not be started
    #[error("Failed to spawn device worker: {0}")]
    Spawn(String),
}

/// Settings for a device polling worker
#[derive(Clone, Debug)]
pub struct DeviceSettings {
    /// Pause between two polls
    pub poll_interval: Duration,

    /// How often throughput statistics are logged
    pub stats_interval: Duration,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2),
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// Handle to a running device worker
///
/// Cloning the receiver side is cheap, so any number of consumers can
/// observe the device. Dropping the handle without [`DeviceHandle::shutdown`]
/// leaves the thread running until the cancellation token fires.
pub struct DeviceHandle<K: SignalKey> {
    name: String,
    receiver: watch::Receiver<Snapshot<K>>,
    token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl<K: SignalKey> DeviceHandle<K> {
    /// Spawns the polling thread for a device.
    ///
    /// `make_device` runs on the new thread, which lets backends that are not
    /// `Send` (like gilrs on some platforms) live there for their whole life.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn<D, F>(
        name: &str,
        settings: Option<DeviceSettings>,
        token: CancellationToken,
        make_device: F,
    ) -> Result<Self, DeviceError>
    where
        D: InputDevice<Key = K>,
        F: FnOnce() -> D + Send + 'static,
    {
        let settings = settings.unwrap_or_default();
        info!("Spawning device worker {} with settings: {:?}", name, settings);

        let (sender, receiver) = watch::channel(Snapshot::default());
        let worker_token = token.clone();
        let worker = std::thread::Builder::new()
            .name(format!("device-{}", name))
            .spawn(move || {
                let device = make_device();
                run_polling_loop(device, sender, settings, worker_token);
            })
            .map_err(|e| DeviceError::Spawn(e.to_string()))?;

        info!("Device worker {} started", name);
        Ok(Self {
            name: name.to_string(),
            receiver,
            token,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the latest published state
    pub fn read(&self) -> Snapshot<K> {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<K>> {
        debug!("New subscriber to device {}", self.name);
        self.receiver.clone()
    }

    /// Cancels the worker and waits for the thread to exit
    pub fn shutdown(mut self) {
        info!("Shutting down device worker {}", self.name);
        self.token.cancel();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Device worker {} panicked", self.name);
            }
        }
    }
}

fn run_polling_loop<D: InputDevice>(
    mut device: D,
    sender: watch::Sender<Snapshot<D::Key>>,
    settings: DeviceSettings,
    token: CancellationToken,
) {
    info!("Starting polling loop for {}", device.name());

    let mut state = DeviceState::new();
    let mut updates: u64 = 0;
    let mut failures: u64 = 0;
    let mut last_log_time = Local::now();
    let log_interval = chrono::Duration::from_std(settings.stats_interval)
        .unwrap_or_else(|_| chrono::Duration::seconds(10));

    while !token.is_cancelled() {
        match device.poll_once(&mut state) {
            Ok(()) => {
                let published = sender.send_if_modified(|current| {
                    if state.matches(current) {
                        false
                    } else {
                        *current = state.snapshot();
                        true
                    }
                });
                if published {
                    updates += 1;
                    debug!("{} state published: {}", device.name(), state.snapshot());
                }
            }
            Err(e) => {
                // state keeps its last good value for this cycle
                failures += 1;
                warn!("Polling {} failed: {}", device.name(), e);
            }
        }

        let now = Local::now();
        if now - last_log_time > log_interval {
            info!(
                "Device {} stats: {} state updates, {} failed polls in last {} seconds",
                device.name(),
                updates,
                failures,
                log_interval.num_seconds()
            );
            updates = 0;
            failures = 0;
            last_log_time = now;
        }

        std::thread::sleep(settings.poll_interval);
    }

    info!("Polling loop for {} stopped", device.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::tests::TestKey;
    use std::collections::VecDeque;

    /// Replays a script of poll results, one entry per poll
    struct ScriptedDevice {
        script: VecDeque<Result<Vec<(TestKey, f32)>, DeviceError>>,
    }

    impl InputDevice for ScriptedDevice {
        type Key = TestKey;

        fn name(&self) -> &str {
            "scripted"
        }

        fn poll_once(&mut self, state: &mut DeviceState<TestKey>) -> Result<(), DeviceError> {
            match self.script.pop_front() {
                Some(Ok(updates)) => {
                    for (key, value) in updates {
                        state.set(key, value);
                    }
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn publishes_polled_updates_and_survives_failures() {
        let token = CancellationToken::new();
        let script = VecDeque::from(vec![
            Err(DeviceError::Backend("unplugged".into())),
            Ok(vec![(TestKey::A, 1.0)]),
            Err(DeviceError::Io(std::io::Error::other("read failed"))),
            Ok(vec![(TestKey::StickX, 0.456)]),
        ]);
        let settings = DeviceSettings {
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        };
        let handle = DeviceHandle::spawn("scripted", Some(settings), token, move || {
            ScriptedDevice { script }
        })
        .expect("spawn worker");

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while handle.read().get(TestKey::StickX) == 0.0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let snapshot = handle.read();
        assert_eq!(snapshot.get(TestKey::A), 1.0);
        assert_eq!(snapshot.get(TestKey::StickX), 0.46);
        handle.shutdown();
    }

    #[test]
    fn shutdown_stops_the_worker() {
        let token = CancellationToken::new();
        let handle = DeviceHandle::spawn("idle", None, token.clone(), || ScriptedDevice {
            script: VecDeque::new(),
        })
        .expect("spawn worker");
        handle.shutdown();
        assert!(token.is_cancelled());
    }
}
