//! Continuous pointer actuator
//!
//! Commands only write the velocity and the running flag. The worker spawned
//! by [`PointerHandle::spawn`] reads them every tick and emits a relative
//! move while running, so movement continues at the last commanded velocity
//! until the pointer is stopped.

use crate::output::{ActuatorError, PointerOutput};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tuning of one pointer actuator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerSettings {
    /// Pixels per tick at full stick deflection
    pub speed_modifier: f32,

    /// Delay between two movement ticks in milliseconds
    pub delay_ms: u64,
}

impl PointerSettings {
    pub fn standard() -> Self {
        Self {
            speed_modifier: 10.0,
            delay_ms: 5,
        }
    }

    pub fn fast() -> Self {
        Self {
            speed_modifier: 50.0,
            delay_ms: 1,
        }
    }
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self::standard()
    }
}

/// f32 stored as raw bits so writers and the worker never see a torn value
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Pointer velocity plus the backend it moves
#[derive(Debug)]
pub struct Pointer {
    name: String,
    settings: PointerSettings,
    speed_x: AtomicF32,
    speed_y: AtomicF32,
    running: AtomicBool,
    backend: Arc<dyn PointerOutput>,
}

impl Pointer {
    pub fn new(name: &str, settings: PointerSettings, backend: Arc<dyn PointerOutput>) -> Self {
        Self {
            name: name.to_string(),
            settings,
            speed_x: AtomicF32::default(),
            speed_y: AtomicF32::default(),
            running: AtomicBool::new(false),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &PointerSettings {
        &self.settings
    }

    pub fn set_velocity(&self, x: f32, y: f32) {
        self.speed_x.store(x);
        self.speed_y.store(y);
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.speed_x.load(), self.speed_y.load())
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One movement step.
    ///
    /// `carry` keeps the sub-pixel remainder between ticks so small
    /// deflections still move the pointer. Returns the emitted delta.
    pub fn tick(&self, carry: &mut (f32, f32)) -> Result<(i32, i32), ActuatorError> {
        if !self.is_running() {
            *carry = (0.0, 0.0);
            return Ok((0, 0));
        }

        let (speed_x, speed_y) = self.velocity();
        let x = speed_x * self.settings.speed_modifier + carry.0;
        let y = speed_y * self.settings.speed_modifier + carry.1;
        let dx = x.trunc();
        let dy = y.trunc();
        *carry = (x - dx, y - dy);

        let delta = (dx as i32, dy as i32);
        if delta != (0, 0) {
            self.backend.move_by(delta.0, delta.1)?;
        }
        Ok(delta)
    }
}

/// Handle to the movement worker of a pointer
#[derive(Debug)]
pub struct PointerHandle {
    name: String,
    token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl PointerHandle {
    /// Starts the movement worker on the current tokio runtime
    pub fn spawn(pointer: Arc<Pointer>, token: CancellationToken) -> Self {
        let name = pointer.name().to_string();
        let delay = Duration::from_millis(pointer.settings().delay_ms.max(1));
        info!("Spawning pointer worker {} with tick {:?}", name, delay);

        let worker_token = token.clone();
        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut carry = (0.0, 0.0);

            loop {
                tokio::select! {
                    _ = worker_token.cancelled() => {
                        info!("Shutdown signal received for pointer {}", pointer.name());
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = pointer.tick(&mut carry) {
                            warn!("Pointer {} failed to move: {}", pointer.name(), e);
                        }
                    }
                }
            }
        });

        Self {
            name,
            token,
            task_handle: Some(task_handle),
        }
    }

    /// Cancels the worker and waits for it
    pub async fn shutdown(&mut self) {
        debug!("Sending shutdown signal to pointer worker: {}", self.name);
        self.token.cancel();
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Pointer worker panicked: {} - {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputEvent, RecordingOutput};

    fn pointer(modifier: f32) -> (Arc<RecordingOutput>, Pointer) {
        let output = Arc::new(RecordingOutput::new());
        let settings = PointerSettings {
            speed_modifier: modifier,
            delay_ms: 1,
        };
        let pointer = Pointer::new("test", settings, output.clone());
        (output, pointer)
    }

    #[test]
    fn stopped_pointer_does_not_move() {
        let (output, pointer) = pointer(10.0);
        pointer.set_velocity(0.5, 0.5);
        let mut carry = (0.0, 0.0);
        assert_eq!(pointer.tick(&mut carry).unwrap(), (0, 0));
        assert!(output.events().is_empty());
    }

    #[test]
    fn running_pointer_moves_every_tick() {
        let (output, pointer) = pointer(10.0);
        pointer.set_velocity(0.3, -0.5);
        pointer.start();
        let mut carry = (0.0, 0.0);
        pointer.tick(&mut carry).unwrap();
        pointer.tick(&mut carry).unwrap();
        assert_eq!(
            output.events(),
            vec![OutputEvent::Move(3, -5), OutputEvent::Move(3, -5)]
        );
    }

    #[test]
    fn small_velocities_accumulate() {
        let (output, pointer) = pointer(1.0);
        pointer.set_velocity(0.25, 0.0);
        pointer.start();
        let mut carry = (0.0, 0.0);
        for _ in 0..4 {
            pointer.tick(&mut carry).unwrap();
        }
        assert_eq!(output.events(), vec![OutputEvent::Move(1, 0)]);
    }

    #[tokio::test]
    async fn worker_moves_until_cancelled() {
        let (output, pointer) = pointer(10.0);
        let pointer = Arc::new(pointer);
        pointer.set_velocity(1.0, 0.0);
        pointer.start();

        let mut handle = PointerHandle::spawn(pointer.clone(), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(30)).await;
        pointer.stop();
        handle.shutdown().await;

        let moves = output.events();
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|event| *event == OutputEvent::Move(10, 0)));
    }
}
