//! Default mapping profiles
//!
//! The mapping table is code: each function returns the mappers of one
//! device kind, in the order the dispatch engine fires them.

use crate::controller::{BoardPin, GamepadKey};
use crate::mapping::error::MappingError;
use crate::mapping::mapper::Mapper;
use crate::output::{KeyOutput, OutputKey, Pointer};
use std::sync::Arc;
use std::time::Duration;

/// How long an encoder detent holds its volume key
pub const ENCODER_HOLD: Duration = Duration::from_millis(500);

/// The pointer actuators a gamepad profile drives
#[derive(Debug, Clone)]
pub struct Pointers {
    pub standard: Arc<Pointer>,
    pub fast: Arc<Pointer>,
}

pub fn gamepad_mappers(
    output: &Arc<dyn KeyOutput>,
    pointers: &Pointers,
) -> Result<Vec<Mapper<GamepadKey>>, MappingError> {
    Ok(vec![
        Mapper::button(GamepadKey::A, output, OutputKey::Ctrl),
        Mapper::button(GamepadKey::B, output, OutputKey::Shift),
        Mapper::button(GamepadKey::X, output, OutputKey::Alt),
        Mapper::button(GamepadKey::Start, output, OutputKey::Enter),
        Mapper::button(GamepadKey::Back, output, OutputKey::Backspace),
        Mapper::button(GamepadKey::Center, output, OutputKey::Menu),
        Mapper::direction(GamepadKey::H, output, (OutputKey::Left, OutputKey::Right)),
        Mapper::direction(GamepadKey::V, output, (OutputKey::Up, OutputKey::Down)),
        Mapper::button_combination(GamepadKey::LB, output, &[OutputKey::Ctrl, OutputKey::F1]),
        Mapper::button_combination(GamepadKey::RB, output, &[OutputKey::Ctrl, OutputKey::F2]),
        Mapper::stick_pointer((GamepadKey::RStickX, GamepadKey::RStickY), &pointers.standard),
        Mapper::mouse_button(GamepadKey::RThumb, output, OutputKey::MouseLeft)?,
        Mapper::stick_pointer((GamepadKey::LStickX, GamepadKey::LStickY), &pointers.fast),
        Mapper::mouse_button(GamepadKey::LThumb, output, OutputKey::MouseRight)?,
    ])
}

/// Mute button on pin 2, volume encoder with data on pin 3 and clock on pin 4
pub fn board_mappers(output: &Arc<dyn KeyOutput>) -> Vec<Mapper<BoardPin>> {
    vec![
        Mapper::button(BoardPin::D2, output, OutputKey::VolumeMute),
        Mapper::rotary_encoder(
            BoardPin::D3,
            BoardPin::D4,
            output,
            (OutputKey::VolumeUp, OutputKey::VolumeDown),
            ENCODER_HOLD,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::DeviceState;
    use crate::output::{OutputEvent, PointerSettings, RecordingOutput};

    fn pointers(recorder: &Arc<RecordingOutput>) -> Pointers {
        Pointers {
            standard: Arc::new(Pointer::new(
                "standard",
                PointerSettings::standard(),
                recorder.clone(),
            )),
            fast: Arc::new(Pointer::new("fast", PointerSettings::fast(), recorder.clone())),
        }
    }

    #[test]
    fn gamepad_profile_validates() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let mappers = gamepad_mappers(&output, &pointers(&recorder)).unwrap();

        assert_eq!(mappers.len(), 14);
        assert!(mappers.iter().all(|mapper| mapper.validate().is_ok()));
    }

    #[tokio::test]
    async fn left_bumper_sends_ctrl_f1() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let mappers = gamepad_mappers(&output, &pointers(&recorder)).unwrap();
        let lb = mappers
            .iter()
            .find(|mapper| mapper.name().contains("lb"))
            .unwrap();

        let mut state = DeviceState::new();
        let idle = state.snapshot();
        state.set(GamepadKey::LB, 1.0);
        lb.fire(&state.snapshot(), &idle).await;

        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Press(OutputKey::Ctrl),
                OutputEvent::Press(OutputKey::F1)
            ]
        );
    }

    #[tokio::test]
    async fn left_stick_drives_the_fast_pointer() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let pointers = pointers(&recorder);
        let mappers = gamepad_mappers(&output, &pointers).unwrap();

        let mut state = DeviceState::new();
        let idle = state.snapshot();
        state.set(GamepadKey::LStickX, 0.5);
        state.set(GamepadKey::LStickY, 0.5);
        for mapper in &mappers {
            mapper.fire(&state.snapshot(), &idle).await;
        }

        assert!(pointers.fast.is_running());
        assert!(!pointers.standard.is_running());
    }

    #[tokio::test]
    async fn encoder_turns_volume() {
        let recorder = Arc::new(RecordingOutput::new());
        let output: Arc<dyn KeyOutput> = recorder.clone();
        let mappers = board_mappers(&output);
        assert_eq!(mappers.len(), 2);

        let mut state = DeviceState::new();
        state.set(BoardPin::D2, 1.0);
        let before = state.snapshot();
        state.set(BoardPin::D4, 1.0);

        // only the encoder reacts to the clock edge
        mappers[1].fire(&state.snapshot(), &before).await;
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Press(OutputKey::VolumeUp),
                OutputEvent::Release(OutputKey::VolumeUp)
            ]
        );
    }
}
