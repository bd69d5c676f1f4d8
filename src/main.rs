use color_eyre::{eyre::eyre, Result};
use padmap::config::{self, Settings};
use padmap::controller::{
    BoardDevice, DeviceHandle, GamepadDevice, SerialConnector, SignalKey,
};
use padmap::mapping::{profile, DispatchEngine, DispatchHandle, Mapper, Pointers};
use padmap::output::{KeyOutput, LoggingOutput, Pointer, PointerHandle, PointerOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEVICE_NAME: &str = "padmap virtual input";
const GAMEPAD_RETRY: Duration = Duration::from_secs(1);
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(10);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = Settings::load().await?;
    info!("Starting with settings: {:?}", settings);

    let (key_output, pointer_output) = create_output(&settings);
    let token = CancellationToken::new();

    let pointers = Pointers {
        standard: Arc::new(Pointer::new(
            "standard",
            settings.pointers.standard.clone(),
            pointer_output.clone(),
        )),
        fast: Arc::new(Pointer::new(
            "fast",
            settings.pointers.fast.clone(),
            pointer_output,
        )),
    };
    let mut pointer_handles = vec![
        PointerHandle::spawn(pointers.standard.clone(), token.child_token()),
        PointerHandle::spawn(pointers.fast.clone(), token.child_token()),
    ];

    let mut dispatchers = Vec::new();

    let gamepad = if settings.gamepad.enabled {
        let engine = build_engine("gamepad", profile::gamepad_mappers(&key_output, &pointers)?)?;
        let handle = DeviceHandle::spawn(
            "gamepad",
            Some(settings.gamepad.device_settings()),
            token.child_token(),
            || GamepadDevice::new(GAMEPAD_RETRY),
        )
        .map_err(|e| eyre!("Failed to spawn gamepad worker: {}", e))?;
        dispatchers.push(DispatchHandle::spawn(
            engine,
            handle.subscribe(),
            token.child_token(),
        ));
        Some(handle)
    } else {
        info!("Gamepad disabled");
        None
    };

    let board = if settings.board.enabled {
        let engine = build_engine("board", profile::board_mappers(&key_output))?;
        let connector = SerialConnector {
            port: settings.board.port.clone(),
            baud_rate: settings.board.baud_rate,
            read_timeout: SERIAL_READ_TIMEOUT,
        };
        let board_settings = settings.board.board_settings();
        let handle = DeviceHandle::spawn(
            "board",
            Some(settings.board.device_settings()),
            token.child_token(),
            move || BoardDevice::new(connector, board_settings),
        )
        .map_err(|e| eyre!("Failed to spawn board worker: {}", e))?;
        dispatchers.push(DispatchHandle::spawn(
            engine,
            handle.subscribe(),
            token.child_token(),
        ));
        Some(handle)
    } else {
        info!("Board disabled");
        None
    };

    info!("Running, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }

    info!("Shutting down");
    token.cancel();
    for dispatcher in &mut dispatchers {
        if let Err(e) = dispatcher.shutdown().await {
            warn!("{}", e);
        }
    }
    for pointer in &mut pointer_handles {
        pointer.shutdown().await;
    }
    tokio::task::block_in_place(|| {
        if let Some(handle) = gamepad {
            handle.shutdown();
        }
        if let Some(handle) = board {
            handle.shutdown();
        }
    });

    info!("Shutdown complete");
    Ok(())
}

fn build_engine<K: SignalKey>(name: &str, mappers: Vec<Mapper<K>>) -> Result<DispatchEngine<K>> {
    let engine = DispatchEngine::new(name, mappers);
    engine.validate()?;
    Ok(engine)
}

/// uinput on Linux, the logging backend for dry runs or when uinput is unavailable
fn create_output(settings: &Settings) -> (Arc<dyn KeyOutput>, Arc<dyn PointerOutput>) {
    if !settings.output.dry_run {
        #[cfg(target_os = "linux")]
        {
            match padmap::output::uinput::UinputOutput::create(DEVICE_NAME) {
                Ok(device) => {
                    let device = Arc::new(device);
                    return (device.clone(), device);
                }
                Err(e) => warn!("uinput unavailable, falling back to dry run: {}", e),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            warn!("No output backend for this platform, falling back to dry run");
        }
    }

    info!("Dry run: output actions are only logged");
    let logger = Arc::new(LoggingOutput::new());
    (logger.clone(), logger)
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let level = if config::debug_enabled() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level.as_str().to_lowercase())
    }
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
