//! Microcontroller board read over a Firmata serial link
//!
//! The link is a statum state machine. A board starts out disconnected, is
//! moved to `Connecting` right away and retried at a fixed backoff until the
//! version handshake succeeds. Pin setup runs once per successful connect.
//! Any I/O error on a connected link drops it back to `Connecting`.
//!
//! ```text
//! Disconnected ──► Connecting ──(handshake)──► Connected
//!                    ▲     │                      │
//!                    └─────┘ (retry after 1s)     │
//!                    ▲                            │
//!                    └────────(I/O error)─────────┘
//! ```

use crate::controller::controller_handle::{DeviceError, InputDevice};
use crate::controller::firmata::{self, FirmataMessage, FirmataParser};
use crate::controller::state::{DeviceState, SignalKey, SignalKind};
use statum::{machine, state};
use std::collections::BTreeSet;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Digital pins read from the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoardPin {
    D2,
    D3,
    D4,
}

impl BoardPin {
    pub fn number(self) -> u8 {
        match self {
            BoardPin::D2 => 2,
            BoardPin::D3 => 3,
            BoardPin::D4 => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|pin| pin.number() == number)
    }
}

impl SignalKey for BoardPin {
    const ALL: &'static [Self] = &[BoardPin::D2, BoardPin::D3, BoardPin::D4];

    fn kind(self) -> SignalKind {
        SignalKind::Binary
    }

    fn label(self) -> &'static str {
        match self {
            BoardPin::D2 => "pin_2",
            BoardPin::D3 => "pin_3",
            BoardPin::D4 => "pin_4",
        }
    }
}

impl fmt::Display for BoardPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Byte stream to a board
pub trait Transport: Read + Write {}

impl<T: Read + Write + ?Sized> Transport for T {}

/// Opens the byte stream to a board
pub trait Connector {
    fn open(&mut self) -> Result<Box<dyn Transport>, DeviceError>;
}

/// Serial port connector, picks the first USB serial port unless a path is given
#[derive(Clone, Debug)]
pub struct SerialConnector {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Connector for SerialConnector {
    fn open(&mut self) -> Result<Box<dyn Transport>, DeviceError> {
        let path = match &self.port {
            Some(path) => path.clone(),
            None => discover_serial_port()?,
        };

        info!("Opening serial port {} at {} baud", path, self.baud_rate);
        let port = serialport::new(&path, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| DeviceError::NotFound(format!("{}: {}", path, e)))?;
        Ok(Box::new(port))
    }
}

fn discover_serial_port() -> Result<String, DeviceError> {
    let ports = serialport::available_ports().map_err(|e| DeviceError::Backend(e.to_string()))?;
    debug!("Available serial ports: {:?}", ports);
    ports
        .into_iter()
        .find(|port| matches!(port.port_type, serialport::SerialPortType::UsbPort(_)))
        .map(|port| port.port_name)
        .ok_or_else(|| DeviceError::NotFound("no USB serial port".to_string()))
}

// Link states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

#[machine]
pub struct BoardLink<S: LinkState> {
    // Open stream, only present while connected
    transport: Option<Box<dyn Transport>>,

    // Decoder for the incoming byte stream
    parser: FirmataParser,

    // Pins registered on every connect
    pins: Vec<BoardPin>,
}

impl BoardLink<Disconnected> {
    pub fn create(pins: Vec<BoardPin>) -> Self {
        Self::new(None, FirmataParser::default(), pins)
    }

    pub fn connect(self) -> BoardLink<Connecting> {
        info!("Looking for boards...");
        self.transition()
    }
}

impl BoardLink<Connecting> {
    /// Opens the transport, waits for the version report and registers pins.
    /// On failure the link stays in `Connecting`.
    pub fn handshake(
        mut self,
        connector: &mut dyn Connector,
        timeout: Duration,
    ) -> Result<BoardLink<Connected>, (BoardLink<Connecting>, DeviceError)> {
        match self.try_handshake(connector, timeout) {
            Ok(transport) => {
                self.transport = Some(transport);
                info!("Board connected, {} pins registered", self.pins.len());
                Ok(self.transition())
            }
            Err(e) => {
                self.parser.reset();
                Err((self, e))
            }
        }
    }

    fn try_handshake(
        &mut self,
        connector: &mut dyn Connector,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, DeviceError> {
        let mut transport = connector.open()?;
        transport.write_all(&firmata::report_version())?;
        transport.flush()?;

        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; 64];
        loop {
            if Instant::now() >= deadline {
                return Err(DeviceError::Handshake(
                    "no version report from board".to_string(),
                ));
            }
            match transport.read(&mut buffer) {
                Ok(0) => std::thread::sleep(Duration::from_millis(5)),
                Ok(n) => {
                    let version = self.parser.feed(&buffer[..n]).into_iter().find_map(|m| match m {
                        FirmataMessage::Version { major, minor } => Some((major, minor)),
                        _ => None,
                    });
                    if let Some((major, minor)) = version {
                        info!("Board speaks Firmata {}.{}", major, minor);
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for pin in &self.pins {
            transport.write_all(&firmata::set_pin_mode(pin.number(), firmata::PIN_MODE_INPUT))?;
        }
        let ports: BTreeSet<u8> = self.pins.iter().map(|pin| firmata::port_of(pin.number())).collect();
        for port in ports {
            transport.write_all(&firmata::report_digital_port(port, true))?;
        }
        transport.flush()?;
        Ok(transport)
    }
}

impl BoardLink<Connected> {
    /// Reads what is available and merges digital reports into the state
    pub fn read_updates(&mut self, state: &mut DeviceState<BoardPin>) -> Result<(), DeviceError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(DeviceError::Backend("connected link without transport".to_string()));
        };

        let mut buffer = [0u8; 64];
        let n = match transport.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if is_timeout(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for message in self.parser.feed(&buffer[..n]) {
            if let FirmataMessage::DigitalPort { port, levels } = message {
                for pin in &self.pins {
                    let number = pin.number();
                    if firmata::port_of(number) != port {
                        continue;
                    }
                    let level = (levels >> (number % 8)) & 1;
                    if state.set(*pin, f32::from(level)) {
                        debug!("Pin {} changed to {}", pin, level);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn disconnect(mut self) -> BoardLink<Disconnected> {
        warn!("Board link lost");
        self.transport = None;
        self.parser.reset();
        self.transition()
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// Current link state, for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

enum Link {
    Disconnected(BoardLink<Disconnected>),
    Connecting(BoardLink<Connecting>),
    Connected(BoardLink<Connected>),
}

/// Settings for the board device
#[derive(Clone, Debug)]
pub struct BoardSettings {
    pub retry_interval: Duration,
    pub handshake_timeout: Duration,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(3),
        }
    }
}

/// Input device backed by a Firmata board
pub struct BoardDevice<C: Connector> {
    connector: C,
    settings: BoardSettings,
    link: Option<Link>,
    next_attempt: Instant,
}

impl<C: Connector> BoardDevice<C> {
    pub fn new(connector: C, settings: BoardSettings) -> Self {
        Self {
            connector,
            settings,
            link: Some(Link::Disconnected(BoardLink::create(BoardPin::ALL.to_vec()))),
            next_attempt: Instant::now(),
        }
    }

    pub fn status(&self) -> LinkStatus {
        match self.link {
            Some(Link::Connected(_)) => LinkStatus::Connected,
            Some(Link::Connecting(_)) => LinkStatus::Connecting,
            Some(Link::Disconnected(_)) | None => LinkStatus::Disconnected,
        }
    }
}

impl<C: Connector> InputDevice for BoardDevice<C> {
    type Key = BoardPin;

    fn name(&self) -> &str {
        "board"
    }

    fn poll_once(&mut self, state: &mut DeviceState<BoardPin>) -> Result<(), DeviceError> {
        let link = match self.link.take() {
            Some(link) => link,
            None => {
                error!("Board link missing, starting over");
                Link::Disconnected(BoardLink::create(BoardPin::ALL.to_vec()))
            }
        };

        let (next, result) = match link {
            Link::Disconnected(link) => (Link::Connecting(link.connect()), Ok(())),
            Link::Connecting(link) => {
                if Instant::now() < self.next_attempt {
                    (Link::Connecting(link), Ok(()))
                } else {
                    match link.handshake(&mut self.connector, self.settings.handshake_timeout) {
                        Ok(connected) => {
                            state.reset();
                            (Link::Connected(connected), Ok(()))
                        }
                        Err((connecting, e)) => {
                            self.next_attempt = Instant::now() + self.settings.retry_interval;
                            (Link::Connecting(connecting), Err(e))
                        }
                    }
                }
            }
            Link::Connected(mut link) => match link.read_updates(state) {
                Ok(()) => (Link::Connected(link), Ok(())),
                Err(e) => {
                    state.reset();
                    (Link::Connecting(link.disconnect().connect()), Err(e))
                }
            },
        };

        self.link = Some(next);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory board: replays queued reads, records writes
    struct FakeTransport {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for FakeTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::TimedOut, "idle")),
            }
        }
    }

    impl Write for FakeTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Hands out one scripted session per successful open
    struct FakeConnector {
        sessions: VecDeque<Option<Vec<io::Result<Vec<u8>>>>>,
        written: Arc<Mutex<Vec<u8>>>,
        opens: usize,
    }

    impl Connector for FakeConnector {
        fn open(&mut self) -> Result<Box<dyn Transport>, DeviceError> {
            self.opens += 1;
            match self.sessions.pop_front() {
                Some(Some(reads)) => Ok(Box::new(FakeTransport {
                    reads: reads.into(),
                    written: self.written.clone(),
                })),
                _ => Err(DeviceError::NotFound("no board".to_string())),
            }
        }
    }

    fn device(sessions: Vec<Option<Vec<io::Result<Vec<u8>>>>>) -> BoardDevice<FakeConnector> {
        let connector = FakeConnector {
            sessions: sessions.into(),
            written: Arc::new(Mutex::new(Vec::new())),
            opens: 0,
        };
        let settings = BoardSettings {
            retry_interval: Duration::from_millis(0),
            handshake_timeout: Duration::from_millis(50),
        };
        BoardDevice::new(connector, settings)
    }

    #[test]
    fn connects_registers_pins_and_reads_levels() {
        let mut board = device(vec![Some(vec![
            Ok(vec![0xF9, 2, 5]),
            Ok(vec![0x90, 0b0000_0100, 0x00]),
        ])]);
        let mut state = DeviceState::new();

        assert_eq!(board.status(), LinkStatus::Disconnected);
        board.poll_once(&mut state).unwrap();
        assert_eq!(board.status(), LinkStatus::Connecting);
        board.poll_once(&mut state).unwrap();
        assert_eq!(board.status(), LinkStatus::Connected);

        let written = board.connector.written.lock().unwrap().clone();
        assert_eq!(written[0], firmata::REPORT_VERSION);
        assert!(written.windows(3).any(|w| w == [0xF4, 2, 0]));
        assert!(written.windows(2).any(|w| w == [0xD0, 1]));

        board.poll_once(&mut state).unwrap();
        assert_eq!(state.get(BoardPin::D2), 1.0);
        assert_eq!(state.get(BoardPin::D3), 0.0);
    }

    #[test]
    fn retries_until_a_board_answers() {
        let mut board = device(vec![None, Some(vec![Ok(vec![0xF9, 2, 5])])]);
        let mut state = DeviceState::new();

        board.poll_once(&mut state).unwrap();
        assert!(board.poll_once(&mut state).is_err());
        assert_eq!(board.status(), LinkStatus::Connecting);
        board.poll_once(&mut state).unwrap();
        assert_eq!(board.status(), LinkStatus::Connected);
        assert_eq!(board.connector.opens, 2);
    }

    #[test]
    fn io_error_resets_state_and_reconnects() {
        let mut board = device(vec![
            Some(vec![
                Ok(vec![0xF9, 2, 5]),
                Ok(vec![0x90, 0b0000_1100, 0x00]),
                Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged")),
            ]),
            Some(vec![Ok(vec![0xF9, 2, 5])]),
        ]);
        let mut state = DeviceState::new();

        board.poll_once(&mut state).unwrap();
        board.poll_once(&mut state).unwrap();
        board.poll_once(&mut state).unwrap();
        assert_eq!(state.get(BoardPin::D3), 1.0);

        assert!(board.poll_once(&mut state).is_err());
        assert_eq!(board.status(), LinkStatus::Connecting);
        assert_eq!(state.get(BoardPin::D3), 0.0);

        board.poll_once(&mut state).unwrap();
        assert_eq!(board.status(), LinkStatus::Connected);
    }

    #[test]
    fn pin_numbers_map_both_ways() {
        for pin in BoardPin::ALL {
            assert_eq!(BoardPin::from_number(pin.number()), Some(*pin));
        }
        assert_eq!(BoardPin::from_number(13), None);
    }
}
