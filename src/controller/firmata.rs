//! Minimal Firmata codec for digital input boards
//!
//! Covers the subset needed to read digital pins: the version handshake,
//! pin mode setup and digital port reports. Everything else the board sends
//! (firmware sysex, analog reports) is skipped by the parser.

pub const DIGITAL_MESSAGE: u8 = 0x90;
pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const REPORT_DIGITAL: u8 = 0xD0;
pub const SET_PIN_MODE: u8 = 0xF4;
pub const REPORT_VERSION: u8 = 0xF9;
pub const SYSTEM_RESET: u8 = 0xFF;
pub const START_SYSEX: u8 = 0xF0;
pub const END_SYSEX: u8 = 0xF7;

pub const PIN_MODE_INPUT: u8 = 0x00;

/// Message decoded from the board's byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmataMessage {
    Version { major: u8, minor: u8 },
    /// Levels of the eight pins of one port, bit 0 is pin `port * 8`
    DigitalPort { port: u8, levels: u16 },
}

pub fn report_version() -> [u8; 1] {
    [REPORT_VERSION]
}

pub fn set_pin_mode(pin: u8, mode: u8) -> [u8; 3] {
    [SET_PIN_MODE, pin & 0x7F, mode & 0x7F]
}

pub fn report_digital_port(port: u8, enable: bool) -> [u8; 2] {
    [REPORT_DIGITAL | (port & 0x0F), enable as u8]
}

pub fn port_of(pin: u8) -> u8 {
    pin / 8
}

/// Incremental parser; bytes may arrive split across reads
#[derive(Debug, Default, Clone)]
pub struct FirmataParser {
    pending: Vec<u8>,
    in_sysex: bool,
}

impl FirmataParser {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FirmataMessage> {
        let mut messages = Vec::new();

        for &byte in bytes {
            if self.in_sysex {
                if byte == END_SYSEX {
                    self.in_sysex = false;
                }
                continue;
            }

            match byte {
                START_SYSEX => {
                    self.in_sysex = true;
                    self.pending.clear();
                    continue;
                }
                SYSTEM_RESET => {
                    self.pending.clear();
                    continue;
                }
                b if b & 0x80 != 0 => {
                    self.pending.clear();
                    self.pending.push(b);
                }
                b => {
                    // data byte without a command
                    if self.pending.is_empty() {
                        continue;
                    }
                    self.pending.push(b);
                }
            }

            if self.pending.len() == 3 {
                if let Some(message) = decode(&self.pending) {
                    messages.push(message);
                }
                self.pending.clear();
            }
        }

        messages
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.in_sysex = false;
    }
}

fn decode(frame: &[u8]) -> Option<FirmataMessage> {
    let command = frame[0];
    if command == REPORT_VERSION {
        return Some(FirmataMessage::Version {
            major: frame[1],
            minor: frame[2],
        });
    }
    match command & 0xF0 {
        DIGITAL_MESSAGE => Some(FirmataMessage::DigitalPort {
            port: command & 0x0F,
            levels: u16::from(frame[1]) | (u16::from(frame[2]) << 7),
        }),
        ANALOG_MESSAGE => None,
        _ => None,
    }
}
