//! Telnet protocol constants and types (RFC 854).
//!
//! Commands follow the IAC byte: `IAC <command> [option]` for
//! negotiation, `IAC SB <option> <data...> IAC SE` for subnegotiation,
//! and `IAC IAC` for an escaped data byte 255.

/// IAC - Interpret As Command (RFC 854, Section 4).
///
/// Signals that the following byte(s) are a Telnet command sequence
/// rather than data. A data byte with value 255 must be sent as two
/// consecutive IAC bytes.
pub const IAC: u8 = 255;

/// Telnet command bytes that may follow IAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// End of subnegotiation parameters
    Se = 240,
    /// No operation, usable as a keepalive
    Nop = 241,
    /// Data Mark, the Synch event position marker
    Dm = 242,
    /// Break signal
    Brk = 243,
    /// Interrupt Process
    Ip = 244,
    /// Abort Output
    Ao = 245,
    /// Are You There
    Ayt = 246,
    /// Erase Character
    Ec = 247,
    /// Erase Line
    El = 248,
    /// Go Ahead
    Ga = 249,
    /// Subnegotiation Begin
    Sb = 250,
    /// Sender wants to enable an option on its side
    Will = 251,
    /// Sender refuses or disables an option on its side
    Wont = 252,
    /// Sender asks the receiver to enable an option
    Do = 253,
    /// Sender asks the receiver to disable an option
    Dont = 254,
}

impl Command {
    /// Convert a byte to a `Command` if it is a valid command byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            240 => Some(Command::Se),
            241 => Some(Command::Nop),
            242 => Some(Command::Dm),
            243 => Some(Command::Brk),
            244 => Some(Command::Ip),
            245 => Some(Command::Ao),
            246 => Some(Command::Ayt),
            247 => Some(Command::Ec),
            248 => Some(Command::El),
            249 => Some(Command::Ga),
            250 => Some(Command::Sb),
            251 => Some(Command::Will),
            252 => Some(Command::Wont),
            253 => Some(Command::Do),
            254 => Some(Command::Dont),
            _ => None,
        }
    }

    /// Convert the command to its byte representation.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether the command carries an option byte after it.
    pub fn needs_option(self) -> bool {
        matches!(
            self,
            Command::Sb | Command::Will | Command::Wont | Command::Do | Command::Dont
        )
    }

    /// Whether the command is one of the four negotiation verbs.
    pub fn is_negotiation(self) -> bool {
        matches!(
            self,
            Command::Will | Command::Wont | Command::Do | Command::Dont
        )
    }
}
