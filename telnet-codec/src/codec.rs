//! Stateful Telnet stream translation.
//!
//! The decoder is a per-byte state machine in the spirit of RFC 854:
//! - **Data**: ordinary bytes, or IAC starting a command sequence
//! - **Iac**: command byte expected
//! - **Negotiate**: WILL/WONT/DO/DONT seen, option byte expected
//! - **Subnegotiation**: skipping `IAC SB <option> <data...> IAC SE`
//!
//! Incomplete sequences keep their state across calls, so a chunk may
//! end in the middle of any sequence and the next chunk resumes where
//! the previous one stopped.

use crate::protocol::{Command, IAC};
use std::fmt;

/// Upper bound on a skipped subnegotiation payload. A peer that streams
/// an unterminated block must not make the codec buffer it forever.
const SUBNEG_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Expecting data or IAC
    Data,
    /// Found IAC, expecting a command byte
    Iac,
    /// Found a negotiation verb, expecting its option byte
    Negotiate(Command),
    /// Skipping a subnegotiation block until IAC SE
    Subnegotiation { skipped: usize, iac_seen: bool },
}

/// Result of decoding one chunk of stream bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Clean application bytes, with all command sequences removed
    pub data: Vec<u8>,
    /// Protocol replies that must be sent back to the peer
    pub replies: Vec<u8>,
}

/// Unrecoverable protocol failure reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// A subnegotiation block exceeded the internal payload bound
    SubnegotiationOverflow,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::SubnegotiationOverflow => {
                write!(f, "subnegotiation block exceeds {} bytes", SUBNEG_LIMIT)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Telnet codec with a refuse-all negotiation policy.
#[derive(Debug, Clone)]
pub struct TelnetCodec {
    state: DecodeState,
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetCodec {
    /// Create a codec in the initial data state.
    pub fn new() -> Self {
        Self {
            state: DecodeState::Data,
        }
    }

    /// Decode a chunk of stream bytes.
    ///
    /// The whole chunk is always consumed; a sequence cut off at the end
    /// of the chunk is resumed by the next call. Negotiation requests
    /// are answered in `replies` (`DO` with `WONT`, `WILL` with `DONT`),
    /// refusals from the peer are dropped silently, and every other
    /// command is discarded.
    ///
    /// # Example
    /// ```rust
    /// use telnet_codec::TelnetCodec;
    ///
    /// let mut codec = TelnetCodec::new();
    ///
    /// // "hi" + IAC WILL ECHO + "!"
    /// let decoded = codec.decode(&[b'h', b'i', 255, 251, 1, b'!']).unwrap();
    ///
    /// assert_eq!(decoded.data, b"hi!");
    /// assert_eq!(decoded.replies, vec![255, 254, 1]); // IAC DONT ECHO
    /// ```
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Decoded, CodecError> {
        let mut out = Decoded::default();

        for &byte in chunk {
            match self.state {
                DecodeState::Data => {
                    if byte == IAC {
                        self.state = DecodeState::Iac;
                    } else {
                        out.data.push(byte);
                    }
                }

                DecodeState::Iac => {
                    if byte == IAC {
                        // IAC IAC = escaped data byte 255
                        out.data.push(IAC);
                        self.state = DecodeState::Data;
                    } else if let Some(command) = Command::from_byte(byte) {
                        if command == Command::Sb {
                            self.state = DecodeState::Subnegotiation {
                                skipped: 0,
                                iac_seen: false,
                            };
                        } else if command.is_negotiation() {
                            self.state = DecodeState::Negotiate(command);
                        } else {
                            // NOP, AYT and friends carry no payload
                            self.state = DecodeState::Data;
                        }
                    } else {
                        // Unknown command byte, pass the pair through as data
                        out.data.push(IAC);
                        out.data.push(byte);
                        self.state = DecodeState::Data;
                    }
                }

                DecodeState::Negotiate(command) => {
                    match command {
                        Command::Do => {
                            out.replies
                                .extend_from_slice(&[IAC, Command::Wont.to_byte(), byte]);
                        }
                        Command::Will => {
                            out.replies
                                .extend_from_slice(&[IAC, Command::Dont.to_byte(), byte]);
                        }
                        // WONT and DONT agree with our own policy
                        _ => {}
                    }
                    self.state = DecodeState::Data;
                }

                DecodeState::Subnegotiation { skipped, iac_seen } => {
                    if iac_seen {
                        if byte == Command::Se.to_byte() {
                            self.state = DecodeState::Data;
                        } else if byte == IAC {
                            // escaped 255 inside the block
                            self.state = DecodeState::Subnegotiation {
                                skipped: skipped + 1,
                                iac_seen: false,
                            };
                        } else {
                            // malformed terminator, drop the block
                            self.state = DecodeState::Data;
                        }
                    } else if byte == IAC {
                        self.state = DecodeState::Subnegotiation {
                            skipped,
                            iac_seen: true,
                        };
                    } else {
                        let skipped = skipped + 1;
                        if skipped > SUBNEG_LIMIT {
                            self.state = DecodeState::Data;
                            return Err(CodecError::SubnegotiationOverflow);
                        }
                        self.state = DecodeState::Subnegotiation {
                            skipped,
                            iac_seen: false,
                        };
                    }
                }
            }
        }

        Ok(out)
    }

    /// Escape application data for transmission: every data byte 255
    /// becomes IAC IAC (RFC 854, Section 4).
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(data.len());

        for &byte in data {
            if byte == IAC {
                encoded.push(IAC);
            }
            encoded.push(byte);
        }

        encoded
    }

    /// Whether the decoder is between sequences (no partial command
    /// buffered from a previous chunk).
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Data
    }

    /// Reset the decoder to the initial state.
    pub fn reset(&mut self) {
        self.state = DecodeState::Data;
    }
}
