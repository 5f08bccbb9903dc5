//! # Telnet Byte-Stream Codec
//!
//! A small library that translates between a raw Telnet byte stream
//! (RFC 854) and clean application data, for clients that want a
//! near-raw session:
//!
//! - IAC command sequences are stripped from the incoming stream
//! - every option negotiation request is refused (`DO` is answered with
//!   `WONT`, `WILL` with `DONT`), so the session stays in its bare
//!   half-duplex default
//! - subnegotiation blocks (`IAC SB ... IAC SE`) are skipped with a
//!   bounded payload
//! - `IAC IAC` is unescaped on the way in, and data byte 255 is escaped
//!   on the way out
//!
//! The codec performs no I/O of its own. [`TelnetCodec::decode`] is a
//! plain step function over `(state, input)`: it consumes a chunk and
//! returns the application bytes it produced together with any protocol
//! replies that must be written back to the peer. State is carried
//! between calls, so command sequences may be split across chunks at any
//! byte position without re-scanning consumed input.

pub mod codec;
pub mod protocol;

pub use codec::{CodecError, Decoded, TelnetCodec};
pub use protocol::{Command, IAC};
