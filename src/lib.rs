//! # confclient
//!
//! Client library for device management consoles that speak an
//! XML-over-telnet protocol: an interactive login handshake switches
//! the session into a "raw" mode in which every command is answered
//! with small XML documents instead of human-readable text.
//!
//! The pieces, bottom up:
//! - [`net`]: deadline-bounded non-blocking socket I/O
//! - [`buffer`]: the fixed receive window
//! - [`xml`]: incremental push parser and arena DOM
//! - [`code`] / [`response`]: composite codes and reply interpretation
//! - [`session`]: the handshake state machine and the public
//!   open/send/recv/close surface
//! - [`config`]: the CLI's configuration file
//!
//! Telnet option filtering lives in the `telnet-codec` workspace crate.

pub mod buffer;
pub mod code;
pub mod config;
pub mod errors;
pub mod net;
pub mod response;
pub mod session;
pub mod xml;

pub use errors::{ClientError, ClientResult};
pub use session::{CommandReply, Session};
