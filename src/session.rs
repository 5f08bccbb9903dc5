//! Device session: connect, authenticate, switch to raw mode, then
//! exchange commands and XML replies.
//!
//! A session is strictly synchronous and strictly request/response: one
//! caller, one command in flight, every operation bounded by its own
//! wall-clock deadline. After any error except the pre-I/O validation
//! checks the session state is untrustworthy and must be dropped.

use crate::buffer::{RECV_BUFFER_SIZE, RecvBuffer};
use crate::code;
use crate::errors::{ClientError, ClientResult};
use crate::net::{self, Clock, MonotonicClock};
use crate::response;
use crate::xml::{Document, DomBuilder, XmlError};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use telnet_codec::TelnetCodec;

/// Smallest accepted operation timeout, milliseconds.
pub const MIN_TIMEOUT: u32 = 1000;
/// Largest accepted operation timeout, milliseconds.
pub const MAX_TIMEOUT: u32 = 60000;

/// Command that switches the device console into raw mode.
const RAW_MODE_COMMAND: &str = "!raw";
/// The device echoes the raw command back with a carriage return.
const RAW_MODE_ECHO: &[u8] = b"!raw\r";

const LOGIN_PROMPT: &[u8] = b"Login: ";
const PASSWORD_PROMPT: &[u8] = b"Password: ";
const CONFIG_PROMPT: &[u8] = b"(config)> ";
const RESPONSE_HEADER: &[u8] = b"<response>";

/// Erase-to-end-of-line escape some firmwares mix into prompt lines.
const ERASE_EOL: &[u8] = b"\x1b[K";

/// One decoded reply document together with its derived record.
#[derive(Debug)]
pub struct CommandReply {
    /// More documents follow for the same command
    pub continued: bool,
    /// Composite response code (see [`crate::code`])
    pub code: u32,
    /// Reply text chosen by the message/error scan
    pub text: String,
    /// The full parsed document
    pub doc: Document,
}

/// An authenticated raw-mode connection to one device.
pub struct Session {
    stream: TcpStream,
    codec: TelnetCodec,
    buf: RecvBuffer,
    /// Absolute deadline of the operation in progress, set once per
    /// public call and shared by all its internal retries
    deadline: i64,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stream", &self.stream)
            .field("codec", &self.codec)
            .field("buf", &self.buf)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Session {
    /// Connect to `address:port`, authenticate and enter raw mode.
    ///
    /// Validation happens before any socket is created: the address
    /// must be a unicast IPv4 host, the port nonzero, credentials free
    /// of newlines and the timeout within [`MIN_TIMEOUT`]..=[`MAX_TIMEOUT`]
    /// milliseconds. Every failure after that point closes the
    /// connection; an open session is only returned once the device has
    /// confirmed raw mode with a successful first response.
    pub fn open(
        address: Ipv4Addr,
        port: u16,
        user: &str,
        password: &str,
        timeout: u32,
    ) -> ClientResult<Session> {
        Self::open_with_clock(
            address,
            port,
            user,
            password,
            timeout,
            Box::new(MonotonicClock::new()),
        )
    }

    /// Like [`Session::open`] with a caller-provided clock.
    pub fn open_with_clock(
        address: Ipv4Addr,
        port: u16,
        user: &str,
        password: &str,
        timeout: u32,
        clock: Box<dyn Clock>,
    ) -> ClientResult<Session> {
        if !is_unicast(address) {
            return Err(ClientError::Address);
        }
        if port == 0 {
            return Err(ClientError::Port);
        }
        if user.contains('\n') {
            return Err(ClientError::UserNewline);
        }
        if password.contains('\n') {
            return Err(ClientError::PasswordNewline);
        }
        if timeout < MIN_TIMEOUT {
            return Err(ClientError::TimeoutTooSmall);
        }
        if timeout > MAX_TIMEOUT {
            return Err(ClientError::TimeoutTooLarge);
        }

        let deadline = net::deadline_after(clock.as_ref(), timeout);
        let addr = SocketAddr::V4(SocketAddrV4::new(address, port));
        let stream = net::connect(addr, deadline, clock.as_ref())?;

        let mut session = Session {
            stream,
            codec: TelnetCodec::new(),
            buf: RecvBuffer::new(),
            deadline,
            clock,
        };

        session.handshake(user, password)?;

        Ok(session)
    }

    /// Send one command line.
    ///
    /// The command is sent with leading whitespace removed and a
    /// newline appended; an all-whitespace command or one containing a
    /// newline of its own is rejected before any I/O.
    pub fn send(&mut self, command: &str, timeout: u32) -> ClientResult<()> {
        let trimmed = command.trim_start();
        if trimmed.is_empty() {
            return Err(ClientError::NoCommand);
        }
        if command.contains('\n') {
            return Err(ClientError::CommandNewline);
        }

        self.deadline = net::deadline_after(self.clock.as_ref(), timeout);
        self.send_line(trimmed)
    }

    /// Receive the next reply document.
    pub fn recv(&mut self, timeout: u32) -> ClientResult<CommandReply> {
        self.deadline = net::deadline_after(self.clock.as_ref(), timeout);
        self.recv_reply()
    }

    /// Close the session. Dropping it has the same effect.
    pub fn close(self) {}

    /// Drive the interactive login through to confirmed raw mode.
    fn handshake(&mut self, user: &str, password: &str) -> ClientResult<()> {
        let mut line: Vec<u8> = Vec::new();
        let mut user_sent = false;
        let mut password_sent = false;
        let mut raw_sent = false;
        let mut raw_received = false;

        while !raw_received {
            if self.buf.is_empty() {
                self.fill()?;
            }

            // take everything up to (and including) the next newline
            let unread = self.buf.unread();
            let newline = unread.iter().position(|&byte| byte == b'\n');
            match newline {
                Some(pos) => {
                    line.extend_from_slice(&unread[..pos]);
                    self.buf.consume(pos + 1);
                }
                None => {
                    line.extend_from_slice(unread);
                    let taken = unread.len();
                    self.buf.consume(taken);
                }
            }
            let mut clear = newline.is_some();

            strip_erase_eol(&mut line);

            if line == LOGIN_PROMPT {
                if user_sent {
                    return Err(ClientError::WrongCredentials);
                }
                if password_sent {
                    // password prompt answered before any login prompt
                    return Err(ClientError::WrongState);
                }
                self.send_line(user)?;
                clear = true;
                user_sent = true;
            } else if line == PASSWORD_PROMPT {
                if !user_sent {
                    return Err(ClientError::WrongState);
                }
                self.send_line(password)?;
                clear = true;
                password_sent = true;
            } else if line == CONFIG_PROMPT {
                if user_sent != password_sent {
                    return Err(ClientError::WrongState);
                }
                self.send_line(RAW_MODE_COMMAND)?;
                if raw_sent {
                    // the device ignored the first request and printed
                    // its interactive prompt again
                    return Err(ClientError::RawModeNotSupported);
                }
                clear = true;
                raw_sent = true;
            } else if line == RAW_MODE_ECHO {
                if !raw_sent {
                    return Err(ClientError::WrongState);
                }
                clear = true;
                raw_received = true;
            }

            if clear {
                line.clear();
            }
        }

        self.expect_response_header()?;

        // the device confirms raw mode with one regular response
        let first = self.recv_reply()?;
        if code::failed(first.code) {
            return Err(ClientError::RawModeFailed);
        }

        Ok(())
    }

    /// After the raw-mode echo: verify the next non-blank line starts
    /// the structured document stream.
    fn expect_response_header(&mut self) -> ClientResult<()> {
        loop {
            self.buf.compact();

            let unread = self.buf.unread();
            if unread.starts_with(CONFIG_PROMPT) {
                // raw request accepted syntactically, interactive mode
                // reprinted anyway
                return Err(ClientError::RawModeNotSupported);
            }

            let Some(newline) = unread.iter().position(|&byte| byte == b'\n') else {
                if self.buf.is_full() {
                    return Err(ClientError::UnknownProtocol);
                }
                self.fill()?;
                continue;
            };

            let mut start = 0;
            while start < newline && unread[start].is_ascii_whitespace() {
                start += 1;
            }
            if start == newline {
                // blank line
                self.buf.consume(newline + 1);
                continue;
            }

            if !unread[start..].starts_with(RESPONSE_HEADER) {
                return Err(ClientError::RawModeNotSupported);
            }

            return Ok(());
        }
    }

    /// Read documents out of the buffer until one completes, then
    /// interpret it.
    fn recv_reply(&mut self) -> ClientResult<CommandReply> {
        let mut builder = DomBuilder::new();

        let doc = loop {
            if self.buf.is_empty() {
                self.fill()?;
            }

            let (consumed, root) = builder
                .parse(self.buf.unread())
                .map_err(ClientError::from_xml)?;
            self.buf.consume(consumed);

            if let Some(doc) = root {
                break doc;
            }
        };

        let record = response::interpret(&doc)?;

        Ok(CommandReply {
            continued: record.continued,
            code: record.code,
            text: record.text,
            doc,
        })
    }

    /// Pull one chunk off the socket through the telnet codec into the
    /// receive window, answering any negotiation requests on the way.
    fn fill(&mut self) -> ClientResult<()> {
        self.buf.reset_if_drained();

        let mut chunk = [0u8; RECV_BUFFER_SIZE];
        let want = self.buf.free_tail().min(chunk.len());
        let got = net::recv_some(
            &mut self.stream,
            &mut chunk[..want],
            self.deadline,
            self.clock.as_ref(),
        )?;

        let decoded = self
            .codec
            .decode(&chunk[..got])
            .map_err(|_| ClientError::Telnet)?;

        if !decoded.replies.is_empty() {
            net::send_bounded(
                &mut self.stream,
                &decoded.replies,
                self.deadline,
                self.clock.as_ref(),
            )?;
        }

        if !decoded.data.is_empty() {
            self.buf.append(&decoded.data)?;
        }

        Ok(())
    }

    /// Escape and send one line of text under the current deadline.
    fn send_line(&mut self, text: &str) -> ClientResult<()> {
        let mut data = self.codec.encode(text.as_bytes());
        data.push(b'\n');
        net::send_bounded(&mut self.stream, &data, self.deadline, self.clock.as_ref())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

impl ClientError {
    fn from_xml(err: XmlError) -> ClientError {
        match err {
            XmlError::UnexpectedEof => ClientError::ResponseEndOfStream,
            XmlError::StackOverflow => ClientError::BufferOverflow,
            XmlError::Reference
            | XmlError::CloseTag
            | XmlError::Syntax
            | XmlError::ProcessingInstruction => ClientError::ResponseSyntax,
        }
    }
}

/// A device address must be a plain unicast host: not the any-address,
/// not limited broadcast, not multicast.
fn is_unicast(address: Ipv4Addr) -> bool {
    let bits = u32::from(address);

    if bits == 0x0000_0000 || bits == 0xffff_ffff {
        return false;
    }

    (bits & 0xf000_0000) != 0xe000_0000
}

/// Remove every erase-to-end-of-line escape from an accumulated line.
fn strip_erase_eol(line: &mut Vec<u8>) {
    let mut i = 0;
    while i + ERASE_EOL.len() <= line.len() {
        if &line[i..i + ERASE_EOL.len()] == ERASE_EOL {
            line.drain(i..i + ERASE_EOL.len());
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_addresses() {
        assert!(is_unicast(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(is_unicast(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_unicast(Ipv4Addr::new(127, 0, 0, 1)));

        assert!(!is_unicast(Ipv4Addr::new(0, 0, 0, 0)));
        assert!(!is_unicast(Ipv4Addr::new(255, 255, 255, 255)));
        assert!(!is_unicast(Ipv4Addr::new(224, 0, 0, 1)));
        assert!(!is_unicast(Ipv4Addr::new(239, 255, 255, 255)));
    }

    #[test]
    fn test_strip_erase_eol() {
        let mut line = b"\x1b[KLogin: ".to_vec();
        strip_erase_eol(&mut line);
        assert_eq!(line, b"Login: ");

        let mut line = b"Pass\x1b[Kword\x1b[K: ".to_vec();
        strip_erase_eol(&mut line);
        assert_eq!(line, b"Password: ");

        // partial escape at the end must survive for the next append
        let mut line = b"Login\x1b[".to_vec();
        strip_erase_eol(&mut line);
        assert_eq!(line, b"Login\x1b[");
    }

    #[test]
    fn test_strip_erase_eol_back_to_back() {
        let mut line = b"\x1b[K\x1b[K\x1b[K".to_vec();
        strip_erase_eol(&mut line);
        assert!(line.is_empty());
    }
}
