//! Deadline-bounded socket I/O.
//!
//! The session socket runs in non-blocking mode; every read and write
//! goes through a readiness wait bounded by an absolute deadline on a
//! monotonic clock. The deadline is computed once per public operation
//! and shared by all retries inside it, so an interrupted wait never
//! extends the total budget.

use crate::errors::{ClientError, ClientResult};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock behind all deadline computations.
///
/// Injectable so timeout paths can be driven deterministically in tests.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> i64;
}

/// Production clock on `std::time::Instant`.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// Absolute deadline for one public operation.
pub fn deadline_after(clock: &dyn Clock, timeout_ms: u32) -> i64 {
    clock.now_ms() + i64::from(timeout_ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome of a bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// Wait until the socket is ready for `dir`, or the deadline passes.
///
/// An already-elapsed deadline still polls once with a zero wait, so a
/// descriptor that is ready right now is reported as ready rather than
/// timed out. Interrupted waits retry against the same deadline.
pub fn wait_ready(
    stream: &TcpStream,
    dir: Direction,
    deadline: i64,
    clock: &dyn Clock,
) -> ClientResult<Readiness> {
    let events = match dir {
        Direction::Read => libc::POLLIN,
        Direction::Write => libc::POLLOUT,
    };

    loop {
        let now = clock.now_ms();
        let timeout = if deadline > now {
            (deadline - now).min(i64::from(i32::MAX)) as i32
        } else {
            0
        };

        let mut pfd = libc::pollfd {
            fd: stream.as_raw_fd(),
            events,
            revents: 0,
        };

        let n = unsafe { libc::poll(&mut pfd, 1, timeout) };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ClientError::Io(err));
        }

        if n == 0 {
            return Ok(Readiness::TimedOut);
        }

        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(ClientError::Io(std::io::Error::from_raw_os_error(
                libc::EINVAL,
            )));
        }

        if pfd.revents & libc::POLLERR != 0 {
            return Err(ClientError::Io(std::io::Error::from_raw_os_error(libc::EIO)));
        }

        return Ok(Readiness::Ready);
    }
}

/// Write all of `data` before the deadline.
///
/// Loops wait-then-write until every byte is out. A poll timeout is a
/// `Timeout`, every transport failure on this path is a `Send`.
pub fn send_bounded(
    stream: &mut TcpStream,
    data: &[u8],
    deadline: i64,
    clock: &dyn Clock,
) -> ClientResult<()> {
    let mut off = 0;

    while off < data.len() {
        match wait_ready(stream, Direction::Write, deadline, clock) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::TimedOut) => return Err(ClientError::Timeout),
            Err(_) => return Err(ClientError::Send),
        }

        match stream.write(&data[off..]) {
            Ok(0) => return Err(ClientError::Send),
            Ok(n) => off += n,
            Err(err)
                if err.kind() == std::io::ErrorKind::Interrupted
                    || err.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(_) => return Err(ClientError::Send),
        }
    }

    Ok(())
}

/// Read some bytes into `buf` before the deadline.
///
/// Returns `Disconnected` when the peer has closed and `Timeout` when
/// nothing arrives in time.
pub fn recv_some(
    stream: &mut TcpStream,
    buf: &mut [u8],
    deadline: i64,
    clock: &dyn Clock,
) -> ClientResult<usize> {
    loop {
        match wait_ready(stream, Direction::Read, deadline, clock)? {
            Readiness::Ready => {}
            Readiness::TimedOut => return Err(ClientError::Timeout),
        }

        match stream.read(buf) {
            Ok(0) => return Err(ClientError::Disconnected),
            Ok(n) => return Ok(n),
            Err(err)
                if err.kind() == std::io::ErrorKind::Interrupted
                    || err.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(err) => return Err(ClientError::Io(err)),
        }
    }
}

/// Connect with the remaining deadline budget, then prepare the socket
/// for deadline-bounded operation (no Nagle delay, non-blocking).
pub fn connect(addr: SocketAddr, deadline: i64, clock: &dyn Clock) -> ClientResult<TcpStream> {
    let now = clock.now_ms();
    let budget = if deadline > now { deadline - now } else { 0 };
    // connect_timeout rejects a zero duration
    let timeout = Duration::from_millis(budget.max(1) as u64);

    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|err| match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ClientError::Timeout,
        _ => ClientError::Connect,
    })?;

    stream.set_nodelay(true).map_err(|_| ClientError::Setup)?;
    stream
        .set_nonblocking(true)
        .map_err(|_| ClientError::NonBlocking)?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::TcpListener;

    struct FakeClock {
        now: Cell<i64>,
    }

    impl FakeClock {
        fn at(now: i64) -> Self {
            Self {
                now: Cell::new(now),
            }
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> i64 {
            self.now.get()
        }
    }

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        client.set_nonblocking(true).unwrap();
        (client, server)
    }

    #[test]
    fn test_deadline_after() {
        let clock = FakeClock::at(1_000);
        assert_eq!(deadline_after(&clock, 5_000), 6_000);
    }

    #[test]
    fn test_expired_deadline_times_out_on_idle_socket() {
        let (client, _server) = connected_pair();
        let clock = FakeClock::at(10_000);

        // deadline already in the past; nothing buffered to read
        let result = wait_ready(&client, Direction::Read, 9_000, &clock).unwrap();
        assert_eq!(result, Readiness::TimedOut);
    }

    #[test]
    fn test_expired_deadline_still_sees_ready_socket() {
        let (client, mut server) = connected_pair();
        server.write_all(b"x").unwrap();

        // give the loopback a moment to deliver
        std::thread::sleep(Duration::from_millis(50));

        let clock = FakeClock::at(10_000);
        let result = wait_ready(&client, Direction::Read, 0, &clock).unwrap();
        assert_eq!(result, Readiness::Ready);
    }

    #[test]
    fn test_send_bounded_writes_everything() {
        let (mut client, mut server) = connected_pair();
        let clock = MonotonicClock::new();
        let deadline = deadline_after(&clock, 2_000);

        send_bounded(&mut client, b"payload", deadline, &clock).unwrap();

        let mut got = [0u8; 7];
        server.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"payload");
    }

    #[test]
    fn test_recv_some_reports_disconnect() {
        let (mut client, server) = connected_pair();
        drop(server);

        let clock = MonotonicClock::new();
        let deadline = deadline_after(&clock, 2_000);
        let mut buf = [0u8; 16];

        let err = recv_some(&mut client, &mut buf, deadline, &clock).unwrap_err();
        assert!(matches!(err, ClientError::Disconnected));
    }

    #[test]
    fn test_recv_some_times_out() {
        let (mut client, _server) = connected_pair();

        let clock = MonotonicClock::new();
        let deadline = deadline_after(&clock, 50);
        let mut buf = [0u8; 16];

        let err = recv_some(&mut client, &mut buf, deadline, &clock).unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }
}
