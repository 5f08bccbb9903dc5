use crate::errors::{ClientError, ClientResult};

/// Capacity of the session receive window.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Fixed-capacity receive window with read and write cursors.
///
/// The invariant is `read <= write <= RECV_BUFFER_SIZE`. Producers
/// append after `write`, consumers advance `read`. When the tail runs
/// out of room the unread span `[read, write)` is shifted back to the
/// start; when even that cannot make a chunk fit the append fails with
/// `BufferOverflow` rather than growing or truncating.
#[derive(Debug)]
pub struct RecvBuffer {
    buf: [u8; RECV_BUFFER_SIZE],
    read: usize,
    write: usize,
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; RECV_BUFFER_SIZE],
            read: 0,
            write: 0,
        }
    }

    /// Bytes appended but not yet consumed.
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.read..self.write]
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Whether the write cursor has reached the end of the window.
    pub fn is_full(&self) -> bool {
        self.write == RECV_BUFFER_SIZE
    }

    /// Free room after the write cursor, ignoring any reclaimable head.
    pub fn free_tail(&self) -> usize {
        RECV_BUFFER_SIZE - self.write
    }

    /// Mark `n` unread bytes as consumed.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.write - self.read);
        self.read += n;
    }

    /// Rewind both cursors when everything has been consumed.
    pub fn reset_if_drained(&mut self) {
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
    }

    /// Shift the unread span to the start of the window.
    pub fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.buf.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }

    /// Append a chunk, compacting first if the tail is short.
    ///
    /// Fails with `BufferOverflow` when the chunk does not fit even
    /// after reclaiming the consumed head.
    pub fn append(&mut self, chunk: &[u8]) -> ClientResult<()> {
        if chunk.len() > self.free_tail() {
            if chunk.len() > self.free_tail() + self.read {
                return Err(ClientError::BufferOverflow);
            }
            self.compact();
        }

        self.buf[self.write..self.write + chunk.len()].copy_from_slice(chunk);
        self.write += chunk.len();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_consume() {
        let mut buf = RecvBuffer::new();

        buf.append(b"hello").unwrap();
        assert_eq!(buf.unread(), b"hello");

        buf.consume(2);
        assert_eq!(buf.unread(), b"llo");

        buf.consume(3);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_reset_if_drained() {
        let mut buf = RecvBuffer::new();

        buf.append(b"abc").unwrap();
        buf.consume(3);
        buf.reset_if_drained();

        assert_eq!(buf.free_tail(), RECV_BUFFER_SIZE);
    }

    #[test]
    fn test_compaction_reclaims_consumed_head() {
        let mut buf = RecvBuffer::new();

        let big = vec![b'x'; RECV_BUFFER_SIZE - 8];
        buf.append(&big).unwrap();
        buf.consume(RECV_BUFFER_SIZE - 16);
        assert_eq!(buf.unread().len(), 8);

        // 16 bytes only fit after the head is reclaimed
        buf.append(b"0123456789abcdef").unwrap();

        assert_eq!(buf.unread().len(), 24);
        assert!(buf.unread().ends_with(b"0123456789abcdef"));
        assert!(buf.unread().starts_with(b"xxxxxxxx"));
    }

    #[test]
    fn test_overflow_never_truncates() {
        let mut buf = RecvBuffer::new();

        buf.append(&vec![b'a'; 100]).unwrap();
        buf.consume(50);

        // 50 unread + 50 reclaimable; a chunk larger than the whole
        // remaining room must be rejected outright
        let chunk = vec![b'b'; RECV_BUFFER_SIZE - 49];
        assert!(matches!(
            buf.append(&chunk),
            Err(ClientError::BufferOverflow)
        ));

        // unread bytes are untouched by the failed append
        assert_eq!(buf.unread(), &vec![b'a'; 50][..]);
    }

    #[test]
    fn test_exact_fit_after_compaction() {
        let mut buf = RecvBuffer::new();

        buf.append(&vec![b'a'; 100]).unwrap();
        buf.consume(100);

        let chunk = vec![b'b'; RECV_BUFFER_SIZE];
        buf.append(&chunk).unwrap();

        assert!(buf.is_full());
        assert_eq!(buf.unread().len(), RECV_BUFFER_SIZE);
    }

    #[test]
    fn test_compact_moves_unread_to_start() {
        let mut buf = RecvBuffer::new();

        buf.append(b"0123456789").unwrap();
        buf.consume(4);
        buf.compact();

        assert_eq!(buf.unread(), b"456789");
        assert_eq!(buf.free_tail(), RECV_BUFFER_SIZE - 6);
    }
}
