use super::Unread;
use std::io::{self, Read};

/// Largest number of bytes that may be pushed back at once.
pub const PUSHBACK_WINDOW: usize = 512;

/// Reader adapter that records every byte it hands out.
///
/// Each successful read is appended to an internal buffer. [`Unread::unread`]
/// removes the tail of that buffer again and queues the bytes for redelivery,
/// so after a consumer has read ahead and given back its surplus, the buffer
/// holds exactly the bytes the consumer kept.
pub struct RecordingReader<R> {
    inner: R,
    recorded: Vec<u8>,
    /// Bytes waiting to be redelivered, front first
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<R: Read> RecordingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            pending: Vec::with_capacity(PUSHBACK_WINDOW),
            pending_pos: 0,
        }
    }

    /// Bytes delivered since the last [`clear`](Self::clear), minus any unread.
    pub fn recorded(&self) -> &[u8] {
        &self.recorded
    }

    /// Hand over the recorded bytes and start a fresh recording.
    pub fn take_recorded(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.recorded)
    }

    /// Forget the recording. Pending pushback is kept.
    pub fn clear(&mut self) {
        self.recorded.clear();
    }

    fn pending_len(&self) -> usize {
        self.pending.len() - self.pending_pos
    }
}

impl<R: Read> Read for RecordingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = if self.pending_len() > 0 {
            let n = self.pending_len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            if self.pending_pos == self.pending.len() {
                self.pending.clear();
                self.pending_pos = 0;
            }
            n
        } else {
            self.inner.read(buf)?
        };

        self.recorded.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl<R: Read> Unread for RecordingReader<R> {
    fn unread(&mut self, len: usize) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        if len > self.recorded.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot unread {len} bytes, only {} recorded", self.recorded.len()),
            ));
        }
        if len + self.pending_len() > PUSHBACK_WINDOW {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pushback window of {PUSHBACK_WINDOW} bytes exceeded"),
            ));
        }

        // Unread bytes are redelivered before anything still pending.
        let mut pending = self.recorded.split_off(self.recorded.len() - len);
        pending.extend_from_slice(&self.pending[self.pending_pos..]);
        self.pending = pending;
        self.pending_pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_n<R: Read>(reader: &mut R, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        reader.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn records_everything_delivered() {
        let mut reader = RecordingReader::new(&b"hello world"[..]);
        assert_eq!(read_n(&mut reader, 5), b"hello");
        assert_eq!(read_n(&mut reader, 6), b" world");
        assert_eq!(reader.recorded(), b"hello world");
    }

    #[test]
    fn unread_trims_recording_and_redelivers() {
        let mut reader = RecordingReader::new(&b"abcdefgh"[..]);
        assert_eq!(read_n(&mut reader, 6), b"abcdef");

        reader.unread(2).unwrap();
        assert_eq!(reader.recorded(), b"abcd");

        reader.clear();
        assert_eq!(read_n(&mut reader, 4), b"efgh");
        assert_eq!(reader.recorded(), b"efgh");
    }

    #[test]
    fn nested_unread_keeps_byte_order() {
        let mut reader = RecordingReader::new(&b"0123456789"[..]);
        read_n(&mut reader, 8);
        reader.unread(3).unwrap(); // "567" pending
        assert_eq!(read_n(&mut reader, 1), b"5");
        reader.unread(2).unwrap(); // "45" then "67"
        assert_eq!(reader.recorded(), b"0123");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"456789");
        assert_eq!(reader.recorded(), b"0123456789");
    }

    #[test]
    fn unread_beyond_recording_fails() {
        let mut reader = RecordingReader::new(&b"abc"[..]);
        read_n(&mut reader, 2);
        let err = reader.unread(3).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn unread_beyond_window_fails() {
        let data = vec![7u8; PUSHBACK_WINDOW * 2];
        let mut reader = RecordingReader::new(&data[..]);
        read_n(&mut reader, PUSHBACK_WINDOW + 1);
        assert!(reader.unread(PUSHBACK_WINDOW + 1).is_err());
        reader.unread(PUSHBACK_WINDOW).unwrap();
        assert_eq!(reader.recorded().len(), 1);
    }

    #[test]
    fn take_recorded_starts_fresh() {
        let mut reader = RecordingReader::new(&b"xyz"[..]);
        read_n(&mut reader, 2);
        assert_eq!(reader.take_recorded(), b"xy");
        assert!(reader.recorded().is_empty());
        assert_eq!(read_n(&mut reader, 1), b"z");
        assert_eq!(reader.recorded(), b"z");
    }
}
