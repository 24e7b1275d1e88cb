mod recording;

pub use recording::{PUSHBACK_WINDOW, RecordingReader};

use std::io::{self, Read};

/// A reader that can give back bytes it already delivered.
pub trait Unread: Read {
    /// Push the last `len` delivered bytes back so the next read returns them again.
    fn unread(&mut self, len: usize) -> io::Result<()>;
}
