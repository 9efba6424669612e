//! Bounded formatted output.

use core::fmt;

/// Outcome of rendering into a bounded buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rendered {
    /// Bytes that fit into the buffer
    pub written: usize,
    /// Length the full output would have had
    pub total: usize,
}

impl Rendered {
    /// Check if the output was cut short
    #[inline]
    pub const fn truncated(&self) -> bool {
        self.total > self.written
    }
}

/// `fmt::Write` sink over a byte slice that drops what does not fit
///
/// Never returns `fmt::Error`, so formatting always runs to completion and
/// [`total`](Self::total) reports the untruncated length.
#[derive(Debug)]
pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
    total: usize,
}

impl<'a> BoundedWriter<'a> {
    /// Create a writer over `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            total: 0,
        }
    }

    /// Bytes stored so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Bytes produced so far, stored or not
    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let room = self.buf.len() - self.written;
        let count = bytes.len().min(room);
        self.buf[self.written..self.written + count].copy_from_slice(&bytes[..count]);
        self.written += count;
        self.total += bytes.len();
        Ok(())
    }
}

/// Render `args` into `buf`, truncating at its end
pub fn render(buf: &mut [u8], args: fmt::Arguments<'_>) -> Rendered {
    let mut writer = BoundedWriter::new(buf);
    // BoundedWriter never fails; an Err here can only come from a Display impl
    let _ = fmt::write(&mut writer, args);
    Rendered {
        written: writer.written,
        total: writer.total,
    }
}
