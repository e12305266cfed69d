//! Byte and bit stream primitives shared by the Base64 codec and the GIF encoder.

use std::io::{self, Read, Write};

use crate::error::{QrError, Result};

/// Reads a single byte from `source`, returning `None` once the source is exhausted.
pub fn read_byte<R: Read + ?Sized>(source: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match source.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Packs variable-width codes into bytes, least significant bit first.
///
/// This is the bit order of GIF's LZW stream: the first code occupies the low bits of the
/// first byte. Pending bits are written out as a final partial byte by [`LsbBitWriter::finish`],
/// or on drop if `finish` was never called.
pub struct LsbBitWriter<W: Write> {
    inner: Option<W>,
    bit_buffer: u32,
    bit_length: u8,
}

impl<W: Write> LsbBitWriter<W> {
    /// Widest code accepted by [`LsbBitWriter::write_code`].
    pub const MAX_WIDTH: u8 = 24;

    /// Writes packed codes to `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            bit_buffer: 0,
            bit_length: 0,
        }
    }

    /// Appends the low `width` bits of `code`. Fails if `code` has bits set above `width`.
    pub fn write_code(&mut self, code: u32, width: u8) -> Result<()> {
        if width > Self::MAX_WIDTH || code >> width != 0 {
            return Err(QrError::IllegalArgument(format!(
                "code {} does not fit in {} bits",
                code, width
            )));
        }
        let out = match self.inner.as_mut() {
            Some(out) => out,
            None => return Err(QrError::IllegalArgument("bit writer already finished".into())),
        };
        self.bit_buffer |= code << self.bit_length;
        self.bit_length += width;
        while self.bit_length >= 8 {
            out.write_all(&[self.bit_buffer as u8])?;
            self.bit_buffer >>= 8;
            self.bit_length -= 8;
        }
        Ok(())
    }

    /// Flushes the pending partial byte, zero-filled in its high bits, and returns the sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush_bits()?;
        match self.inner.take() {
            Some(mut out) => {
                out.flush()?;
                Ok(out)
            }
            None => Err(QrError::IllegalArgument("bit writer already finished".into())),
        }
    }

    fn flush_bits(&mut self) -> io::Result<()> {
        if self.bit_length > 0 {
            if let Some(out) = self.inner.as_mut() {
                out.write_all(&[self.bit_buffer as u8])?;
            }
        }
        self.bit_buffer = 0;
        self.bit_length = 0;
        Ok(())
    }
}

impl<W: Write> Drop for LsbBitWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.flush_bits();
            if let Some(out) = self.inner.as_mut() {
                let _ = out.flush();
            }
        }
    }
}
