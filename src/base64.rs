//! Standard Base64 (RFC 4648 alphabet, `=` padding) over byte streams.
//!
//! [`Base64Encoder`] wraps a [`Write`] sink and [`Base64Decoder`] wraps a [`Read`] source, so
//! either side can be chained with the GIF encoder without an intermediate buffer. [`encode`]
//! and [`decode`] are the in-memory shortcuts.
//!
//! Decoding is deliberately narrow: ASCII whitespace is skipped, the first `=` ends the data,
//! and input that stops in the middle of a byte without padding is an error.

use std::io::{self, Read, Write};

use crate::error::{QrError, Result};
use crate::io::read_byte;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';

fn encode_sextet(n: u32) -> u8 {
    ALPHABET[(n & 0x3f) as usize]
}

fn decode_sextet(c: u8) -> Option<u32> {
    let n = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u32::from(n))
}

/// Encodes every byte written to it and forwards the characters to the wrapped sink.
///
/// The final group and its padding are only emitted by [`Base64Encoder::finish`] (or on drop),
/// so [`Write::flush`] never closes a group early.
pub struct Base64Encoder<W: Write> {
    inner: Option<W>,
    buffer: u32,
    buflen: u8,
    length: usize,
}

impl<W: Write> Base64Encoder<W> {
    /// Encodes into `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            buffer: 0,
            buflen: 0,
            length: 0,
        }
    }

    /// Writes the trailing partial group and padding, then returns the sink.
    pub fn finish(mut self) -> Result<W> {
        self.write_tail()?;
        match self.inner.take() {
            Some(mut out) => {
                out.flush()?;
                Ok(out)
            }
            None => Err(QrError::IllegalArgument("base64 encoder already finished".into())),
        }
    }

    fn write_tail(&mut self) -> io::Result<()> {
        let out = match self.inner.as_mut() {
            Some(out) => out,
            None => return Ok(()),
        };
        if self.buflen > 0 {
            out.write_all(&[encode_sextet(self.buffer << (6 - self.buflen))])?;
            self.buffer = 0;
            self.buflen = 0;
        }
        if self.length % 3 != 0 {
            let padlen = 3 - self.length % 3;
            out.write_all(&[PAD; 2][..padlen])?;
        }
        self.length = 0;
        Ok(())
    }
}

impl<W: Write> Write for Base64Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let out = match self.inner.as_mut() {
            Some(out) => out,
            None => return Err(io::Error::new(io::ErrorKind::BrokenPipe, "encoder finished")),
        };
        let mut encoded = Vec::with_capacity(buf.len() * 4 / 3 + 2);
        for &b in buf {
            self.buffer = (self.buffer << 8) | u32::from(b);
            self.buflen += 8;
            self.length += 1;
            while self.buflen >= 6 {
                encoded.push(encode_sextet(self.buffer >> (self.buflen - 6)));
                self.buflen -= 6;
            }
            self.buffer &= (1 << self.buflen) - 1;
        }
        out.write_all(&encoded)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(out) => out.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for Base64Encoder<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.write_tail();
            if let Some(out) = self.inner.as_mut() {
                let _ = out.flush();
            }
        }
    }
}

/// Decodes the Base64 text produced by the wrapped source.
pub struct Base64Decoder<R: Read> {
    inner: R,
    buffer: u32,
    buflen: u8,
    position: usize,
    ended: bool,
}

impl<R: Read> Base64Decoder<R> {
    /// Decodes the Base64 text read from `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: 0,
            buflen: 0,
            position: 0,
            ended: false,
        }
    }

    /// Returns the next decoded byte, or `None` at the end of the data.
    ///
    /// Fails with [`QrError::InvalidBase64`] on a byte outside the alphabet and with
    /// [`QrError::TruncatedBase64`] when the source ends between bytes without padding.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        while self.buflen < 8 {
            if self.ended {
                return Ok(None);
            }
            let c = match read_byte(&mut self.inner)? {
                Some(c) => c,
                None if self.buflen == 0 => return Ok(None),
                None => return Err(QrError::TruncatedBase64),
            };
            let position = self.position;
            self.position += 1;
            if c == PAD {
                self.ended = true;
                self.buflen = 0;
                return Ok(None);
            }
            if c.is_ascii_whitespace() {
                continue;
            }
            let n = decode_sextet(c).ok_or(QrError::InvalidBase64 { byte: c, position })?;
            self.buffer = ((self.buffer << 6) | n) & 0x3fff;
            self.buflen += 6;
        }
        let n = (self.buffer >> (self.buflen - 8)) as u8;
        self.buflen -= 8;
        Ok(Some(n))
    }
}

impl<R: Read> Read for Base64Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.next_byte() {
                Ok(Some(b)) => {
                    buf[count] = b;
                    count += 1;
                }
                Ok(None) => break,
                Err(QrError::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }
        Ok(count)
    }
}

/// Encodes `data` as padded standard Base64.
pub fn encode(data: &[u8]) -> String {
    let mut enc = Base64Encoder::new(Vec::with_capacity((data.len() + 2) / 3 * 4));
    // A Vec sink never fails.
    enc.write_all(data)
        .map_err(QrError::from)
        .and_then(|()| enc.finish())
        .unwrap_or_default()
        .into_iter()
        .map(char::from)
        .collect()
}

/// Decodes Base64 `text` into bytes.
pub fn decode(text: &[u8]) -> Result<Vec<u8>> {
    let mut dec = Base64Decoder::new(text);
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    while let Some(b) = dec.next_byte()? {
        out.push(b);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"M"), "TQ==");
        assert_eq!(encode(b"Ma"), "TWE=");
        assert_eq!(encode(b"Man"), "TWFu");
        assert_eq!(encode(b"GIF87a"), "R0lGODdh");
        assert_eq!(encode(&[0xfb, 0xff, 0xbf]), "+/+/");
    }

    #[test]
    fn test_decode_known_values() {
        assert_eq!(decode(b"TWFu").unwrap(), b"Man");
        assert_eq!(decode(b"TWE=").unwrap(), b"Ma");
        assert_eq!(decode(b"TQ==").unwrap(), b"M");
        assert_eq!(decode(b"").unwrap(), b"");
    }

    #[test]
    fn test_roundtrip_all_tail_lengths() {
        let data: Vec<u8> = (0..=255u8).rev().collect();
        for len in [0, 1, 2, 3, 4, 5, 100, 256] {
            let text = encode(&data[..len]);
            assert_eq!(text.len() % 4, 0);
            assert_eq!(decode(text.as_bytes()).unwrap(), &data[..len]);
        }
    }

    #[test]
    fn test_whitespace_is_skipped() {
        assert_eq!(decode(b"TW\r\nFu T\tWE=").unwrap(), b"ManMa");
    }

    #[test]
    fn test_padding_ends_the_data() {
        assert_eq!(decode(b"TQ==TWFu").unwrap(), b"M");
    }

    #[test]
    fn test_invalid_byte_reports_position() {
        match decode(b"TW*u") {
            Err(QrError::InvalidBase64 { byte, position }) => {
                assert_eq!(byte, b'*');
                assert_eq!(position, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unpadded_partial_group_is_truncated() {
        assert!(matches!(decode(b"TWE"), Err(QrError::TruncatedBase64)));
        assert!(matches!(decode(b"T"), Err(QrError::TruncatedBase64)));
    }

    #[test]
    fn test_streaming_encoder_accepts_split_writes() {
        let mut enc = Base64Encoder::new(Vec::new());
        enc.write_all(b"M").unwrap();
        enc.write_all(b"an").unwrap();
        enc.write_all(b"Ma").unwrap();
        enc.flush().unwrap();
        assert_eq!(enc.finish().unwrap(), b"TWFuTWE=");
    }

    struct FlushCounter {
        data: Vec<u8>,
        flushes: usize,
    }

    impl Write for FlushCounter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_tail_and_flush_on_drop() {
        let mut sink = FlushCounter {
            data: Vec::new(),
            flushes: 0,
        };
        {
            let mut enc = Base64Encoder::new(&mut sink);
            enc.write_all(b"Ma").unwrap();
        }
        assert_eq!(sink.data, b"TWE=");
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_finish_flushes_once() {
        let mut sink = FlushCounter {
            data: Vec::new(),
            flushes: 0,
        };
        let mut enc = Base64Encoder::new(&mut sink);
        enc.write_all(b"M").unwrap();
        enc.finish().unwrap();
        assert_eq!(sink.data, b"TQ==");
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_decoder_as_reader() {
        let mut dec = Base64Decoder::new(&b"R0lGODdh"[..]);
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"GIF87a");

        let mut bad = Base64Decoder::new(&b"R0l!"[..]);
        let err = bad.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
