//! Data segments and the MSB-first bit buffer they are packed into.

use core::str::FromStr;

use crate::error::{QrError, Result};
use crate::qrcode::Version;
use crate::text::{shift_jis, TextEncoding};

/// A segment of data in a QR code.
///
/// Each variant keeps its raw payload; packing into bits happens in [`QrSegment::write`], so
/// an illegal character is reported when the symbol is built.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum QrSegment {
    /// Decimal digits `0`–`9`.
    Numeric(String),
    /// Digits, uppercase letters, space and `$%*+-./:`.
    Alphanumeric(String),
    /// Arbitrary bytes; text is stored as its UTF-8 encoding.
    Byte(Vec<u8>),
    /// Shift_JIS double-byte characters.
    Kanji(Vec<u8>),
}

impl QrSegment {
    /// A numeric segment; every character must be an ASCII digit.
    pub fn numeric(text: &str) -> Self {
        QrSegment::Numeric(text.to_owned())
    }

    /// An alphanumeric segment over `0-9`, `A-Z`, space and `$%*+-./:`.
    pub fn alphanumeric(text: &str) -> Self {
        QrSegment::Alphanumeric(text.to_owned())
    }

    /// A byte segment holding `data` unchanged.
    pub fn bytes(data: &[u8]) -> Self {
        QrSegment::Byte(data.to_vec())
    }

    /// Creates a Kanji segment from Shift_JIS encoded bytes.
    pub fn kanji(sjis: &[u8]) -> Self {
        QrSegment::Kanji(sjis.to_vec())
    }

    /// Builds a segment from text and an optional mode hint.
    ///
    /// Without a hint the text is stored in byte mode, converted by `encoding`. A Kanji hint
    /// converts the text to Shift_JIS whatever `encoding` is; characters outside the Kanji
    /// ranges are reported by [`QrSegment::write`].
    pub fn from_text(
        text: &str,
        mode: Option<QrSegmentMode>,
        encoding: &TextEncoding,
    ) -> Result<Self> {
        use QrSegmentMode::*;
        match mode.unwrap_or(Byte) {
            Numeric => Ok(QrSegment::numeric(text)),
            Alphanumeric => Ok(QrSegment::alphanumeric(text)),
            Byte => Ok(QrSegment::Byte(encoding.encode(text)?)),
            Kanji => Ok(QrSegment::Kanji(shift_jis()?.to_bytes(text))),
        }
    }

    /// The mode this segment is encoded in.
    pub fn mode(&self) -> QrSegmentMode {
        match self {
            QrSegment::Numeric(_) => QrSegmentMode::Numeric,
            QrSegment::Alphanumeric(_) => QrSegmentMode::Alphanumeric,
            QrSegment::Byte(_) => QrSegmentMode::Byte,
            QrSegment::Kanji(_) => QrSegmentMode::Kanji,
        }
    }

    /// The value written into the character count field.
    pub fn num_chars(&self) -> usize {
        match self {
            QrSegment::Numeric(text) | QrSegment::Alphanumeric(text) => text.len(),
            QrSegment::Byte(data) => data.len(),
            QrSegment::Kanji(data) => data.len() / 2,
        }
    }

    /// Number of payload bits, excluding the mode tag and the length field.
    pub fn payload_bits(&self) -> usize {
        let n = self.num_chars();
        match self {
            QrSegment::Numeric(_) => n / 3 * 10 + [0, 4, 7][n % 3],
            QrSegment::Alphanumeric(_) => n / 2 * 11 + (n % 2) * 6,
            QrSegment::Byte(_) => n * 8,
            QrSegment::Kanji(_) => n * 13,
        }
    }

    /// Width of this segment's character count field at `version`.
    pub fn length_field_bits(&self, version: Version) -> u8 {
        self.mode().num_char_count_bits(version)
    }

    /// Appends mode tag, length field and payload to `bb`.
    pub fn write(&self, bb: &mut BitBuffer, version: Version) -> Result<()> {
        bb.put(self.mode().mode_bits(), 4);
        bb.put(self.num_chars() as u32, self.length_field_bits(version));
        match self {
            QrSegment::Numeric(text) => write_numeric(text, bb),
            QrSegment::Alphanumeric(text) => write_alphanumeric(text, bb),
            QrSegment::Byte(data) => {
                for &b in data {
                    bb.put(u32::from(b), 8);
                }
                Ok(())
            }
            QrSegment::Kanji(data) => write_kanji(data, bb),
        }
    }
}

fn write_numeric(text: &str, bb: &mut BitBuffer) -> Result<()> {
    let mut accumdata: u32 = 0;
    let mut accumcount: u8 = 0;
    for (position, c) in text.chars().enumerate() {
        let digit = c.to_digit(10).ok_or(QrError::IllegalCharacter {
            mode: QrSegmentMode::Numeric,
            position,
            value: u32::from(c),
        })?;
        accumdata = accumdata * 10 + digit;
        accumcount += 1;
        if accumcount == 3 {
            bb.put(accumdata, 10);
            accumdata = 0;
            accumcount = 0;
        }
    }
    if accumcount > 0 {
        bb.put(accumdata, accumcount * 3 + 1);
    }
    Ok(())
}

fn write_alphanumeric(text: &str, bb: &mut BitBuffer) -> Result<()> {
    let mut accumdata: u32 = 0;
    let mut accumcount: u8 = 0;
    for (position, c) in text.chars().enumerate() {
        let i = ALPHANUMERIC_CHARSET.find(c).ok_or(QrError::IllegalCharacter {
            mode: QrSegmentMode::Alphanumeric,
            position,
            value: u32::from(c),
        })?;
        accumdata = accumdata * 45 + i as u32;
        accumcount += 1;
        if accumcount == 2 {
            bb.put(accumdata, 11);
            accumdata = 0;
            accumcount = 0;
        }
    }
    if accumcount > 0 {
        bb.put(accumdata, 6);
    }
    Ok(())
}

fn write_kanji(data: &[u8], bb: &mut BitBuffer) -> Result<()> {
    let mut pairs = data.chunks_exact(2);
    for (i, pair) in pairs.by_ref().enumerate() {
        let mut c = (u32::from(pair[0]) << 8) | u32::from(pair[1]);
        if (0x8140..=0x9FFC).contains(&c) {
            c -= 0x8140;
        } else if (0xE040..=0xEBBF).contains(&c) {
            c -= 0xC140;
        } else {
            return Err(QrError::IllegalCharacter {
                mode: QrSegmentMode::Kanji,
                position: i * 2,
                value: c,
            });
        }
        bb.put(((c >> 8) & 0xff) * 0xC0 + (c & 0xff), 13);
    }
    if let [trailing] = pairs.remainder() {
        return Err(QrError::IllegalCharacter {
            mode: QrSegmentMode::Kanji,
            position: data.len() - 1,
            value: u32::from(*trailing),
        });
    }
    Ok(())
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QrSegmentMode {
    Numeric,
    Alphanumeric,
    Byte,
    Kanji,
}

impl QrSegmentMode {
    /// The 4-bit mode indicator.
    pub fn mode_bits(self) -> u32 {
        use QrSegmentMode::*;
        match self {
            Numeric => 0x1,
            Alphanumeric => 0x2,
            Byte => 0x4,
            Kanji => 0x8,
        }
    }

    /// Width of the character count field for versions 1–9, 10–26 and 27–40.
    pub fn num_char_count_bits(self, ver: Version) -> u8 {
        use QrSegmentMode::*;
        let widths = match self {
            Numeric => [10, 12, 14],
            Alphanumeric => [9, 11, 13],
            Byte => [8, 16, 16],
            Kanji => [8, 10, 12],
        };
        match ver.value() {
            1..=9 => widths[0],
            10..=26 => widths[1],
            _ => widths[2],
        }
    }
}

impl FromStr for QrSegmentMode {
    type Err = QrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" | "number" => Ok(QrSegmentMode::Numeric),
            "alphanumeric" | "alnum" => Ok(QrSegmentMode::Alphanumeric),
            "byte" | "8bit" => Ok(QrSegmentMode::Byte),
            "kanji" => Ok(QrSegmentMode::Kanji),
            _ => Err(QrError::UnsupportedSegmentInput(format!("unknown segment mode '{}'", s))),
        }
    }
}

/// Append-only bit sequence, most significant bit first.
#[derive(Clone, Default, Debug)]
pub struct BitBuffer {
    data: Vec<u8>,
    length: usize,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits appended so far.
    pub fn len_bits(&self) -> usize {
        self.length
    }

    /// Appends the low `len` bits of `val`. Higher bits are ignored.
    pub fn put(&mut self, val: u32, len: u8) {
        for i in (0..len).rev() {
            self.put_bit((val >> i) & 1 == 1);
        }
    }

    /// Appends a single bit.
    pub fn put_bit(&mut self, bit: bool) {
        let index = self.length >> 3;
        if index == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[index] |= 0x80 >> (self.length & 7);
        }
        self.length += 1;
    }

    /// The buffered bits; a final partial byte is completed with zero bits.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BitReader<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl BitReader<'_> {
        fn read(&mut self, len: u8) -> u32 {
            let mut v = 0;
            for _ in 0..len {
                let bit = (self.data[self.pos >> 3] >> (7 - (self.pos & 7))) & 1;
                v = (v << 1) | u32::from(bit);
                self.pos += 1;
            }
            v
        }
    }

    fn encode(seg: &QrSegment, ver: u8) -> Result<BitBuffer> {
        let mut bb = BitBuffer::new();
        seg.write(&mut bb, Version::new(ver))?;
        Ok(bb)
    }

    #[test]
    fn test_bit_buffer_length_and_order() {
        let fields: [(u32, u8); 6] = [(0b1, 1), (0x4, 4), (0x3ff, 10), (0, 3), (0xABCD, 16), (5, 3)];
        let mut bb = BitBuffer::new();
        for &(v, n) in &fields {
            bb.put(v, n);
        }
        assert_eq!(bb.len_bits(), fields.iter().map(|&(_, n)| usize::from(n)).sum::<usize>());
        let mut reader = BitReader { data: bb.as_bytes(), pos: 0 };
        for &(v, n) in &fields {
            assert_eq!(reader.read(n), v);
        }
    }

    #[test]
    fn test_bit_buffer_masks_high_bits_and_pads_last_byte() {
        let mut bb = BitBuffer::new();
        bb.put(0xFF3, 4);
        bb.put_bit(true);
        assert_eq!(bb.len_bits(), 5);
        assert_eq!(bb.as_bytes(), &[0b0011_1000]);
    }

    #[test]
    fn test_numeric_packing() {
        // "01234567" -> 012 | 345 | 67 as in the QR standard example.
        let seg = QrSegment::numeric("01234567");
        assert_eq!(seg.payload_bits(), 27);
        let bb = encode(&seg, 1).unwrap();
        assert_eq!(bb.len_bits(), 4 + 10 + 27);
        let mut r = BitReader { data: bb.as_bytes(), pos: 0 };
        assert_eq!(r.read(4), 0b0001);
        assert_eq!(r.read(10), 8);
        assert_eq!(r.read(10), 12);
        assert_eq!(r.read(10), 345);
        assert_eq!(r.read(7), 67);
    }

    #[test]
    fn test_numeric_single_digit_remainder() {
        let bb = encode(&QrSegment::numeric("1234"), 1).unwrap();
        assert_eq!(bb.len_bits(), 4 + 10 + 10 + 4);
    }

    #[test]
    fn test_numeric_rejects_non_digits() {
        let err = encode(&QrSegment::numeric("12a4"), 1).unwrap_err();
        assert!(matches!(
            err,
            QrError::IllegalCharacter { mode: QrSegmentMode::Numeric, position: 2, value: 0x61 }
        ));
    }

    #[test]
    fn test_alphanumeric_packing() {
        let bb = encode(&QrSegment::alphanumeric("AC-42"), 1).unwrap();
        let mut r = BitReader { data: bb.as_bytes(), pos: 0 };
        assert_eq!(r.read(4), 0b0010);
        assert_eq!(r.read(9), 5);
        assert_eq!(r.read(11), 10 * 45 + 12);
        assert_eq!(r.read(11), 41 * 45 + 4);
        assert_eq!(r.read(6), 2);
        assert!(encode(&QrSegment::alphanumeric("abc"), 1).is_err());
    }

    #[test]
    fn test_byte_length_field_by_version() {
        let seg = QrSegment::bytes(b"TEST");
        assert_eq!(seg.length_field_bits(Version::new(9)), 8);
        assert_eq!(seg.length_field_bits(Version::new(10)), 16);
        assert_eq!(seg.length_field_bits(Version::new(40)), 16);
        assert_eq!(encode(&seg, 1).unwrap().len_bits(), 4 + 8 + 32);
        assert_eq!(encode(&seg, 10).unwrap().len_bits(), 4 + 16 + 32);
    }

    #[test]
    fn test_kanji_packing() {
        // 0x935F and 0xE4AA are the two examples of the QR standard.
        let bb = encode(&QrSegment::kanji(&[0x93, 0x5F, 0xE4, 0xAA]), 1).unwrap();
        let mut r = BitReader { data: bb.as_bytes(), pos: 0 };
        assert_eq!(r.read(4), 0b1000);
        assert_eq!(r.read(8), 2);
        assert_eq!(r.read(13), 0x0D9F);
        assert_eq!(r.read(13), 0x1AAA);
    }

    #[test]
    fn test_kanji_range_boundaries() {
        assert!(encode(&QrSegment::kanji(&[0x81, 0x40]), 1).is_ok());
        let err = encode(&QrSegment::kanji(&[0x7F, 0x40]), 1).unwrap_err();
        assert!(matches!(
            err,
            QrError::IllegalCharacter { mode: QrSegmentMode::Kanji, position: 0, value: 0x7F40 }
        ));
    }

    #[test]
    fn test_kanji_odd_trailing_byte() {
        let err = encode(&QrSegment::kanji(&[0x81, 0x40, 0x81]), 1).unwrap_err();
        assert!(matches!(err, QrError::IllegalCharacter { position: 2, .. }));
    }

    #[test]
    fn test_mode_hints() {
        assert_eq!("Numeric".parse::<QrSegmentMode>().unwrap(), QrSegmentMode::Numeric);
        assert!(matches!(
            "hanzi".parse::<QrSegmentMode>(),
            Err(QrError::UnsupportedSegmentInput(_))
        ));
        let utf8 = TextEncoding::Utf8;
        assert_eq!(
            QrSegment::from_text("hi", None, &utf8).unwrap(),
            QrSegment::Byte(b"hi".to_vec())
        );
        assert_eq!(
            QrSegment::from_text("12", Some(QrSegmentMode::Numeric), &utf8).unwrap(),
            QrSegment::numeric("12")
        );
    }

    #[test]
    fn test_kanji_text_uses_shift_jis() {
        let seg = QrSegment::from_text("点茗", Some(QrSegmentMode::Kanji), &TextEncoding::Utf8)
            .unwrap();
        assert_eq!(seg, QrSegment::kanji(&[0x93, 0x5F, 0xE4, 0xAA]));
        assert_eq!(seg.num_chars(), 2);
        let bb = encode(&seg, 1).unwrap();
        let mut r = BitReader { data: bb.as_bytes(), pos: 0 };
        assert_eq!(r.read(4), 0b1000);
        assert_eq!(r.read(8), 2);
        assert_eq!(r.read(13), 0x0D9F);
        assert_eq!(r.read(13), 0x1AAA);
    }

    #[test]
    fn test_kanji_text_with_ascii_is_rejected_when_written() {
        let seg = QrSegment::from_text("点A", Some(QrSegmentMode::Kanji), &TextEncoding::Utf8)
            .unwrap();
        // 0x93 0x5F then the lone byte 'A'
        let err = encode(&seg, 1).unwrap_err();
        assert!(matches!(err, QrError::IllegalCharacter { position: 2, .. }));
    }

    #[test]
    fn test_byte_text_follows_encoding() {
        assert_eq!(
            QrSegment::from_text("点", None, &TextEncoding::Utf8).unwrap(),
            QrSegment::Byte("点".as_bytes().to_vec())
        );
        assert_eq!(
            QrSegment::from_text("点", None, &TextEncoding::ShiftJis).unwrap(),
            QrSegment::Byte(vec![0x93, 0x5F])
        );
    }
}
