//! Conversion of text into the bytes stored by byte and Kanji segments.
//!
//! QR Kanji mode is defined on Shift_JIS, so Kanji text always goes through the built-in
//! [`shift_jis`] table. Byte segments use the session's [`TextEncoding`], UTF-8 unless
//! configured otherwise.
//!
//! Multibyte tables are stored as Base64 of big-endian `(u16 code point, u16 code)` pairs.
//! Characters below 0x80 pass through unchanged and characters missing from a table
//! become `?`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use log::debug;

use crate::base64;
use crate::error::{QrError, Result};

const UNKNOWN_CHAR: u8 = b'?';

static SHIFT_JIS_TABLE: &str = include_str!("../data/shift_jis.b64");
const SHIFT_JIS_CHARS: usize = 6942;

static SHIFT_JIS: OnceLock<UnicodeMap> = OnceLock::new();

/// A character to multibyte code table.
#[derive(Clone, PartialEq, Eq)]
pub struct UnicodeMap {
    map: HashMap<char, u16>,
}

impl UnicodeMap {
    /// Builds a table from Base64 text holding `(u16 code point, u16 code)` pairs.
    ///
    /// Fails if the data is not Base64, ends inside an entry, or does not hold exactly
    /// `num_chars` entries.
    pub fn from_base64(table: &[u8], num_chars: usize) -> Result<Self> {
        let bytes = base64::decode(table)?;
        if bytes.len() % 4 != 0 {
            return Err(QrError::IllegalArgument(format!(
                "unicode table ends inside an entry ({} bytes)",
                bytes.len()
            )));
        }
        let mut map = HashMap::with_capacity(bytes.len() / 4);
        for entry in bytes.chunks_exact(4) {
            let unicode = u32::from(u16::from_be_bytes([entry[0], entry[1]]));
            let code = u16::from_be_bytes([entry[2], entry[3]]);
            let ch = char::from_u32(unicode).ok_or_else(|| {
                QrError::IllegalArgument(format!("{:#06x} is not a character", unicode))
            })?;
            map.insert(ch, code);
        }
        if map.len() != num_chars {
            return Err(QrError::IllegalArgument(format!(
                "unicode table holds {} characters, expected {}",
                map.len(),
                num_chars
            )));
        }
        Ok(Self { map })
    }

    /// Number of characters in the table.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The code for `ch`, if the table has one.
    pub fn code(&self, ch: char) -> Option<u16> {
        self.map.get(&ch).copied()
    }

    /// Encodes `text`, one or two bytes per character.
    pub fn to_bytes(&self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            if ch.is_ascii() {
                bytes.push(ch as u8);
                continue;
            }
            match self.code(ch) {
                Some(code) if code <= 0xff => bytes.push(code as u8),
                Some(code) => bytes.extend_from_slice(&code.to_be_bytes()),
                None => bytes.push(UNKNOWN_CHAR),
            }
        }
        bytes
    }
}

impl fmt::Debug for UnicodeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnicodeMap").field("len", &self.map.len()).finish()
    }
}

/// The built-in Shift_JIS table (JIS X 0208 and half-width katakana), decoded on first use.
pub fn shift_jis() -> Result<&'static UnicodeMap> {
    if let Some(map) = SHIFT_JIS.get() {
        return Ok(map);
    }
    let map = UnicodeMap::from_base64(SHIFT_JIS_TABLE.as_bytes(), SHIFT_JIS_CHARS)?;
    debug!("decoded Shift_JIS table: {} characters", map.len());
    Ok(SHIFT_JIS.get_or_init(|| map))
}

/// How text given to byte segments is turned into bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    ShiftJis,
    /// A caller-supplied table, see [`UnicodeMap::from_base64`].
    Table(Arc<UnicodeMap>),
}

impl TextEncoding {
    /// Converts `text` to segment bytes.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::ShiftJis => Ok(shift_jis()?.to_bytes(text)),
            TextEncoding::Table(map) => Ok(map.to_bytes(text)),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = QrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "utf8" | "utf_8" => Ok(TextEncoding::Utf8),
            "shift_jis" | "sjis" => Ok(TextEncoding::ShiftJis),
            _ => Err(QrError::UnsupportedSegmentInput(format!("unknown text encoding '{}'", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_jis_table_decodes() {
        let sjis = shift_jis().unwrap();
        assert_eq!(sjis.len(), SHIFT_JIS_CHARS);
        assert_eq!(sjis.code('点'), Some(0x935F));
        assert_eq!(sjis.code('茗'), Some(0xE4AA));
        assert_eq!(sjis.code('あ'), Some(0x82A0));
    }

    #[test]
    fn test_shift_jis_bytes() {
        let sjis = shift_jis().unwrap();
        assert_eq!(sjis.to_bytes("点茗"), vec![0x93, 0x5F, 0xE4, 0xAA]);
        // ASCII passes through, half-width katakana is one byte, unmapped becomes '?'.
        assert_eq!(sjis.to_bytes("Aｱ€"), vec![b'A', 0xB1, b'?']);
    }

    #[test]
    fn test_custom_table() {
        // ('é', 0x00E9) and ('Ω', 0x83B6)
        let table = base64::encode(&[0x00, 0xE9, 0x00, 0xE9, 0x03, 0xA9, 0x83, 0xB6]);
        let map = UnicodeMap::from_base64(table.as_bytes(), 2).unwrap();
        assert_eq!(map.to_bytes("éΩx"), vec![0xE9, 0x83, 0xB6, b'x']);
        let enc = TextEncoding::Table(Arc::new(map));
        assert_eq!(enc.encode("Ω").unwrap(), vec![0x83, 0xB6]);
    }

    #[test]
    fn test_table_errors() {
        let two = base64::encode(&[0x00, 0xE9, 0x00, 0xE9, 0x03, 0xA9, 0x83, 0xB6]);
        assert!(matches!(
            UnicodeMap::from_base64(two.as_bytes(), 3),
            Err(QrError::IllegalArgument(_))
        ));
        let partial = base64::encode(&[0x00, 0xE9, 0x00]);
        assert!(matches!(
            UnicodeMap::from_base64(partial.as_bytes(), 1),
            Err(QrError::IllegalArgument(_))
        ));
        assert!(matches!(
            UnicodeMap::from_base64(b"AA*A", 1),
            Err(QrError::InvalidBase64 { byte: b'*', position: 2 })
        ));
        // Surrogates are not characters.
        let surrogate = base64::encode(&[0xD8, 0x00, 0x81, 0x40]);
        assert!(UnicodeMap::from_base64(surrogate.as_bytes(), 1).is_err());
    }

    #[test]
    fn test_encodings() {
        assert_eq!(TextEncoding::default().encode("é").unwrap(), vec![0xC3, 0xA9]);
        assert_eq!(TextEncoding::ShiftJis.encode("点").unwrap(), vec![0x93, 0x5F]);
        assert_eq!("Shift-JIS".parse::<TextEncoding>().unwrap(), TextEncoding::ShiftJis);
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert!("latin1".parse::<TextEncoding>().is_err());
    }
}
