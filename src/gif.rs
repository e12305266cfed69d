//! A minimal two-colour GIF87a encoder.
//!
//! Pixel value `0` is black and `1` is white. The raster is compressed with GIF-flavoured LZW
//! (minimum code size 2, variable code width up to 12 bits). The encoder emits a single clear
//! code at the start and never resets the table: once it holds 4095 entries it stops growing
//! and the remaining pixels are coded against the frozen table.

use std::collections::HashMap;
use std::io::Write;

use log::trace;

use crate::base64::Base64Encoder;
use crate::error::{QrError, Result};
use crate::io::LsbBitWriter;

/// Pixel index of the first palette entry (black).
pub const BLACK: u8 = 0;
/// Pixel index of the second palette entry (white).
pub const WHITE: u8 = 1;

const MAX_DIMENSION: usize = 0xffff;
const MIN_CODE_SIZE: u8 = 2;
const MAX_TABLE_SIZE: u16 = 0xfff;
const MAX_SUB_BLOCK: usize = 255;

/// A width × height grid of palette indices, initialised to black.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GifImage {
    /// Creates an all-black image. Both dimensions must be in `1..=65535`.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(QrError::IllegalArgument(format!(
                "image size {}x{} outside 1..={}",
                width, height, MAX_DIMENSION
            )));
        }
        Ok(Self {
            width,
            height,
            data: vec![BLACK; width * height],
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sets the palette index at `(x, y)`: [`BLACK`] or [`WHITE`].
    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: u8) -> Result<()> {
        if pixel > WHITE {
            return Err(QrError::IllegalArgument(format!("pixel value {}", pixel)));
        }
        let index = self.index(x, y)?;
        self.data[index] = pixel;
        Ok(())
    }

    /// Returns the palette index at `(x, y)`.
    pub fn get_pixel(&self, x: usize, y: usize) -> Result<u8> {
        Ok(self.data[self.index(x, y)?])
    }

    fn index(&self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(QrError::IllegalArgument(format!(
                "pixel ({}, {}) outside {}x{}",
                x, y, self.width, self.height
            )));
        }
        Ok(y * self.width + x)
    }

    /// Writes the complete GIF87a file to `out`.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        // Header and logical screen descriptor: global 2-entry palette, background 0.
        out.write_all(b"GIF87a")?;
        write_word(out, self.width)?;
        write_word(out, self.height)?;
        out.write_all(&[0x80, 0, 0])?;

        // Global colour table
        out.write_all(&[0x00, 0x00, 0x00, 0xff, 0xff, 0xff])?;

        // Image descriptor covering the whole screen, no local table, not interlaced.
        out.write_all(b",")?;
        write_word(out, 0)?;
        write_word(out, 0)?;
        write_word(out, self.width)?;
        write_word(out, self.height)?;
        out.write_all(&[0])?;

        let raster = lzw_encode(&self.data, MIN_CODE_SIZE)?;
        trace!(
            "gif {}x{}: {} pixels -> {} lzw bytes",
            self.width,
            self.height,
            self.data.len(),
            raster.len()
        );
        out.write_all(&[MIN_CODE_SIZE])?;
        for block in raster.chunks(MAX_SUB_BLOCK) {
            out.write_all(&[block.len() as u8])?;
            out.write_all(block)?;
        }
        out.write_all(&[0x00])?;

        // Trailer
        out.write_all(b";")?;
        Ok(())
    }

    /// The complete GIF file in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    /// Returns `data:image/gif;base64,` followed by the Base64 of the GIF file.
    pub fn to_data_url(&self) -> Result<String> {
        let mut url = b"data:image/gif;base64,".to_vec();
        let mut enc = Base64Encoder::new(&mut url);
        self.write(&mut enc)?;
        enc.finish()?;
        Ok(url.into_iter().map(char::from).collect())
    }
}

fn write_word<W: Write>(out: &mut W, value: usize) -> Result<()> {
    let value = u16::try_from(value)
        .map_err(|_| QrError::IllegalArgument(format!("{} does not fit in a GIF word", value)))?;
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// String table of the LZW encoder. Root codes stand for the single symbols; every other entry
/// is an existing code extended by one symbol.
struct LzwTable {
    map: HashMap<(u16, u8), u16>,
    size: u16,
}

impl LzwTable {
    fn new(clear_code: u16) -> Self {
        Self {
            map: HashMap::new(),
            // roots plus the clear and end codes
            size: clear_code + 2,
        }
    }

    fn size(&self) -> u16 {
        self.size
    }

    fn get(&self, prefix: u16, symbol: u8) -> Option<u16> {
        self.map.get(&(prefix, symbol)).copied()
    }

    fn add(&mut self, prefix: u16, symbol: u8) -> Result<()> {
        if self.map.contains_key(&(prefix, symbol)) {
            return Err(QrError::IllegalArgument(format!(
                "duplicate lzw entry ({}, {})",
                prefix, symbol
            )));
        }
        self.map.insert((prefix, symbol), self.size);
        self.size += 1;
        Ok(())
    }
}

/// Compresses `pixels` into a GIF LZW code stream (without sub-block framing).
///
/// Every pixel must be below `1 << min_code_size`.
pub(crate) fn lzw_encode(pixels: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    let clear_code = 1u16 << min_code_size;
    let end_code = clear_code + 1;
    let mut bit_length = min_code_size + 1;

    let mut table = LzwTable::new(clear_code);
    let mut out = LsbBitWriter::new(Vec::new());

    out.write_code(u32::from(clear_code), bit_length)?;

    let mut rest = pixels.iter();
    let mut prefix = match rest.next() {
        Some(&p) => root_code(p, clear_code)?,
        None => {
            out.write_code(u32::from(end_code), bit_length)?;
            return out.finish();
        }
    };

    for &p in rest {
        root_code(p, clear_code)?;
        match table.get(prefix, p) {
            Some(code) => prefix = code,
            None => {
                out.write_code(u32::from(prefix), bit_length)?;
                if table.size() < MAX_TABLE_SIZE {
                    if table.size() == 1 << bit_length {
                        bit_length += 1;
                    }
                    table.add(prefix, p)?;
                }
                prefix = u16::from(p);
            }
        }
    }

    out.write_code(u32::from(prefix), bit_length)?;
    out.write_code(u32::from(end_code), bit_length)?;
    out.finish()
}

fn root_code(symbol: u8, clear_code: u16) -> Result<u16> {
    let code = u16::from(symbol);
    if code >= clear_code {
        return Err(QrError::IllegalArgument(format!(
            "symbol {} outside the {}-entry root alphabet",
            symbol, clear_code
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weezl_decode(stream: &[u8]) -> Vec<u8> {
        let mut decoder = weezl::decode::Decoder::new(weezl::BitOrder::Lsb, MIN_CODE_SIZE);
        decoder.decode(stream).unwrap()
    }

    #[test]
    fn test_lzw_small_reference_stream() {
        assert_eq!(lzw_encode(&[0, 0, 1, 3], 2).unwrap(), vec![0x04, 0x32, 0x05]);
    }

    #[test]
    fn test_lzw_decodes_with_independent_decoder() {
        let mut pixels = Vec::new();
        for i in 0..5000u32 {
            pixels.push(((i / 7 + i / 131) % 2) as u8);
        }
        assert_eq!(weezl_decode(&lzw_encode(&pixels, 2).unwrap()), pixels);
    }

    #[test]
    fn test_lzw_past_full_table() {
        // A pseudo-random stream fills the 4095-entry table well before the end.
        let mut state = 0x2545_f491u32;
        let pixels: Vec<u8> = (0..60_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 1) as u8
            })
            .collect();
        assert_eq!(weezl_decode(&lzw_encode(&pixels, 2).unwrap()), pixels);
    }

    #[test]
    fn test_lzw_rejects_symbol_outside_alphabet() {
        assert!(matches!(lzw_encode(&[0, 4], 2), Err(QrError::IllegalArgument(_))));
    }

    #[test]
    fn test_dimensions_are_checked() {
        assert!(GifImage::new(0, 1).is_err());
        assert!(GifImage::new(1, 0x10000).is_err());
        assert!(GifImage::new(0xffff, 1).is_ok());
    }

    #[test]
    fn test_pixels_default_black_and_are_bounds_checked() {
        let mut img = GifImage::new(2, 3).unwrap();
        assert_eq!(img.get_pixel(1, 2).unwrap(), BLACK);
        img.set_pixel(1, 2, WHITE).unwrap();
        assert_eq!(img.get_pixel(1, 2).unwrap(), WHITE);
        assert!(img.set_pixel(2, 0, WHITE).is_err());
        assert!(img.get_pixel(0, 3).is_err());
        assert!(img.set_pixel(0, 0, 2).is_err());
    }

    #[test]
    fn test_file_layout() {
        let mut img = GifImage::new(3, 2).unwrap();
        img.set_pixel(0, 0, WHITE).unwrap();
        let bytes = img.to_bytes().unwrap();
        assert_eq!(&bytes[..6], b"GIF87a");
        assert_eq!(&bytes[6..13], &[3, 0, 2, 0, 0x80, 0, 0]);
        assert_eq!(&bytes[13..19], &[0, 0, 0, 0xff, 0xff, 0xff]);
        assert_eq!(&bytes[19..29], &[b',', 0, 0, 0, 0, 3, 0, 2, 0, 0]);
        assert_eq!(bytes[29], MIN_CODE_SIZE);
        let block_len = usize::from(bytes[30]);
        assert_eq!(weezl_decode(&bytes[31..31 + block_len]), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[31 + block_len..], &[0x00, b';']);
    }

    #[test]
    fn test_raster_split_into_sub_blocks() {
        let mut img = GifImage::new(300, 300).unwrap();
        let mut state = 7u32;
        for y in 0..300 {
            for x in 0..300 {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                img.set_pixel(x, y, ((state >> 16) & 1) as u8).unwrap();
            }
        }
        let bytes = img.to_bytes().unwrap();
        let mut pos = 30;
        let mut blocks = Vec::new();
        loop {
            let len = usize::from(bytes[pos]);
            if len == 0 {
                break;
            }
            blocks.push(len);
            pos += 1 + len;
        }
        assert!(blocks.len() > 1);
        assert!(blocks[..blocks.len() - 1].iter().all(|&len| len == 255));
        assert_eq!(&bytes[pos..], &[0x00, b';']);
    }

    #[test]
    fn test_data_url_prefix_and_payload() {
        let img = GifImage::new(1, 1).unwrap();
        let url = img.to_data_url().unwrap();
        let payload = url.strip_prefix("data:image/gif;base64,").unwrap();
        assert_eq!(
            crate::base64::decode(payload.as_bytes()).unwrap(),
            img.to_bytes().unwrap()
        );
        assert!(payload.starts_with("R0lGODdh"));
    }
}
