//! QR code symbol construction.
//!
//! A [`QrCode`] is an encoding session: configure a version and error correction level, add
//! segments, then call [`QrCode::build`]. Building stamps the function patterns into a
//! tri-state [`ModuleGrid`], maps the codewords produced by [`crate::codewords::create_data`]
//! into the remaining cells, and selects the data mask with the lowest penalty score.

use core::convert::TryFrom;
use core::str::FromStr;

use log::{debug, trace};

use crate::codewords::create_data;
use crate::error::{QrError, Result};
use crate::helper::qr_to_data_url;
use crate::segment::{QrSegment, QrSegmentMode};
use crate::text::TextEncoding;

/// A QR Code encoding session and, once built, its square grid of dark and light modules.
///
/// # Example
///
/// ```rust
/// use qrgif::qrcode::{QrCode, QrCodeEcc, Version};
/// use qrgif::segment::QrSegment;
///
/// let mut qr = QrCode::new();
/// qr.set_version(Version::new(1));
/// qr.set_error_correction_level(QrCodeEcc::Low);
/// qr.add_segment(QrSegment::bytes(b"TEST"));
/// qr.build().unwrap();
///
/// assert_eq!(qr.module_count(), 21);
/// assert!(qr.is_dark(0, 0));
/// let url = qr.to_data_url(None, None).unwrap();
/// assert!(url.starts_with("data:image/gif;base64,"));
/// ```
#[derive(Clone, Debug)]
pub struct QrCode {
    version: Version,
    ecl: QrCodeEcc,
    segments: Vec<QrSegment>,
    text_encoding: TextEncoding,

    /// Width and height of the built symbol, 0 before a successful build.
    size: usize,

    /// Row-major modules of the built symbol (true = dark).
    modules: Vec<bool>,

    mask: Option<Mask>,
}

impl Default for QrCode {
    fn default() -> Self {
        Self::new()
    }
}

impl QrCode {
    /// Creates an empty session at version 1, error correction level Low.
    pub fn new() -> Self {
        Self {
            version: Version::MIN,
            ecl: QrCodeEcc::Low,
            segments: Vec::new(),
            text_encoding: TextEncoding::Utf8,
            size: 0,
            modules: Vec::new(),
            mask: None,
        }
    }

    /// Sets the version used by the next `build`. It is never raised automatically.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Returns the configured version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the error correction level used by the next `build`.
    pub fn set_error_correction_level(&mut self, ecl: QrCodeEcc) {
        self.ecl = ecl;
    }

    /// Returns the configured error correction level.
    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.ecl
    }

    /// Sets how `add_text` turns text into bytes for byte-mode segments. Defaults to UTF-8.
    pub fn set_text_encoding(&mut self, encoding: TextEncoding) {
        self.text_encoding = encoding;
    }

    /// The encoding used for byte-mode text.
    pub fn text_encoding(&self) -> &TextEncoding {
        &self.text_encoding
    }

    /// Appends a segment after the ones already added.
    pub fn add_segment(&mut self, segment: QrSegment) {
        self.segments.push(segment);
    }

    /// Adds `text` as a segment of the hinted mode, byte mode when no hint is given.
    ///
    /// Byte-mode text is converted with the session's [`TextEncoding`]; Kanji-mode text is
    /// converted to Shift_JIS.
    pub fn add_text(&mut self, text: &str, mode: Option<QrSegmentMode>) -> Result<()> {
        self.segments.push(QrSegment::from_text(text, mode, &self.text_encoding)?);
        Ok(())
    }

    /// Removes every segment. The last built matrix is kept until the next `build`.
    pub fn clear_segments(&mut self) {
        self.segments.clear();
    }

    /// Returns the segments in the order they will be encoded.
    pub fn segments(&self) -> &[QrSegment] {
        &self.segments
    }

    /// Encodes the segments into a fresh module matrix, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`QrError::CapacityExceeded`] if the segments do not fit the configured version and
    /// error correction level, [`QrError::IllegalCharacter`] if a segment holds a value its
    /// mode cannot encode. On error the session holds no matrix.
    pub fn build(&mut self) -> Result<()> {
        self.size = 0;
        self.modules.clear();
        self.mask = None;

        let data = create_data(self.version, self.ecl, &self.segments)?;
        let mask = self.best_mask(&data);
        let grid = self.make_impl(false, mask, &data);
        let size = grid.size();
        self.modules = grid.finish()?;
        self.size = size;
        self.mask = Some(mask);
        Ok(())
    }

    /// Width and height of the built symbol in modules (`version * 4 + 17`), or 0 if the
    /// session has not been built.
    pub fn module_count(&self) -> usize {
        self.size
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// Returns `true` for dark modules and `false` for light modules. Coordinates outside the
    /// symbol return `false`.
    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size && self.modules[row * self.size + col]
    }

    /// The mask chosen by the last successful build.
    pub fn mask(&self) -> Option<Mask> {
        self.mask
    }

    /// Renders the symbol as a `data:image/gif;base64,` URL.
    ///
    /// `cell_size` is the number of pixels per module (default 2), `margin` the quiet zone in
    /// pixels (default `cell_size * 4`).
    pub fn to_data_url(&self, cell_size: Option<u32>, margin: Option<u32>) -> Result<String> {
        qr_to_data_url(self, cell_size, margin)
    }

    fn best_mask(&self, data: &[u8]) -> Mask {
        let mut minpenalty = i32::MAX;
        let mut best = Mask::new(0);
        for i in 0u8..8 {
            let msk = Mask::new(i);
            let penalty = self.make_impl(true, msk, data).penalty_score();
            trace!("mask {}: penalty {}", i, penalty);
            if penalty < minpenalty {
                best = msk;
                minpenalty = penalty;
            }
        }
        debug!(
            "version {} {:?}: selected mask {} (penalty {})",
            self.version.value(),
            self.ecl,
            best.value(),
            minpenalty
        );
        best
    }

    // A trial pass leaves format and version information light so that only the data
    // region influences the penalty score.
    fn make_impl(&self, test: bool, mask: Mask, data: &[u8]) -> ModuleGrid {
        let mut grid = ModuleGrid::new(usize::from(self.version.value()) * 4 + 17);
        let size = grid.size();
        grid.setup_finder_pattern(0, 0);
        grid.setup_finder_pattern(size - 7, 0);
        grid.setup_finder_pattern(0, size - 7);
        grid.setup_position_adjust_pattern(self.version);
        grid.setup_timing_pattern();
        grid.setup_type_info(test, self.ecl, mask);
        if self.version.value() >= 7 {
            grid.setup_type_number(test, self.version);
        }
        grid.map_data(data, mask);
        grid
    }
}

/// State of a single module while a symbol is being built.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Module {
    #[default]
    Unresolved,
    Light,
    Dark,
}

/// Square grid of [`Module`]s, indexed by `(row, col)`.
#[derive(Clone, Debug)]
pub struct ModuleGrid {
    size: usize,
    cells: Vec<Module>,
}

impl ModuleGrid {
    /// Creates a `size` × `size` grid with every module unresolved.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Module::Unresolved; size * size],
        }
    }

    /// Width and height of the grid in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The module at `(row, col)`, or `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<Module> {
        if row < self.size && col < self.size {
            Some(self.cells[row * self.size + col])
        } else {
            None
        }
    }

    /// Whether `(row, col)` is a dark module. False outside the grid.
    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == Some(Module::Dark)
    }

    /// Whether `(row, col)` has been assigned a color. False outside the grid.
    pub fn is_resolved(&self, row: usize, col: usize) -> bool {
        matches!(self.get(row, col), Some(Module::Light | Module::Dark))
    }

    fn set_dark(&mut self, row: usize, col: usize, isdark: bool) {
        debug_assert!(row < self.size && col < self.size);
        self.cells[row * self.size + col] = if isdark { Module::Dark } else { Module::Light };
    }

    /// Converts a completely resolved grid into row-major booleans (true = dark).
    pub fn finish(self) -> Result<Vec<bool>> {
        if let Some(index) = self.cells.iter().position(|&m| m == Module::Unresolved) {
            return Err(QrError::IllegalArgument(format!(
                "module ({}, {}) left unresolved",
                index / self.size,
                index % self.size
            )));
        }
        Ok(self.cells.iter().map(|&m| m == Module::Dark).collect())
    }

    fn setup_finder_pattern(&mut self, row: usize, col: usize) {
        let size = self.size as i32;
        for r in -1i32..=7 {
            for c in -1i32..=7 {
                let (y, x) = (row as i32 + r, col as i32 + c);
                if !(0..size).contains(&y) || !(0..size).contains(&x) {
                    continue;
                }
                let isdark = ((0..=6).contains(&r) && (c == 0 || c == 6))
                    || ((0..=6).contains(&c) && (r == 0 || r == 6))
                    || ((2..=4).contains(&r) && (2..=4).contains(&c));
                self.set_dark(y as usize, x as usize, isdark);
            }
        }
    }

    fn setup_position_adjust_pattern(&mut self, ver: Version) {
        let pos = alignment_pattern_positions(ver);
        for &row in &pos {
            for &col in &pos {
                if self.is_resolved(row, col) {
                    continue;
                }
                for r in -2i32..=2 {
                    for c in -2i32..=2 {
                        let isdark = r.abs() == 2 || c.abs() == 2 || (r == 0 && c == 0);
                        self.set_dark(
                            (row as i32 + r) as usize,
                            (col as i32 + c) as usize,
                            isdark,
                        );
                    }
                }
            }
        }
    }

    fn setup_timing_pattern(&mut self) {
        for i in 8..self.size - 8 {
            if !self.is_resolved(i, 6) {
                self.set_dark(i, 6, i % 2 == 0);
            }
            if !self.is_resolved(6, i) {
                self.set_dark(6, i, i % 2 == 0);
            }
        }
    }

    fn setup_type_info(&mut self, test: bool, ecl: QrCodeEcc, mask: Mask) {
        let bits = bch_type_info(u32::from((ecl.format_bits() << 3) | mask.value()));
        let size = self.size;
        for i in 0..15 {
            let bit = !test && get_bit(bits, i as u8);

            // vertical
            if i < 6 {
                self.set_dark(i, 8, bit);
            } else if i < 8 {
                self.set_dark(i + 1, 8, bit);
            } else {
                self.set_dark(size - 15 + i, 8, bit);
            }

            // horizontal
            if i < 8 {
                self.set_dark(8, size - i - 1, bit);
            } else if i < 9 {
                self.set_dark(8, 15 - i, bit);
            } else {
                self.set_dark(8, 15 - i - 1, bit);
            }
        }
        self.set_dark(size - 8, 8, !test);
    }

    fn setup_type_number(&mut self, test: bool, ver: Version) {
        let bits = bch_type_number(u32::from(ver.value()));
        let size = self.size;
        for i in 0..18 {
            let bit = !test && get_bit(bits, i as u8);
            self.set_dark(i / 3, i % 3 + size - 11, bit);
            self.set_dark(i % 3 + size - 11, i / 3, bit);
        }
    }

    // Zig-zag through column pairs from the bottom-right corner, skipping the vertical timing
    // column. Modules past the end of the codeword stream carry a light bit.
    fn map_data(&mut self, data: &[u8], mask: Mask) {
        let size = self.size;
        let mut i: usize = 0;
        let mut right = size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            let upward = ((right + 1) & 2) == 0;
            for vert in 0..size {
                let row = if upward { size - 1 - vert } else { vert };
                for j in 0..2 {
                    let col = right - j;
                    if self.is_resolved(row, col) {
                        continue;
                    }
                    let bit = i < data.len() * 8 && get_bit(data[i >> 3].into(), 7 - (i & 7) as u8);
                    self.set_dark(row, col, bit ^ mask.inverts(row, col));
                    i += 1;
                }
            }
            if right < 2 {
                break;
            }
            right -= 2;
        }
    }

    /// Sum of the four mask penalty rules: long same-color runs, 2×2 blocks, finder-like
    /// patterns and imbalance of dark modules.
    pub fn penalty_score(&self) -> i32 {
        let mut result: i32 = 0;
        let size = self.size;
        for row in 0..size {
            result += self.line_penalty(|i| self.is_dark(row, i));
        }
        for col in 0..size {
            result += self.line_penalty(|i| self.is_dark(i, col));
        }
        for row in 0..size - 1 {
            for col in 0..size - 1 {
                let color = self.is_dark(row, col);
                if color == self.is_dark(row, col + 1)
                    && color == self.is_dark(row + 1, col)
                    && color == self.is_dark(row + 1, col + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }
        let dark = self.cells.iter().filter(|&&m| m == Module::Dark).count() as i32;
        let total = (size * size) as i32;
        let k: i32 = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }

    fn line_penalty(&self, module: impl Fn(usize) -> bool) -> i32 {
        let mut result: i32 = 0;
        let mut runcolor = false;
        let mut runlen: i32 = 0;
        let mut runhistory = FinderPenalty::new(self.size);
        for i in 0..self.size {
            if module(i) == runcolor {
                runlen += 1;
                if runlen == 5 {
                    result += PENALTY_N1;
                } else if runlen > 5 {
                    result += 1;
                }
            } else {
                runhistory.add_history(runlen);
                if !runcolor {
                    result += runhistory.count_patterns() * PENALTY_N3;
                }
                runcolor = module(i);
                runlen = 1;
            }
        }
        result + runhistory.terminate_and_count(runcolor, runlen) * PENALTY_N3
    }
}

// Centers of the alignment patterns, shared by rows and columns.
fn alignment_pattern_positions(ver: Version) -> Vec<usize> {
    let ver = usize::from(ver.value());
    if ver == 1 {
        return Vec::new();
    }
    let size = ver * 4 + 17;
    let numalign = ver / 7 + 2;
    let step = if ver == 32 {
        26
    } else {
        ((ver * 4 + numalign * 2 + 1) / (numalign * 2 - 2)) * 2
    };
    let mut result: Vec<usize> = (0..numalign - 1).map(|i| size - 7 - i * step).collect();
    result.push(6);
    result.reverse();
    result
}

// BCH(15,5) format information, XOR-masked with 0x5412.
fn bch_type_info(data: u32) -> u32 {
    let mut rem: u32 = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10) | rem) ^ 0x5412
}

// BCH(18,6) version information.
fn bch_type_number(ver: u32) -> u32 {
    let mut rem: u32 = ver;
    for _ in 0..12 {
        rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
    }
    (ver << 12) | rem
}

struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: usize) -> Self {
        Self {
            qr_size: size as i32,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            currentrunlength += self.qr_size; // Add light border to initial run
        }
        let len: usize = self.run_history.len();
        self.run_history.copy_within(0..len - 1, 1);
        self.run_history[0] = currentrunlength;
    }

    // Counts 1:1:3:1:1 dark runs with at least 4 light modules on one side.
    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        i32::from(
            n > 0
                && rh[2] == n
                && rh[3] == n * 3
                && rh[4] == n
                && rh[5] == n
                && (rh[0] >= n * 4 || rh[6] >= n * 4),
        )
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size; // Add light border to final run
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl QrCodeEcc {
    /// Index into per-level tables (in the range 0 to 3).
    pub(crate) fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    /// Returns the 2-bit value stored in the format information.
    pub(crate) fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }
}

impl FromStr for QrCodeEcc {
    type Err = QrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(QrCodeEcc::Low),
            "M" | "MEDIUM" => Ok(QrCodeEcc::Medium),
            "Q" | "QUARTILE" => Ok(QrCodeEcc::Quartile),
            "H" | "HIGH" => Ok(QrCodeEcc::High),
            _ => Err(QrError::IllegalArgument(format!("unknown error correction level '{}'", s))),
        }
    }
}

/// A QR code version (1–40).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 40].
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.value() <= ver && ver <= Version::MAX.value(),
            "Version number out of range"
        );
        Self(ver)
    }

    /// Returns the value, which is in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Version {
    type Error = QrError;

    fn try_from(ver: u8) -> Result<Self> {
        if (Version::MIN.value()..=Version::MAX.value()).contains(&ver) {
            Ok(Self(ver))
        } else {
            Err(QrError::IllegalArgument(format!("version {} out of range 1..=40", ver)))
        }
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this mask flips the module at `(row, col)`.
    pub fn inverts(self, row: usize, col: usize) -> bool {
        let (i, j) = (row, col);
        match self.0 {
            0 => (i + j) % 2 == 0,
            1 => i % 2 == 0,
            2 => j % 3 == 0,
            3 => (i + j) % 3 == 0,
            4 => (i / 2 + j / 3) % 2 == 0,
            5 => (i * j) % 2 + (i * j) % 3 == 0,
            6 => ((i * j) % 2 + (i * j) % 3) % 2 == 0,
            7 => ((i * j) % 3 + (i + j) % 2) % 2 == 0,
            _ => unreachable!(),
        }
    }
}

fn get_bit(x: u32, i: u8) -> bool {
    ((x >> i) & 1) != 0
}
