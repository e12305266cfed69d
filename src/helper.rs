use crate::error::{QrError, Result};
use crate::gif::{GifImage, BLACK, WHITE};
use crate::qrcode::{QrCode, QrCodeEcc, Version};

/*---- Utilities ----*/

/// Pixels per module when no cell size is given.
pub const DEFAULT_CELL_SIZE: u32 = 2;

/// Scales a square module grid into a two-colour GIF image.
///
/// `is_dark(row, col)` is queried for every module of the `module_count` × `module_count` grid.
/// Each module becomes a `cell_size` × `cell_size` block, surrounded by `margin` white pixels
/// on every side.
///
/// # Errors
///
/// Returns [`QrError::IllegalArgument`] if `cell_size` is 0 or the resulting image is wider
/// than a GIF can describe.
pub fn rasterize<F>(module_count: usize, is_dark: F, cell_size: u32, margin: u32) -> Result<GifImage>
where
    F: Fn(usize, usize) -> bool,
{
    if cell_size == 0 {
        return Err(QrError::IllegalArgument("cell size must be positive".into()));
    }
    let cell = cell_size as usize;
    let margin = margin as usize;
    let size = module_count
        .checked_mul(cell)
        .and_then(|s| s.checked_add(margin.checked_mul(2)?))
        .ok_or_else(|| QrError::IllegalArgument("image size overflow".into()))?;

    let mut gif = GifImage::new(size, size)?;
    for y in 0..size {
        for x in 0..size {
            let inside = margin <= x && x < size - margin && margin <= y && y < size - margin;
            let dark = inside && is_dark((y - margin) / cell, (x - margin) / cell);
            gif.set_pixel(x, y, if dark { BLACK } else { WHITE })?;
        }
    }
    Ok(gif)
}

/// Renders a built QR Code as a `data:image/gif;base64,...` URL.
///
/// # Arguments
///
/// * `qr` - A QR Code on which `build` has succeeded.
/// * `cell_size` - Optional. Pixels per module. Defaults to 2.
/// * `margin` - Optional. White pixels around the symbol. Defaults to four cells.
///
/// # Errors
///
/// Returns [`QrError::IllegalArgument`] for a zero cell size, an image larger than 65535
/// pixels, or a QR Code that was never built.
pub fn qr_to_data_url(qr: &QrCode, cell_size: Option<u32>, margin: Option<u32>) -> Result<String> {
    if qr.module_count() == 0 {
        return Err(QrError::IllegalArgument("QR Code has not been built".into()));
    }
    let cell_size = cell_size.unwrap_or(DEFAULT_CELL_SIZE);
    let margin = margin.unwrap_or_else(|| cell_size.saturating_mul(4));
    let gif = rasterize(qr.module_count(), |r, c| qr.is_dark(r, c), cell_size, margin)?;
    gif.to_data_url()
}

/// Encodes `content` as a single byte-mode segment and returns the symbol as a GIF data URL.
///
/// # Arguments
///
/// * `content` - The text to encode.
/// * `version` - Optional. The symbol version. Defaults to version 1; no larger version is tried.
/// * `ecl` - Optional. The error correction level. Defaults to `QrCodeEcc::Low`.
/// * `cell_size` - Optional. Pixels per module. Defaults to 2.
/// * `margin` - Optional. White pixels around the symbol. Defaults to four cells.
///
/// # Example
///
/// ```
/// use qrgif::helper::generate_data_url;
/// use qrgif::qrcode::{QrCodeEcc, Version};
///
/// let url = generate_data_url("HELLO WORLD", Some(Version::new(2)), Some(QrCodeEcc::Medium), None, None).unwrap();
/// assert!(url.starts_with("data:image/gif;base64,R0lGODdh"));
/// ```
pub fn generate_data_url(
    content: &str,
    version: Option<Version>,
    ecl: Option<QrCodeEcc>,
    cell_size: Option<u32>,
    margin: Option<u32>,
) -> Result<String> {
    let mut qr = QrCode::new();
    if let Some(version) = version {
        qr.set_version(version);
    }
    if let Some(ecl) = ecl {
        qr.set_error_correction_level(ecl);
    }
    qr.add_text(content, None)?;
    qr.build()?;
    qr_to_data_url(&qr, cell_size, margin)
}
