//! The single error type shared by the symbol encoder and the image encoder.

use thiserror::Error;

use crate::segment::QrSegmentMode;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QrError>;

/// Everything that can abort a `build` or an encode call.
///
/// Ways to handle [`QrError::CapacityExceeded`]:
///
/// - Choose a larger version with [`crate::qrcode::QrCode::set_version`].
/// - Decrease the error correction level if it was greater than `QrCodeEcc::Low`.
/// - Use a denser segment mode (numeric or alphanumeric) where the text allows it.
/// - Shorten the payload.
#[derive(Error, Debug)]
pub enum QrError {
    /// The encoded segments do not fit the selected version and EC level.
    #[error("code length overflow: data length = {bits} bits, max capacity = {capacity} bits")]
    CapacityExceeded { bits: usize, capacity: usize },

    /// A segment holds a value its mode cannot represent.
    #[error("illegal character {value:#x} at position {position} in {mode:?} segment")]
    IllegalCharacter {
        mode: QrSegmentMode,
        position: usize,
        value: u32,
    },

    /// An internal invariant was violated (pixel out of range, code too wide, ...).
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Input that cannot be turned into any segment variant.
    #[error("unsupported segment input: {0}")]
    UnsupportedSegmentInput(String),

    /// `glog(0)` is undefined in GF(256).
    #[error("arithmetic domain error: log(0)")]
    LogOfZero,

    #[error("invalid base64 byte {byte:#04x} at position {position}")]
    InvalidBase64 { byte: u8, position: usize },

    #[error("base64 input ends with an incomplete group")]
    TruncatedBase64,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
