//! # qrgif
//!
//! A QR Code encoder whose only output is a self-contained `data:image/gif;base64,...` URL.
//!
//! `qrgif` encodes numeric, alphanumeric, byte and Kanji segments into a QR Code Model 2
//! symbol of a caller-chosen version (1 to 40) and error correction level, selects the data
//! mask with the lowest penalty, and renders the module grid as a two-colour GIF87a image.
//! The GIF writer, its LZW compressor and the Base64 codec live in this crate; no imaging
//! library is needed at runtime.
//!
//! ## Example
//!
//! ```rust
//! use qrgif::qrcode::{QrCode, QrCodeEcc, Version};
//! use qrgif::segment::QrSegment;
//!
//! let mut qr = QrCode::new();
//! qr.set_version(Version::new(2));
//! qr.set_error_correction_level(QrCodeEcc::Medium);
//! qr.add_segment(QrSegment::alphanumeric("HELLO WORLD"));
//! qr.build().unwrap();
//!
//! let url = qr.to_data_url(Some(4), None).unwrap();
//! assert!(url.starts_with("data:image/gif;base64,"));
//! ```
//!
//! The version is never raised automatically: segments that do not fit fail with
//! [`QrError::CapacityExceeded`].
//!
//! ## Modules
//!
//! - [`qrcode`]: The encoding session, matrix construction and mask selection.
//! - [`segment`]: Data segments and the bit buffer they are written into.
//! - [`text`]: Text to byte conversion, including the Shift_JIS table used by Kanji mode.
//! - [`codewords`], [`rs_block`], [`polynomial`]: Reed-Solomon codeword generation.
//! - [`gif`], [`base64`], [`io`]: Image encoding and the byte streams underneath it.
//! - [`helper`]: Rasterization and data URL shortcuts.

#![forbid(unsafe_code)]

pub mod base64;
pub mod codewords;
pub mod error;
pub mod gif;
pub mod helper;
pub mod io;
pub mod polynomial;
pub mod qrcode;
pub mod rs_block;
pub mod segment;
pub mod text;

pub use error::{QrError, Result};
pub use qrcode::{Mask, QrCode, QrCodeEcc, Version};
pub use segment::{QrSegment, QrSegmentMode};
pub use text::TextEncoding;
