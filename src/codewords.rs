//! Turns a list of segments into the final interleaved data + error correction codewords.

use log::trace;

use crate::error::{QrError, Result};
use crate::polynomial::{error_correction_polynomial, Polynomial};
use crate::qrcode::{QrCodeEcc, Version};
use crate::rs_block::{data_capacity, rs_blocks, RsBlock};
use crate::segment::{BitBuffer, QrSegment};

const PAD0: u32 = 0xEC;
const PAD1: u32 = 0x11;

/// Encodes `segs` for the given version and error correction level.
///
/// Returns every codeword of the symbol in placement order. Fails with
/// [`QrError::CapacityExceeded`] if the segments do not fit; no larger version is tried.
pub fn create_data(version: Version, ecl: QrCodeEcc, segs: &[QrSegment]) -> Result<Vec<u8>> {
    let blocks = rs_blocks(version, ecl);

    let mut bb = BitBuffer::new();
    for seg in segs {
        seg.write(&mut bb, version)?;
    }

    let datacapacitybits = data_capacity(&blocks) * 8;
    if bb.len_bits() > datacapacitybits {
        return Err(QrError::CapacityExceeded {
            bits: bb.len_bits(),
            capacity: datacapacitybits,
        });
    }
    trace!(
        "version {} {:?}: {} data bits of {} in {} blocks",
        version.value(),
        ecl,
        bb.len_bits(),
        datacapacitybits,
        blocks.len()
    );

    // Terminator, only when it fits entirely
    if bb.len_bits() + 4 <= datacapacitybits {
        bb.put(0, 4);
    }
    while bb.len_bits() % 8 != 0 {
        bb.put_bit(false);
    }

    // Pad with alternating bytes until data capacity is reached
    for &padbyte in [PAD0, PAD1].iter().cycle() {
        if bb.len_bits() >= datacapacitybits {
            break;
        }
        bb.put(padbyte, 8);
    }

    Ok(add_ecc_and_interleave(bb.as_bytes(), &blocks))
}

fn add_ecc_and_interleave(data: &[u8], blocks: &[RsBlock]) -> Vec<u8> {
    let mut dcdata: Vec<&[u8]> = Vec::with_capacity(blocks.len());
    let mut ecdata: Vec<Vec<u8>> = Vec::with_capacity(blocks.len());
    let mut generator: Option<Polynomial> = None;

    let mut offset = 0;
    for block in blocks {
        let dat = &data[offset..offset + block.data_count()];
        offset += block.data_count();

        let eccount = block.ec_count();
        let rs = match generator.take() {
            Some(g) if g.degree() == eccount => g,
            _ => error_correction_polynomial(eccount),
        };
        let modpoly = Polynomial::new(dat, rs.degree()).rem(&rs);

        // Right-align the remainder, zero-filling on the left
        let mut ecc = vec![0u8; eccount];
        let skip = eccount.saturating_sub(modpoly.len());
        let coeffs = modpoly.coefficients();
        let coeffs = &coeffs[coeffs.len().saturating_sub(eccount)..];
        ecc[skip..].copy_from_slice(coeffs);

        dcdata.push(dat);
        ecdata.push(ecc);
        generator = Some(rs);
    }

    let total: usize = blocks.iter().map(RsBlock::total_count).sum();
    let mut result = Vec::with_capacity(total);
    interleave(&dcdata, &mut result);
    interleave(&ecdata, &mut result);
    debug_assert_eq!(result.len(), total);
    result
}

// Column-major: codeword 0 of every block, then codeword 1, ...
fn interleave<T: AsRef<[u8]>>(rows: &[T], out: &mut Vec<u8>) {
    let longest = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
    for i in 0..longest {
        for row in rows {
            if let Some(&b) = row.as_ref().get(i) {
                out.push(b);
            }
        }
    }
}
