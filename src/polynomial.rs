//! GF(256) arithmetic and polynomials for Reed-Solomon codeword generation.
//!
//! The field uses the QR Code generator polynomial x^8 + x^4 + x^3 + x^2 + 1. Exponent and
//! logarithm tables are built once on first use and shared by the whole process.

use std::sync::OnceLock;

use crate::error::{QrError, Result};

struct GfTables {
    exp: [u8; 256],
    log: [u8; 256],
}

static GF_TABLES: OnceLock<GfTables> = OnceLock::new();

fn tables() -> &'static GfTables {
    GF_TABLES.get_or_init(|| {
        let mut exp = [0u8; 256];
        for i in 0..256 {
            exp[i] = if i < 8 {
                1u8 << i
            } else {
                exp[i - 4] ^ exp[i - 5] ^ exp[i - 6] ^ exp[i - 8]
            };
        }
        let mut log = [0u8; 256];
        for (i, &e) in exp.iter().enumerate().take(255) {
            log[usize::from(e)] = i as u8;
        }
        GfTables { exp, log }
    })
}

/// Returns the discrete logarithm of `n`, failing for 0.
pub fn glog(n: u8) -> Result<u8> {
    if n < 1 {
        return Err(QrError::LogOfZero);
    }
    Ok(tables().log[usize::from(n)])
}

/// Returns α^n. `n` is folded into range by steps of 255, the multiplicative order of α.
pub fn gexp(mut n: i32) -> u8 {
    while n < 0 {
        n += 255;
    }
    while n >= 256 {
        n -= 255;
    }
    tables().exp[n as usize]
}

// Only called on coefficients already known to be nonzero.
fn log_nonzero(n: u8) -> i32 {
    debug_assert!(n != 0);
    i32::from(tables().log[usize::from(n)])
}

/// A polynomial over GF(256), highest-degree coefficient first.
///
/// Always normalized: the first coefficient is nonzero unless the polynomial is the zero
/// polynomial, which is stored as the single coefficient `0`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Polynomial {
    num: Vec<u8>,
}

impl Polynomial {
    /// Builds a polynomial from `num` multiplied by x^`shift`.
    pub fn new(num: &[u8], shift: usize) -> Self {
        let offset = num.iter().position(|&c| c != 0);
        let num = match offset {
            Some(offset) => {
                let mut coeffs = Vec::with_capacity(num.len() - offset + shift);
                coeffs.extend_from_slice(&num[offset..]);
                coeffs.resize(coeffs.len() + shift, 0);
                coeffs
            }
            None => vec![0],
        };
        Self { num }
    }

    pub fn get(&self, index: usize) -> u8 {
        self.num[index]
    }

    pub fn len(&self) -> usize {
        self.num.len()
    }

    /// Degree of the polynomial; 0 for constants and the zero polynomial.
    pub fn degree(&self) -> usize {
        self.num.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.num[0] == 0
    }

    /// Coefficients, highest degree first.
    pub fn coefficients(&self) -> &[u8] {
        &self.num
    }

    /// Product of two polynomials.
    pub fn multiply(&self, e: &Polynomial) -> Polynomial {
        let mut num = vec![0u8; self.len() + e.len() - 1];
        for (i, &a) in self.num.iter().enumerate() {
            if a == 0 {
                continue;
            }
            for (j, &b) in e.num.iter().enumerate() {
                if b == 0 {
                    continue;
                }
                num[i + j] ^= gexp(log_nonzero(a) + log_nonzero(b));
            }
        }
        Polynomial::new(&num, 0)
    }

    /// Remainder of the division by `e`. The result has a lower degree than `e`, or is zero.
    pub fn rem(&self, e: &Polynomial) -> Polynomial {
        let mut num = self.num.clone();
        loop {
            if num[0] == 0 || num.len() < e.len() {
                return Polynomial { num };
            }
            let ratio = log_nonzero(num[0]) - log_nonzero(e.num[0]);
            for (x, &y) in num.iter_mut().zip(e.num.iter()) {
                if y != 0 {
                    *x ^= gexp(log_nonzero(y) + ratio);
                }
            }
            num = Polynomial::new(&num, 0).num;
        }
    }
}

/// Generator polynomial for `ec_count` error correction codewords: the product of
/// `(x + α^i)` for `i` in `0..ec_count`.
pub fn error_correction_polynomial(ec_count: usize) -> Polynomial {
    let mut a = Polynomial::new(&[1], 0);
    for i in 0..ec_count {
        a = a.multiply(&Polynomial::new(&[1, gexp(i as i32)], 0));
    }
    a
}
