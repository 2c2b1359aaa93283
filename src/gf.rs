//! Galois field `GF(2^w)` linear algebra used by the codecs.
//!
//! **This is an advanced module which is not needed for normal usage.**
//!
//! It is relevant if you want to
//! - inspect the coding matrices built for a [`Requirement`].
//! - run scheduled bitmatrix products on your own buffers.
//! - understand/benchmark/test at low level.
//!
//! # Data layout
//!
//! Every linear operation works on *symbols*, i.e. byte regions of equal
//! size `size` where `size` is a multiple of `w`. A symbol is split into
//! `w` packets of `size / w` bytes and packet `x` holds bit `x` of every
//! field element in the symbol. Multiplying a symbol by a field element
//! is therefore a sequence of packet XORs described by a [`Bitmatrix`],
//! and a [`Schedule`] orders those XORs so that already computed packets
//! are reused.
//!
//! [`Requirement`]: crate::Requirement

use std::fmt;

pub use self::{
    bitmatrix::Bitmatrix,
    erasure::decode_erasures,
    matrix::Matrix,
    region::{Regions, Slot},
    schedule::{CodingMatrix, Op, Packet, Schedule},
};

use crate::Error;

mod bitmatrix;
mod erasure;
mod matrix;
mod region;
mod schedule;

pub mod tables;

// ======================================================================
// TYPE ALIASES - PUBLIC

/// Element of `GF(2^w)`, stored in the low `w` bits.
pub type GfElement = u32;

// ======================================================================
// CONST - PUBLIC

/// Largest supported word size in bits.
pub const MAX_W: usize = 32;

/// Low part of the primitive polynomial for each word size,
/// i.e. the polynomial without its `x^w` term.
pub const PRIMITIVE_POLYNOMIAL: [GfElement; MAX_W + 1] = [
    0, 0x1, 0x3, 0x3, 0x3, 0x5, 0x3, 0x9, 0x1d, 0x11, 0x9, 0x5, 0x53, 0x1b, 0x443, 0x3, 0x100b,
    0x9, 0x81, 0x27, 0x9, 0x5, 0x3, 0x21, 0x87, 0x9, 0x47, 0x27, 0x9, 0x5, 0x800007, 0x9,
    0x400007,
];

// ======================================================================
// Field - PUBLIC

/// Arithmetic in `GF(2^w)` for `1 <= w <= 32`.
///
/// Word sizes up to [`tables::MAX_TABLE_W`] use global log/exp tables,
/// larger ones use shift-and-add multiplication.
#[derive(Clone, Copy)]
pub struct Field {
    w: usize,
    tables: Option<&'static tables::ExpLog>,
}

impl Field {
    /// Adds `a` and `b`.
    #[inline(always)]
    pub fn add(self, a: GfElement, b: GfElement) -> GfElement {
        a ^ b
    }

    /// Returns the number of ones in the bitmatrix of `a`.
    ///
    /// This is the number of packet XORs needed to multiply by `a`
    /// and is what [`Matrix::cauchy`] minimizes.
    pub fn bit_weight(self, a: GfElement) -> u32 {
        let mut x = a;
        let mut ones = 0;
        for i in 0..self.w {
            ones += x.count_ones();
            if i + 1 < self.w {
                x = self.mul_x(x);
            }
        }
        ones
    }

    /// Divides `a` by `b`.
    ///
    /// Division by zero gives zero.
    pub fn div(self, a: GfElement, b: GfElement) -> GfElement {
        if a == 0 || b == 0 {
            return 0;
        }
        match self.tables {
            Some(t) => {
                let modulus = (1 << self.w) - 1;
                t.exp[(t.log[a as usize] + modulus - t.log[b as usize]) as usize]
            }
            None => self.mul(a, self.inv(b)),
        }
    }

    /// Returns multiplicative inverse of `a`, or `0` if `a == 0`.
    pub fn inv(self, a: GfElement) -> GfElement {
        if a == 0 {
            return 0;
        }
        match self.tables {
            Some(_) => self.div(1, a),
            None => self.pow(a, (1u64 << self.w) - 2),
        }
    }

    /// Returns mask of valid element bits.
    pub fn mask(self) -> GfElement {
        (((1u64) << self.w) - 1) as GfElement
    }

    /// Multiplies `a` and `b`.
    pub fn mul(self, a: GfElement, b: GfElement) -> GfElement {
        if a == 0 || b == 0 {
            return 0;
        }
        match self.tables {
            Some(t) => t.exp[(t.log[a as usize] + t.log[b as usize]) as usize],
            None => self.mul_shift(a, b),
        }
    }

    /// Multiplies `a` by the generator `x`.
    #[inline(always)]
    pub fn mul_x(self, a: GfElement) -> GfElement {
        let a = (a as u64) << 1;
        let top = 1u64 << self.w;
        if a & top != 0 {
            ((a ^ top) as GfElement) ^ PRIMITIVE_POLYNOMIAL[self.w]
        } else {
            a as GfElement
        }
    }

    /// Creates field `GF(2^w)`.
    pub fn new(w: usize) -> Result<Self, Error> {
        if w == 0 || w > MAX_W {
            return Err(Error::InvalidParameters {
                reason: "w must be in 1..=32",
            });
        }
        let tables = if w <= tables::MAX_TABLE_W {
            Some(tables::initialize_exp_log(w))
        } else {
            None
        };
        Ok(Self { w, tables })
    }

    /// Returns number of elements, i.e. `2^w`.
    pub fn order(self) -> u64 {
        1u64 << self.w
    }

    /// Raises `a` to power `e`, with `0^0 == 1`.
    pub fn pow(self, a: GfElement, mut e: u64) -> GfElement {
        let mut base = a;
        let mut result = 1;
        while e != 0 {
            if e & 1 != 0 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            e >>= 1;
        }
        result
    }

    /// Returns word size in bits.
    pub fn w(self) -> usize {
        self.w
    }
}

// ======================================================================
// Field - IMPL Debug

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("w", &self.w)
            .field("tables", &self.tables.is_some())
            .finish()
    }
}

// ======================================================================
// Field - PRIVATE

impl Field {
    fn mul_shift(self, a: GfElement, b: GfElement) -> GfElement {
        let top = 1u64 << self.w;
        let poly = top | PRIMITIVE_POLYNOMIAL[self.w] as u64;
        let mut a = a as u64;
        let mut b = b as u64;
        let mut result = 0u64;
        while b != 0 {
            if b & 1 != 0 {
                result ^= a;
            }
            b >>= 1;
            a <<= 1;
            if a & top != 0 {
                a ^= poly;
            }
        }
        result as GfElement
    }
}

// ======================================================================
// FUNCTIONS - CRATE

/// Allocates `len` default values, reporting allocation failure.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, Error> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    v.resize(len, T::default());
    Ok(v)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    fn check_field_axioms(w: usize, samples: &[GfElement]) {
        let field = Field::new(w).unwrap();
        let mask = field.mask();
        for &a in samples {
            let a = a & mask;
            assert_eq!(field.mul(a, 1), a);
            assert_eq!(field.mul(a, 0), 0);
            if a != 0 {
                assert_eq!(field.mul(a, field.inv(a)), 1, "w={} a={}", w, a);
                for &b in samples {
                    let b = b & mask;
                    assert_eq!(field.mul(a, b), field.mul(b, a));
                    assert_eq!(field.div(field.mul(a, b), a), b);
                }
            }
        }
    }

    const SAMPLES: &[GfElement] = &[0, 1, 2, 3, 5, 0x53, 0xff, 0x1234, 0xdead_beef, 0xffff_ffff];

    #[test]
    fn axioms_all_word_sizes() {
        for w in 1..=MAX_W {
            check_field_axioms(w, SAMPLES);
        }
    }

    #[test]
    fn table_and_shift_multiplication_agree() {
        for w in 2..=tables::MAX_TABLE_W {
            let field = Field::new(w).unwrap();
            for &a in SAMPLES {
                for &b in SAMPLES {
                    let (a, b) = (a & field.mask(), b & field.mask());
                    assert_eq!(field.mul(a, b), field.mul_shift(a, b));
                }
            }
        }
    }

    #[test]
    fn generator_is_primitive_for_small_w() {
        for w in 2..=12 {
            let field = Field::new(w).unwrap();
            let mut x = 1;
            let mut period = 0;
            loop {
                x = field.mul_x(x);
                period += 1;
                if x == 1 {
                    break;
                }
            }
            assert_eq!(period, (1u64 << w) - 1, "w={}", w);
        }
    }

    #[test]
    fn pow() {
        let field = Field::new(8).unwrap();
        assert_eq!(field.pow(0, 0), 1);
        assert_eq!(field.pow(0, 3), 0);
        assert_eq!(field.pow(2, 8), 0x1d);
        assert_eq!(field.pow(7, 255), 1);
    }

    #[test]
    fn bit_weight_of_one_is_w() {
        for w in [1, 4, 8, 16, 32] {
            assert_eq!(Field::new(w).unwrap().bit_weight(1), w as u32);
        }
    }

    #[test]
    fn invalid_word_size() {
        assert!(Field::new(0).is_err());
        assert!(Field::new(33).is_err());
    }
}
