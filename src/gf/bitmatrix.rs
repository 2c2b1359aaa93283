use fixedbitset::FixedBitSet;

use crate::gf::{Field, Matrix};

// ======================================================================
// Bitmatrix - PUBLIC

/// Binary expansion of a [`Matrix`].
///
/// Element `e` at `(i, j)` becomes a `w x w` block where
/// bit `(i * w + l, j * w + x)` is bit `l` of `e * 2^x`.
/// Bit-row `i * w + l` therefore says which input packets
/// are XORed into packet `l` of output symbol `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmatrix {
    w: usize,
    rows: usize,
    cols: usize,
    bits: Vec<FixedBitSet>,
}

impl Bitmatrix {
    /// Returns bit-row `r`, of length `cols * w`.
    pub fn bit_row(&self, r: usize) -> &FixedBitSet {
        &self.bits[r]
    }

    /// Returns number of symbol columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Expands `matrix` over `field`.
    pub fn from_matrix(matrix: &Matrix, field: Field) -> Self {
        let w = field.w();
        let rows = matrix.rows();
        let cols = matrix.cols();

        let mut bits = vec![FixedBitSet::with_capacity(cols * w); rows * w];
        for i in 0..rows {
            for j in 0..cols {
                let mut e = matrix.get(i, j);
                for x in 0..w {
                    for (l, row) in bits[i * w..(i + 1) * w].iter_mut().enumerate() {
                        if (e >> l) & 1 != 0 {
                            row.insert(j * w + x);
                        }
                    }
                    e = field.mul_x(e);
                }
            }
        }

        Self {
            w,
            rows,
            cols,
            bits,
        }
    }

    /// Returns total number of ones.
    pub fn ones(&self) -> usize {
        self.bits.iter().map(|row| row.count_ones(..)).sum()
    }

    /// Returns number of symbol rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns word size.
    pub fn w(&self) -> usize {
        self.w
    }
}

// ======================================================================
// TESTS
