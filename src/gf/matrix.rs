use std::ops::Range;

use crate::{
    gf::{try_zeroed, Field, GfElement},
    Error,
};

// ======================================================================
// Matrix - PUBLIC

/// Dense row-major matrix over `GF(2^w)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<GfElement>,
}

impl Matrix {
    /// Creates "good" Cauchy matrix with `rows` rows and `cols` columns.
    ///
    /// Starts from `1 / (i + (rows + j))` and then scales columns so that
    /// row `0` is all ones, and every other row by the inverse of the
    /// element which leaves that row with fewest bitmatrix ones.
    /// Every square submatrix is invertible.
    ///
    /// Requires `rows + cols <= 2^w`.
    pub fn cauchy(field: Field, rows: usize, cols: usize) -> Result<Self, Error> {
        if (rows + cols) as u64 > field.order() {
            return Err(Error::InvalidParameters {
                reason: "Cauchy matrix needs rows + cols <= 2^w",
            });
        }

        let mut m = Self::from_fn(rows, cols, |i, j| {
            field.inv(field.add(i as GfElement, (rows + j) as GfElement))
        })?;

        if rows == 0 {
            return Ok(m);
        }

        for j in 0..cols {
            let e = m.get(0, j);
            if e != 1 {
                let scale = field.inv(e);
                for i in 0..rows {
                    m.set(i, j, field.mul(m.get(i, j), scale));
                }
            }
        }

        for i in 1..rows {
            let mut best: u32 = m.row(i).iter().map(|&e| field.bit_weight(e)).sum();
            let mut best_scale = None;
            for j in 0..cols {
                let e = m.get(i, j);
                if e != 1 {
                    let scale = field.inv(e);
                    let ones: u32 = m
                        .row(i)
                        .iter()
                        .map(|&x| field.bit_weight(field.mul(x, scale)))
                        .sum();
                    if ones < best {
                        best = ones;
                        best_scale = Some(scale);
                    }
                }
            }
            if let Some(scale) = best_scale {
                for j in 0..cols {
                    m.set(i, j, field.mul(m.get(i, j), scale));
                }
            }
        }

        Ok(m)
    }

    /// Returns number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns copy of columns in `range`.
    pub fn columns(&self, range: Range<usize>) -> Result<Self, Error> {
        assert!(range.end <= self.cols);
        let start = range.start;
        Self::from_fn(self.rows, range.len(), |i, j| self.get(i, start + j))
    }

    /// Creates matrix with element `(i, j)` given by `f(i, j)`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Result<Self, Error>
    where
        F: FnMut(usize, usize) -> GfElement,
    {
        let mut m = Self::zero(rows, cols)?;
        for i in 0..rows {
            for j in 0..cols {
                m.data[i * cols + j] = f(i, j);
            }
        }
        Ok(m)
    }

    /// Returns element at row `i`, column `j`.
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> GfElement {
        self.data[i * self.cols + j]
    }

    /// Creates `n x n` identity matrix.
    pub fn identity(n: usize) -> Result<Self, Error> {
        Self::from_fn(n, n, |i, j| (i == j) as GfElement)
    }

    /// Returns inverse of this square matrix.
    ///
    /// # Errors
    ///
    /// [`Error::SingularMatrix`] if this matrix is not invertible.
    pub fn invert(&self, field: Field) -> Result<Self, Error> {
        assert_eq!(self.rows, self.cols);
        let n = self.rows;

        let mut a = self.clone();
        let mut inv = Self::identity(n)?;

        for col in 0..n {
            let pivot = (col..n)
                .find(|&r| a.get(r, col) != 0)
                .ok_or(Error::SingularMatrix)?;
            if pivot != col {
                a.swap_rows(pivot, col);
                inv.swap_rows(pivot, col);
            }

            let p = a.get(col, col);
            if p != 1 {
                let scale = field.inv(p);
                a.scale_row(col, scale, field);
                inv.scale_row(col, scale, field);
            }

            for r in 0..n {
                let factor = a.get(r, col);
                if r != col && factor != 0 {
                    a.add_scaled_row(col, r, factor, field);
                    inv.add_scaled_row(col, r, factor, field);
                }
            }
        }

        Ok(inv)
    }

    /// Returns `self * other`.
    pub fn multiply(&self, other: &Self, field: Field) -> Result<Self, Error> {
        assert_eq!(self.cols, other.rows);
        Self::from_fn(self.rows, other.cols, |i, j| {
            (0..self.cols).fold(0, |acc, t| {
                field.add(acc, field.mul(self.get(i, t), other.get(t, j)))
            })
        })
    }

    /// Returns row `i`.
    pub fn row(&self, i: usize) -> &[GfElement] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Returns number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns matrix made of given rows, in given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self, Error> {
        Self::from_fn(rows.len(), self.cols, |i, j| self.get(rows[i], j))
    }

    /// Sets element at row `i`, column `j`.
    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, value: GfElement) {
        self.data[i * self.cols + j] = value;
    }

    /// Creates `rows x cols` matrix of zeros.
    pub fn zero(rows: usize, cols: usize) -> Result<Self, Error> {
        let len = rows.checked_mul(cols).ok_or(Error::OutOfMemory)?;
        Ok(Self {
            rows,
            cols,
            data: try_zeroed(len)?,
        })
    }
}

// ======================================================================
// Matrix - PRIVATE

impl Matrix {
    // row[dst] += factor * row[src]
    fn add_scaled_row(&mut self, src: usize, dst: usize, factor: GfElement, field: Field) {
        for j in 0..self.cols {
            let x = field.mul(factor, self.get(src, j));
            self.data[dst * self.cols + j] ^= x;
        }
    }

    fn scale_row(&mut self, i: usize, factor: GfElement, field: Field) {
        for x in &mut self.data[i * self.cols..(i + 1) * self.cols] {
            *x = field.mul(*x, factor);
        }
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }
}

// ======================================================================
// TESTS
