//! Message matrix layouts of the product-matrix codes.
//!
//! A message matrix is never materialized. Each independent symbol has one
//! index into a flat buffer, and `index(r, c)` maps matrix positions to it,
//! folding symmetric positions onto the same index. `None` is a structural
//! zero.

// ======================================================================
// MbrMessage - CRATE

/// `d x d` symmetric matrix `[S T; T^t 0]`, `S` is `k x k`.
///
/// Symbols are stored row by row from the upper triangle of the first `k`
/// rows, so row `i` of the message is contiguous from `index(i, i)`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MbrMessage {
    k: usize,
    d: usize,
}

impl MbrMessage {
    pub(crate) fn index(&self, r: usize, c: usize) -> Option<usize> {
        let (i, j) = (r.min(c), r.max(c));
        if i >= self.k {
            None
        } else {
            Some(i * self.d - i * (i + 1) / 2 + j)
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.k * self.d - self.k * (self.k - 1) / 2
    }

    pub(crate) fn new(k: usize, d: usize) -> Self {
        Self { k, d }
    }
}

// ======================================================================
// MsrMessage - CRATE

/// `d x alpha` matrix of the MSR code, `h = k - 1`, `alpha = d - h`:
///
/// ```text
/// [ S1  0 ]   rows 0..h        S1 symmetric h x h
/// [ S2  T ]   rows h..2h       S2 symmetric h x h, T is h x (alpha - h)
/// [ T^t Z ]   rows 2h..d       Z symmetric, nonzero only in row/column 0
/// ```
#[derive(Clone, Copy, Debug)]
pub(crate) struct MsrMessage {
    h: usize,
    alpha: usize,
}

impl MsrMessage {
    pub(crate) fn index(&self, r: usize, c: usize) -> Option<usize> {
        let h = self.h;
        if r < h {
            if c >= h {
                None
            } else {
                Some(self.s1(r.min(c), r.max(c)))
            }
        } else if r < 2 * h {
            let i = r - h;
            if c < h {
                Some(self.s2t(i.min(c), i.max(c)))
            } else {
                Some(self.s2t(i, c))
            }
        } else {
            let z = r - 2 * h;
            if c < h {
                Some(self.s2t(c, h + z))
            } else if z == 0 {
                Some(self.z(c - h))
            } else if c == h {
                Some(self.z(z))
            } else {
                None
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        (self.h + 1) * self.alpha
    }

    pub(crate) fn new(k: usize, d: usize) -> Self {
        Self {
            h: k - 1,
            alpha: d - k + 1,
        }
    }
}

// ======================================================================
// MsrMessage - PRIVATE

impl MsrMessage {
    // S1 upper triangle, `i <= j < h`
    fn s1(&self, i: usize, j: usize) -> usize {
        i * self.h - i * (i + 1) / 2 + j
    }

    // [S2 T] upper triangle, `i < h`, `i <= j < alpha`
    fn s2t(&self, i: usize, j: usize) -> usize {
        self.h * (self.h + 1) / 2 + i * self.alpha - i * (i + 1) / 2 + j
    }

    // first row of Z
    fn z(&self, j: usize) -> usize {
        self.h * self.alpha + self.h + j
    }
}

// ======================================================================
// TESTS
