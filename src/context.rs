use tracing::debug;

use crate::{
    gf::{CodingMatrix, Field, GfElement, Matrix},
    Error, Requirement, Scheme,
};

// ======================================================================
// CONST - CRATE

// MBR product-matrix submatrices
pub(crate) const MBR_PHI: usize = 0; // columns 0..k
pub(crate) const MBR_DELTA: usize = 1; // columns k..d

// MSR product-matrix submatrices, `h = k - 1`
pub(crate) const MSR_PHI_DELTA: usize = 0; // columns h..d
pub(crate) const MSR_DELTA: usize = 1; // columns 2h..d
pub(crate) const MSR_PHI: usize = 2; // columns h..2h
pub(crate) const MSR_PHI_DELTA0: usize = 3; // columns h..2h+1, only when d > 2h

// Single-row coding matrices, one per device
pub(crate) const MBR_PARITY_ROWS: usize = 0; // generator rows, device k + i
pub(crate) const MSR_PHI_DELTA_ROWS: usize = 0; // MSR_PHI_DELTA rows
pub(crate) const MSR_DELTA_ROWS: usize = 1; // MSR_DELTA rows

// ======================================================================
// CodingContext - PUBLIC

/// Coding matrices of one [`Requirement`], built once and shared read-only
/// by every encode, decode and repair.
///
/// - [`Scheme::Lrc`], [`Scheme::Src`]: `(n - k) x k` Cauchy matrix.
/// - [`Scheme::MbrRepairByTransfer`]: `(inner_n - inner_k) x inner_k`
///   Cauchy matrix.
/// - [`Scheme::MbrProductMatrix`]: `(n - k) x d` Cauchy matrix, which is
///   the non-systematic part of the `n x d` encoding matrix, and its
///   first `k` and last `d - k` columns.
/// - [`Scheme::MsrProductMatrix`]: `n x d` encoding matrix where row `i`
///   is `[i*phi_i, phi_i, delta_i]` with `phi_i = [1, i^2, .., i^(2k-4)]`
///   and `delta_i = [i^(2k-2), .., i^(d-1)]`, together with its column
///   slices `[phi delta]`, `delta`, `phi` and `[phi delta_0]`.
///
/// Product-matrix schemes also keep every row used alone during repair
/// and decode as its own scheduled [`CodingMatrix`].
#[derive(Clone, Debug)]
pub struct CodingContext {
    requirement: Requirement,
    field: Field,
    generator: CodingMatrix,
    submatrices: Vec<CodingMatrix>,
    rows: Vec<Vec<CodingMatrix>>,
}

impl CodingContext {
    /// Returns field.
    pub fn field(&self) -> Field {
        self.field
    }

    /// Returns main coding matrix.
    pub fn generator(&self) -> &CodingMatrix {
        &self.generator
    }

    /// Builds all coding matrices of `requirement`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if allocation fails.
    pub fn new(requirement: Requirement) -> Result<Self, Error> {
        let field = Field::new(requirement.w())?;
        let n = requirement.n();
        let k = requirement.k();
        let d = requirement.d();

        let (generator, submatrices) = match requirement.scheme() {
            Scheme::Lrc | Scheme::Src => (Matrix::cauchy(field, n - k, k)?, Vec::new()),

            Scheme::MbrRepairByTransfer => {
                let (inner_n, inner_k) = requirement.inner().unwrap_or_default();
                (
                    Matrix::cauchy(field, inner_n - inner_k, inner_k)?,
                    Vec::new(),
                )
            }

            Scheme::MbrProductMatrix => {
                let m = Matrix::cauchy(field, n - k, d)?;
                let subs = vec![m.columns(0..k)?, m.columns(k..d)?];
                (m, subs)
            }

            Scheme::MsrProductMatrix => {
                let h = k - 1;
                let m = msr_generator(field, n, k, d)?;
                let mut subs = vec![m.columns(h..d)?, m.columns(2 * h..d)?, m.columns(h..2 * h)?];
                if d > 2 * h {
                    subs.push(m.columns(h..2 * h + 1)?);
                }
                (m, subs)
            }
        };

        let rows = match requirement.scheme() {
            Scheme::MbrProductMatrix => vec![split_rows(field, &generator)?],
            Scheme::MsrProductMatrix => vec![
                split_rows(field, &submatrices[MSR_PHI_DELTA])?,
                split_rows(field, &submatrices[MSR_DELTA])?,
            ],
            _ => Vec::new(),
        };

        let context = Self {
            requirement,
            field,
            generator: CodingMatrix::new(field, generator),
            submatrices: submatrices
                .into_iter()
                .map(|m| CodingMatrix::new(field, m))
                .collect(),
            rows,
        };

        debug!(
            scheme = %requirement.scheme(),
            n,
            k,
            d,
            w = requirement.w(),
            multiple_of = requirement.multiple_of(),
            xors = context.generator.schedule().xor_count(),
            "built coding context"
        );

        Ok(context)
    }

    /// Returns requirement this context was built for.
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Returns derived column slices of the main coding matrix.
    pub fn submatrices(&self) -> &[CodingMatrix] {
        &self.submatrices
    }
}

// ======================================================================
// CodingContext - CRATE

impl CodingContext {
    // Row `row` of row set `set`, see `MBR_PARITY_ROWS` and `MSR_*_ROWS`.
    pub(crate) fn row(&self, set: usize, row: usize) -> &CodingMatrix {
        &self.rows[set][row]
    }

    pub(crate) fn submatrix(&self, index: usize) -> &CodingMatrix {
        &self.submatrices[index]
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

// Column exponents are {1, 3, .., 2h-1}, {0, 2, .., 2h-2}, {2h, .., d-1},
// so any `d` rows form a permuted Vandermonde matrix.
fn msr_generator(field: Field, n: usize, k: usize, d: usize) -> Result<Matrix, Error> {
    let h = k - 1;
    Matrix::from_fn(n, d, |i, j| {
        let exponent = if j < h {
            2 * j + 1
        } else if j < 2 * h {
            2 * (j - h)
        } else {
            j
        };
        field.pow(i as GfElement, exponent as u64)
    })
}

fn split_rows(field: Field, matrix: &Matrix) -> Result<Vec<CodingMatrix>, Error> {
    (0..matrix.rows())
        .map(|r| matrix.select_rows(&[r]).map(|m| CodingMatrix::new(field, m)))
        .collect()
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_is_deterministic() {
        let req = Requirement::new(Scheme::MbrProductMatrix, 7, 3, 5, 8).unwrap();
        let a = CodingContext::new(req).unwrap();
        let b = CodingContext::new(req).unwrap();
        assert_eq!(a.generator().matrix(), b.generator().matrix());
        assert_eq!(a.generator().schedule(), b.generator().schedule());
    }

    #[test]
    fn msr_row_zero_is_unit() {
        let req = Requirement::new(Scheme::MsrProductMatrix, 6, 3, 5, 8).unwrap();
        let ctx = CodingContext::new(req).unwrap();
        assert_eq!(ctx.generator().matrix().row(0), &[0, 0, 1, 0, 0]);
        assert_eq!(ctx.submatrices().len(), 4);
    }

    #[test]
    fn msr_rows_are_independent() {
        let req = Requirement::new(Scheme::MsrProductMatrix, 7, 4, 6, 8).unwrap();
        let ctx = CodingContext::new(req).unwrap();
        let g = ctx.generator().matrix();
        for rows in [[0, 1, 2, 3, 4, 5], [1, 2, 3, 4, 5, 6], [0, 2, 3, 4, 5, 6]] {
            assert!(g.select_rows(&rows).unwrap().invert(ctx.field()).is_ok());
        }
        // d == 2k - 2 has no delta_0 column
        assert_eq!(ctx.submatrices().len(), 3);
    }

    #[test]
    fn submatrix_shapes() {
        let req = Requirement::new(Scheme::MbrProductMatrix, 7, 3, 5, 8).unwrap();
        let ctx = CodingContext::new(req).unwrap();
        assert_eq!(ctx.submatrix(MBR_PHI).matrix().cols(), 3);
        assert_eq!(ctx.submatrix(MBR_DELTA).matrix().cols(), 2);
        assert_eq!(ctx.submatrix(MBR_DELTA).matrix().rows(), 4);
    }

    #[test]
    fn cached_rows_match_their_matrix() {
        let req = Requirement::new(Scheme::MbrProductMatrix, 7, 3, 5, 8).unwrap();
        let ctx = CodingContext::new(req).unwrap();
        for i in 0..4 {
            let row = ctx.row(MBR_PARITY_ROWS, i);
            assert_eq!(row.matrix().row(0), ctx.generator().matrix().row(i));
            assert_eq!(row.schedule(), ctx.generator().select_rows(&[i]).unwrap().schedule());
        }

        let req = Requirement::new(Scheme::MsrProductMatrix, 6, 3, 5, 8).unwrap();
        let ctx = CodingContext::new(req).unwrap();
        for i in 0..6 {
            let mu = ctx.submatrix(MSR_PHI_DELTA).matrix();
            assert_eq!(ctx.row(MSR_PHI_DELTA_ROWS, i).matrix().row(0), mu.row(i));
            let delta = ctx.submatrix(MSR_DELTA).matrix();
            assert_eq!(ctx.row(MSR_DELTA_ROWS, i).matrix().row(0), delta.row(i));
        }
    }
}
