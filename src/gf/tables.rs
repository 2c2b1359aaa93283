//! Lookup-tables used by [`Field`] for small word sizes.
//!
//! All tables are global and each is initialized at most once,
//! on first use of the corresponding word size.
//!
//! | `w`  | [`ExpLog`] size |
//! | ---- | --------------- |
//! | 8    | 3 kiB           |
//! | 16   | 768 kiB         |
//!
//! [`Field`]: crate::gf::Field

use once_cell::sync::OnceCell;

use crate::gf::{GfElement, PRIMITIVE_POLYNOMIAL};

// ======================================================================
// CONST - PUBLIC

/// Largest word size which uses [`ExpLog`] tables.
pub const MAX_TABLE_W: usize = 16;

// ======================================================================
// ExpLog - PUBLIC

/// Exponential and logarithm tables of one field.
pub struct ExpLog {
    /// `exp[i] = x^i`, stored twice over so that
    /// a sum of two logarithms needs no reduction.
    pub exp: Box<[GfElement]>,
    /// `log[x^i] = i`, with `log[0]` unused.
    pub log: Box<[GfElement]>,
}

// ======================================================================
// STATIC - PRIVATE

#[allow(clippy::declare_interior_mutable_const)]
const UNINITIALIZED: OnceCell<ExpLog> = OnceCell::new();

static EXP_LOG: [OnceCell<ExpLog>; MAX_TABLE_W + 1] = [UNINITIALIZED; MAX_TABLE_W + 1];

// ======================================================================
// FUNCTIONS - PUBLIC

/// Initializes and returns [`ExpLog`] tables of `GF(2^w)`.
///
/// # Panics
///
/// If `w` is `0` or larger than [`MAX_TABLE_W`].
pub fn initialize_exp_log(w: usize) -> &'static ExpLog {
    assert!(w > 0 && w <= MAX_TABLE_W);

    EXP_LOG[w].get_or_init(|| {
        let order = 1usize << w;
        let modulus = order - 1;

        let mut exp = vec![0; 2 * modulus].into_boxed_slice();
        let mut log = vec![0; order].into_boxed_slice();

        let mut x = 1usize;
        for i in 0..modulus {
            exp[i] = x as GfElement;
            exp[i + modulus] = x as GfElement;
            log[x] = i as GfElement;

            x <<= 1;
            if x & order != 0 {
                x = (x ^ order) ^ PRIMITIVE_POLYNOMIAL[w] as usize;
            }
        }

        ExpLog { exp, log }
    })
}

// ======================================================================
// TESTS
