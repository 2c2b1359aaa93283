use fixedbitset::FixedBitSet;

use crate::{
    gf::{CodingMatrix, Field, Matrix, Regions, Slot},
    Error,
};

// ======================================================================
// FUNCTIONS - PUBLIC

/// Restores erased symbols of systematic code `[I; coding]`.
///
/// - `coding` is an `m x k` matrix.
/// - `slots` has `k + m` entries: `k` data symbols followed by `m` coding
///   symbols, each `size` bytes.
/// - `erased` has `k + m` bits and at most `m` of them set.
///
/// Erased data symbols are solved from the first `k` surviving symbols,
/// then erased coding symbols are re-encoded from the completed data.
///
/// # Errors
///
/// - [`Error::TooManyErasures`] if more than `m` symbols are erased.
/// - [`Error::SingularMatrix`] if surviving rows are not independent.
pub fn decode_erasures(
    field: Field,
    coding: &Matrix,
    erased: &FixedBitSet,
    regions: &mut Regions,
    slots: &[Slot],
    size: usize,
) -> Result<(), Error> {
    let k = coding.cols();
    let m = coding.rows();
    assert_eq!(slots.len(), k + m);
    assert_eq!(erased.len(), k + m);

    let erased_count = erased.count_ones(..);
    if erased_count > m {
        return Err(Error::TooManyErasures {
            erased: erased_count,
            max: m,
        });
    }
    if erased_count == 0 {
        return Ok(());
    }

    let erased_data: Vec<usize> = erased.ones().take_while(|&i| i < k).collect();
    if !erased_data.is_empty() {
        let survivors: Vec<usize> = (0..k + m).filter(|&i| !erased[i]).take(k).collect();

        let decoding = Matrix::from_fn(k, k, |r, c| {
            let s = survivors[r];
            if s < k {
                (s == c) as u32
            } else {
                coding.get(s - k, c)
            }
        })?
        .invert(field)?;

        let inputs: Vec<Slot> = survivors.iter().map(|&s| slots[s]).collect();
        let outputs: Vec<Slot> = erased_data.iter().map(|&i| slots[i]).collect();
        CodingMatrix::new(field, decoding.select_rows(&erased_data)?)
            .encode(regions, &inputs, &outputs, size);
    }

    let erased_coding: Vec<usize> = erased.ones().skip_while(|&i| i < k).map(|i| i - k).collect();
    if !erased_coding.is_empty() {
        let outputs: Vec<Slot> = erased_coding.iter().map(|&i| slots[k + i]).collect();
        CodingMatrix::new(field, coding.select_rows(&erased_coding)?)
            .encode(regions, &slots[..k], &outputs, size);
    }

    Ok(())
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    fn roundtrip(k: usize, m: usize, erasures: &[usize]) {
        let field = Field::new(8).unwrap();
        let coding = Matrix::cauchy(field, m, k).unwrap();
        let size = 8 * 64;

        let mut symbols = test_util::generate_original(k + m, size, 7);
        {
            let mut regions = Regions::new();
            let slots: Vec<_> = symbols
                .iter_mut()
                .map(|s| Slot::new(regions.push_mut(s), 0))
                .collect();
            CodingMatrix::new(field, coding.clone()).encode(
                &mut regions,
                &slots[..k],
                &slots[k..],
                size,
            );
        }
        let expected = symbols.clone();

        let mut erased = FixedBitSet::with_capacity(k + m);
        for &e in erasures {
            erased.insert(e);
            symbols[e].fill(0);
        }

        let mut regions = Regions::new();
        let slots: Vec<_> = symbols
            .iter_mut()
            .map(|s| Slot::new(regions.push_mut(s), 0))
            .collect();
        decode_erasures(field, &coding, &erased, &mut regions, &slots, size).unwrap();
        drop(regions);

        assert_eq!(symbols, expected);
    }

    #[test]
    fn data_erasures() {
        roundtrip(4, 2, &[0, 3]);
    }

    #[test]
    fn coding_erasures() {
        roundtrip(4, 2, &[4, 5]);
    }

    #[test]
    fn mixed_erasures() {
        roundtrip(3, 3, &[1, 4, 2]);
    }

    #[test]
    fn too_many_erasures() {
        let field = Field::new(8).unwrap();
        let coding = Matrix::cauchy(field, 1, 2).unwrap();
        let mut erased = FixedBitSet::with_capacity(3);
        erased.insert(0);
        erased.insert(1);
        let mut regions = Regions::new();
        let slots = [Slot::new(0, 0); 3];
        assert_eq!(
            decode_erasures(field, &coding, &erased, &mut regions, &slots, 8),
            Err(Error::TooManyErasures { erased: 2, max: 1 })
        );
    }
}
