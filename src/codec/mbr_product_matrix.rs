use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    codec::{self, message::MbrMessage, Codec},
    context::{MBR_DELTA, MBR_PARITY_ROWS, MBR_PHI},
    gf::{decode_erasures, try_zeroed, CodingMatrix, Matrix, Regions, Slot},
    CodingContext, Error,
};

// ======================================================================
// MbrProductMatrix - CRATE

/// Product-matrix MBR code.
///
/// Data fills the symmetric `d x d` message `M = [S T; T^t 0]`. Device `i`
/// stores `psi_i * M` where `psi_i` is unit row `i` for `i < k` and row
/// `i - k` of the `(n - k) x d` Cauchy matrix otherwise. Device `i < k`
/// therefore stores row `i` of `M` and entry `(t, c)` of `M` can always
/// be read from device `min(t, c)` when that is below `k`.
///
/// Helper `h` repairs `to` with `psi_h * M * psi_to^t`.
pub(crate) struct MbrProductMatrix;

impl Codec for MbrProductMatrix {
    fn encode(
        &self,
        ctx: &CodingContext,
        data: &[u8],
        devices: &mut [&mut [u8]],
        sub: usize,
    ) -> Result<(), Error> {
        let req = ctx.requirement();
        let (n, k, d) = (req.n(), req.k(), req.d());
        let message = MbrMessage::new(k, d);
        debug_assert_eq!(message.len() * sub, data.len());

        let mut regions = codec::device_regions(devices);
        let input = regions.push(data);
        let m = |r: usize, c: usize| message.index(r, c).map(|i| Slot::new(input, i * sub));

        for i in 0..k {
            for c in 0..d {
                if let Some(src) = m(i, c) {
                    regions.copy(src, Slot::new(i, c * sub), sub);
                }
            }
        }

        let parity: Vec<Slot> = (k..n).map(|i| Slot::new(i, 0)).collect();
        for c in 0..d {
            let outputs: Vec<Slot> = parity.iter().map(|s| s.add(c * sub)).collect();
            let rows = if c < k { d } else { k };
            let inputs: Vec<Slot> = (0..rows).filter_map(|r| m(r, c)).collect();
            let coding = if c < k {
                ctx.generator()
            } else {
                ctx.submatrix(MBR_PHI)
            };
            coding.encode(&mut regions, &inputs, &outputs, sub);
        }

        Ok(())
    }

    fn decode(
        &self,
        ctx: &CodingContext,
        devices: &mut [&mut [u8]],
        erased: &FixedBitSet,
        sub: usize,
        output: &mut [u8],
    ) -> Result<(), Error> {
        let req = ctx.requirement();
        let (n, k, d) = (req.n(), req.k(), req.d());
        let field = ctx.field();
        let phi = ctx.submatrix(MBR_PHI);
        let delta = ctx.submatrix(MBR_DELTA);

        let mut scratch = try_zeroed::<u8>((n - k) * sub)?;
        let mut regions = codec::device_regions(devices);
        let tmp = regions.push_mut(&mut scratch);
        let tmp_slots: Vec<Slot> = (0..n - k).map(|i| Slot::new(tmp, i * sub)).collect();

        // column `c` of M is in column `c` of systematic devices, and
        // its parity is in column `c` of the other devices
        let column = |c: usize| -> Vec<Slot> { (0..n).map(|i| Slot::new(i, c * sub)).collect() };

        // T: parity of column c >= k only depends on rows 0..k
        for c in k..d {
            decode_erasures(field, phi.matrix(), erased, &mut regions, &column(c), sub)?;
        }

        // S: remove the contribution of rows k..d, which are T^t and
        // already known, before decoding rows 0..k
        for c in 0..k {
            let slots = column(c);
            let t_row: Vec<Slot> = (k..d).map(|j| Slot::new(c, j * sub)).collect();
            delta.encode(&mut regions, &t_row, &tmp_slots, sub);
            for (i, &t) in tmp_slots.iter().enumerate() {
                regions.xor(t, slots[k + i], sub);
            }
            decode_erasures(field, phi.matrix(), erased, &mut regions, &slots, sub)?;
            for (i, &t) in tmp_slots.iter().enumerate() {
                regions.xor(t, slots[k + i], sub);
            }
        }

        let message = MbrMessage::new(k, d);
        for i in 0..k {
            let start = message.index(i, i).unwrap_or_default() * sub;
            let len = (d - i) * sub;
            output[start..start + len].copy_from_slice(regions.get(Slot::new(i, i * sub), len));
        }

        Ok(())
    }

    fn repair_encode(
        &self,
        ctx: &CodingContext,
        device: &[u8],
        _from: usize,
        to: usize,
        sub: usize,
        fragment: &mut [u8],
    ) -> Result<(), Error> {
        let k = ctx.requirement().k();
        let d = ctx.requirement().d();

        if to < k {
            fragment.copy_from_slice(&device[to * sub..(to + 1) * sub]);
            return Ok(());
        }

        let coding = ctx.row(MBR_PARITY_ROWS, to - k);
        let mut regions = Regions::new();
        let input = regions.push(device);
        let out = regions.push_mut(fragment);
        let inputs: Vec<Slot> = (0..d).map(|c| Slot::new(input, c * sub)).collect();
        coding.encode(&mut regions, &inputs, &[Slot::new(out, 0)], sub);

        Ok(())
    }

    fn repair_decode(
        &self,
        ctx: &CodingContext,
        fragments: &[&[u8]],
        helpers: &[usize],
        to: usize,
        sub: usize,
        device: &mut [u8],
    ) -> Result<(), Error> {
        let k = ctx.requirement().k();
        let d = ctx.requirement().d();
        let field = ctx.field();
        let cauchy = ctx.generator().matrix();

        let repair = Matrix::from_fn(d, d, |r, c| {
            let h = helpers[r];
            if h < k {
                (h == c) as u32
            } else {
                cauchy.get(h - k, c)
            }
        })?;
        let coding = CodingMatrix::new(field, repair.invert(field)?);

        let (mut regions, out) = codec::repair_regions(fragments, device);
        let inputs: Vec<Slot> = (0..d).map(|i| Slot::new(i, 0)).collect();
        let outputs: Vec<Slot> = (0..d).map(|c| Slot::new(out, c * sub)).collect();
        coding.encode(&mut regions, &inputs, &outputs, sub);

        debug!(to, helpers = d, "MBR product-matrix repair");
        Ok(())
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use crate::{test_util, Scheme};

    #[test]
    fn roundtrip_all_erasure_patterns() {
        test_util::roundtrip_all_erasures(Scheme::MbrProductMatrix, 6, 3, 4, 8);
        test_util::roundtrip_all_erasures(Scheme::MbrProductMatrix, 6, 3, 3, 8);
        test_util::roundtrip_all_erasures(Scheme::MbrProductMatrix, 7, 4, 6, 4);
    }

    #[test]
    fn repair_every_device() {
        test_util::repair_every_device(Scheme::MbrProductMatrix, 6, 3, 4, 8);
        test_util::repair_every_device(Scheme::MbrProductMatrix, 7, 3, 5, 16);
        test_util::repair_every_device(Scheme::MbrProductMatrix, 7, 4, 6, 4);
    }

    #[test]
    fn repair_helper_counts() {
        test_util::repair_helper_counts(Scheme::MbrProductMatrix, 6, 3, 4, 8);
        test_util::repair_helper_counts(Scheme::MbrProductMatrix, 7, 4, 4, 4);
    }

    #[test]
    fn systematic_devices_hold_message_rows() {
        let (_, data, devices) = test_util::encoded(Scheme::MbrProductMatrix, 6, 3, 4, 8, 5);
        let sub = devices[0].len() / 4;
        // row 0 of M is the first d symbols of data
        assert_eq!(devices[0], data[..4 * sub]);
        // M(1, 0) == M(0, 1)
        assert_eq!(devices[1][..sub], data[sub..2 * sub]);
    }
}
