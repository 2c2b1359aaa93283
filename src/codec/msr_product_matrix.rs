use fixedbitset::FixedBitSet;
use tracing::{debug, trace};

use crate::{
    codec::{self, message::MsrMessage, Codec},
    context::{MSR_DELTA_ROWS, MSR_PHI, MSR_PHI_DELTA, MSR_PHI_DELTA0, MSR_PHI_DELTA_ROWS},
    gf::{decode_erasures, try_zeroed, CodingMatrix, GfElement, Matrix, Regions, Slot},
    CodingContext, Error,
};

// ======================================================================
// MsrProductMatrix - CRATE

/// Product-matrix MSR code for `d >= 2k - 2`.
///
/// Device `i` stores `alpha = d - k + 1` subpackets `psi_i * M`, where
/// `psi_i = [i * phi_i, phi_i, delta_i]` is row `i` of the generator and
/// `M` is the message matrix described in [`MsrMessage`].
///
/// Encoding copies data to devices `0..k` and then decodes `M` from them,
/// so data is stored systematically.
///
/// Helper `h` repairs `to` with `psi_h * M * mu_to` where
/// `mu_to = [phi_to, delta_to]`.
pub(crate) struct MsrProductMatrix;

impl Codec for MsrProductMatrix {
    fn encode(
        &self,
        ctx: &CodingContext,
        data: &[u8],
        devices: &mut [&mut [u8]],
        sub: usize,
    ) -> Result<(), Error> {
        let req = ctx.requirement();
        let (n, k) = (req.n(), req.k());
        let span = req.alpha() * sub;

        for (i, device) in devices[..k].iter_mut().enumerate() {
            device.copy_from_slice(&data[i * span..(i + 1) * span]);
        }

        let mut parity = FixedBitSet::with_capacity(n);
        parity.insert_range(k..n);
        restore(ctx, devices, &parity, sub)
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
        let span = req.alpha() * sub;

        restore(ctx, devices, erased, sub)?;
        for (i, device) in devices[..req.k()].iter().enumerate() {
            output[i * span..(i + 1) * span].copy_from_slice(device);
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
        let alpha = ctx.requirement().alpha();
        let mu = ctx.row(MSR_PHI_DELTA_ROWS, to);

        let mut regions = Regions::new();
        let input = regions.push(device);
        let out = regions.push_mut(fragment);
        let inputs: Vec<Slot> = (0..alpha).map(|c| Slot::new(input, c * sub)).collect();
        mu.encode(&mut regions, &inputs, &[Slot::new(out, 0)], sub);

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
        let req = ctx.requirement();
        let (k, d, alpha) = (req.k(), req.d(), req.alpha());
        let h = k - 1;
        let field = ctx.field();

        // fragments are psi_helpers * (M * mu_to)
        let solve = ctx
            .generator()
            .matrix()
            .select_rows(helpers)?
            .invert(field)?;

        // psi_to * M from M * mu_to, using symmetry of S1, S2 and Z
        let combine = Matrix::from_fn(alpha, d, |i, c| {
            if i < h && c == i {
                to as GfElement
            } else {
                (c == i + h) as GfElement
            }
        })?;
        let coding = CodingMatrix::new(field, combine.multiply(&solve, field)?);

        let (mut regions, out) = codec::repair_regions(fragments, device);
        let inputs: Vec<Slot> = (0..d).map(|i| Slot::new(i, 0)).collect();
        let outputs: Vec<Slot> = (0..alpha).map(|c| Slot::new(out, c * sub)).collect();
        coding.encode(&mut regions, &inputs, &outputs, sub);

        debug!(to, helpers = d, "MSR product-matrix repair");
        Ok(())
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

// Restores `erased` devices from the others.
//
// Column `c` of a device is `psi_i * M[.., c]`. Columns `h..alpha` only
// involve T and Z and are plain systematic codes. Columns `0..h` involve
// S1 and S2, which are solved from `k` surviving devices `r_0..r_{k-1}`
// after transforming them with `Phi = [phi_{r_0}; ..; phi_{r_{h-1}}]`.
fn restore(
    ctx: &CodingContext,
    devices: &mut [&mut [u8]],
    erased: &FixedBitSet,
    sub: usize,
) -> Result<(), Error> {
    let req = ctx.requirement();
    let (n, k, d) = (req.n(), req.k(), req.d());
    let h = k - 1;
    let alpha = req.alpha();
    let field = ctx.field();

    let lost: Vec<usize> = erased.ones().collect();
    if lost.is_empty() {
        return Ok(());
    }

    let survivors: Vec<usize> = (0..n).filter(|&i| !erased[i]).take(k).collect();
    if survivors.len() < k {
        return Err(Error::TooManyErasures {
            erased: lost.len(),
            max: n - k,
        });
    }

    let message = MsrMessage::new(k, d);
    let mut message_buf = try_zeroed::<u8>(message.len() * sub)?;
    let mut scratch = try_zeroed::<u8>((2 * k * h + h * h) * sub)?;

    let mut regions = codec::device_regions(devices);
    let msg = regions.push_mut(&mut message_buf);
    let tmp = regions.push_mut(&mut scratch);

    let m = |r: usize, c: usize| message.index(r, c).map(|i| Slot::new(msg, i * sub));
    let dev = |i: usize, c: usize| Slot::new(i, c * sub);
    // P1[j] = phi_{r_j} * (lambda_{r_j} * S1 + S2), row vector
    let p1 = |j: usize, i: usize| Slot::new(tmp, (j * h + i) * sub);
    // P2[j][i] = P1[j] * phi_{r_i}^t
    let p2 = |j: usize, i: usize| Slot::new(tmp, ((k + j) * h + i) * sub);
    let x = |i: usize, j: usize| Slot::new(tmp, (2 * k * h + i * h + j) * sub);

    // T and Z
    if d > 2 * h {
        let mut unknown = FixedBitSet::with_capacity(k + n);
        unknown.insert_range(0..k);
        for &e in &lost {
            unknown.insert(k + e);
        }
        let coding = ctx.submatrix(MSR_PHI_DELTA0);
        for c in k..alpha {
            let mut slots: Vec<Slot> = (h..=2 * h).filter_map(|r| m(r, c)).collect();
            slots.extend((0..n).map(|i| dev(i, c)));
            decode_erasures(field, coding.matrix(), &unknown, &mut regions, &slots, sub)?;
        }

        let mut unknown = FixedBitSet::with_capacity(alpha + n);
        unknown.insert_range(0..k);
        for &e in &lost {
            unknown.insert(alpha + e);
        }
        let coding = ctx.submatrix(MSR_PHI_DELTA);
        let mut slots: Vec<Slot> = (h..d).filter_map(|r| m(r, h)).collect();
        slots.extend((0..n).map(|i| dev(i, h)));
        decode_erasures(field, coding.matrix(), &unknown, &mut regions, &slots, sub)?;

        trace!(columns = alpha - h, "recovered T and Z");
    }

    // P1: remove delta_{r_j} * T^t from surviving devices
    let delta_width = d - 2 * h;
    for (j, &r) in survivors.iter().enumerate() {
        if delta_width == 0 {
            for i in 0..h {
                regions.copy(dev(r, i), p1(j, i), sub);
            }
            continue;
        }
        let delta = ctx.row(MSR_DELTA_ROWS, r);
        for i in 0..h {
            let inputs: Vec<Slot> = (0..delta_width).filter_map(|z| m(h + i, h + z)).collect();
            delta.encode(&mut regions, &inputs, &[p1(j, i)], sub);
            regions.xor(dev(r, i), p1(j, i), sub);
        }
    }

    // P2
    let phi = ctx.submatrix(MSR_PHI).select_rows(&survivors[..h])?;
    for j in 0..k {
        let inputs: Vec<Slot> = (0..h).map(|i| p1(j, i)).collect();
        let outputs: Vec<Slot> = (0..h).map(|i| p2(j, i)).collect();
        phi.encode(&mut regions, &inputs, &outputs, sub);
    }

    // Off-diagonal entries of Phi*S1*Phi^t and Phi*S2*Phi^t:
    // P2[i][j] = l_i*a + b and P2[j][i] = l_j*a + b
    for i in 0..h {
        for j in i + 1..h {
            let li = survivors[i] as GfElement;
            let lj = survivors[j] as GfElement;
            let inv = field.inv(li ^ lj);
            let pair = Matrix::from_fn(2, 2, |row, col| match (row, col) {
                (0, _) => inv,
                (_, 0) => field.mul(lj, inv),
                _ => field.mul(li, inv),
            })?;
            let outputs: Vec<Slot> = [m(i, j), m(h + i, j)].into_iter().flatten().collect();
            CodingMatrix::new(field, pair).encode(
                &mut regions,
                &[p2(i, j), p2(j, i)],
                &outputs,
                sub,
            );
        }
    }

    // Diagonal entries: P2[i][i] and P2[h][i] give two equations, since
    // phi_{r_h} = A * Phi for some A with no zero entries.
    let q = phi.matrix().invert(field)?;
    let a = ctx
        .submatrix(MSR_PHI)
        .matrix()
        .select_rows(&survivors[h..k])?
        .multiply(&q, field)?;
    let lh = survivors[h] as GfElement;
    for i in 0..h {
        let li = survivors[i] as GfElement;
        let coding = Matrix::from_fn(2, 2 * h, |row, col| match row {
            0 if col < h => field.mul(lh, a.get(0, col)),
            0 => a.get(0, col - h),
            _ if col == i => li,
            _ => (col == h + i) as GfElement,
        })?;
        let mut unknown = FixedBitSet::with_capacity(2 * h + 2);
        unknown.insert(i);
        unknown.insert(h + i);
        let mut slots: Vec<Slot> = (0..2 * h).filter_map(|t| m(t, i)).collect();
        slots.push(p2(h, i));
        slots.push(p2(i, i));
        decode_erasures(field, &coding, &unknown, &mut regions, &slots, sub)?;
    }

    trace!(survivors = k, "recovered transformed S1 and S2");

    // S = Q * (Phi*S*Phi^t) * Q^t with Q = Phi^-1
    let q = CodingMatrix::new(field, q);
    for base in [0, h] {
        for i in 0..h {
            let inputs: Vec<Slot> = (0..h).filter_map(|t| m(base + i, t)).collect();
            let outputs: Vec<Slot> = (0..h).map(|t| x(i, t)).collect();
            q.encode(&mut regions, &inputs, &outputs, sub);
        }
        for j in 0..h {
            let inputs: Vec<Slot> = (0..h).map(|t| x(t, j)).collect();
            let outputs: Vec<Slot> = (0..h).filter_map(|r| m(base + r, j)).collect();
            q.encode(&mut regions, &inputs, &outputs, sub);
        }
    }

    // Columns 0..h of lost devices
    let psi = ctx.generator().select_rows(&lost)?;
    for c in 0..h {
        let inputs: Vec<Slot> = (0..d).filter_map(|r| m(r, c)).collect();
        let outputs: Vec<Slot> = lost.iter().map(|&e| dev(e, c)).collect();
        psi.encode(&mut regions, &inputs, &outputs, sub);
    }

    debug!(erased = lost.len(), sub, "MSR product-matrix restore");
    Ok(())
}

// ======================================================================
// TESTS
