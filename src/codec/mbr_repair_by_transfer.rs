use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    codec::{self, Codec},
    gf::Slot,
    CodingContext, Error,
};

// ======================================================================
// MbrRepairByTransfer - CRATE

/// Exact repair-by-transfer MBR code with `d = n - 1`.
///
/// Devices are vertices of a complete graph. Each of the `n(n-1)/2` edges
/// carries one symbol of an `(inner_n, inner_k)` Reed-Solomon code, and both
/// endpoint devices store it, so every device holds `n - 1` subpackets and
/// shares exactly one with each other device.
///
/// Edge `(a, b)`, `a < b`, is symbol `a(n-1) - a(a-1)/2 + (b-a-1)`, stored in
/// row `b - 1` of device `a` and row `a` of device `b`.
pub(crate) struct MbrRepairByTransfer;

impl Codec for MbrRepairByTransfer {
    fn encode(
        &self,
        ctx: &CodingContext,
        data: &[u8],
        devices: &mut [&mut [u8]],
        sub: usize,
    ) -> Result<(), Error> {
        let n = ctx.requirement().n();
        let edges = edges(n);
        let inner_k = ctx.generator().matrix().cols();

        let mut regions = codec::device_regions(devices);
        let input = regions.push(data);

        let slots: Vec<Slot> = edges.iter().map(|&(a, b)| slot(a, b, sub)).collect();
        for (s, &home) in slots[..inner_k].iter().enumerate() {
            regions.copy(Slot::new(input, s * sub), home, sub);
        }
        codec::rs_encode(ctx, &mut regions, &slots, sub);

        for &(a, b) in &edges {
            regions.copy(slot(a, b, sub), slot(b, a, sub), sub);
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
        let n = ctx.requirement().n();
        let edges = edges(n);
        let inner_k = ctx.generator().matrix().cols();

        let mut regions = codec::device_regions(devices);

        // Symbols whose both endpoints are lost are the only real erasures,
        // a symbol with one surviving endpoint is copied from it.
        let mut lost = FixedBitSet::with_capacity(edges.len());
        for (s, &(a, b)) in edges.iter().enumerate() {
            match (erased[a], erased[b]) {
                (true, true) => lost.insert(s),
                (true, false) => regions.copy(slot(b, a, sub), slot(a, b, sub), sub),
                _ => {}
            }
        }

        debug!(
            devices = erased.count_ones(..),
            symbols = lost.count_ones(..),
            "repair-by-transfer decode"
        );

        let slots: Vec<Slot> = edges.iter().map(|&(a, b)| slot(a, b, sub)).collect();
        codec::rs_decode(ctx, &mut regions, &slots, &lost, sub)?;

        for &(a, b) in &edges {
            if erased[b] {
                regions.copy(slot(a, b, sub), slot(b, a, sub), sub);
            }
        }

        for (s, &home) in slots[..inner_k].iter().enumerate() {
            output[s * sub..(s + 1) * sub].copy_from_slice(regions.get(home, sub));
        }

        Ok(())
    }

    fn repair_encode(
        &self,
        _ctx: &CodingContext,
        device: &[u8],
        from: usize,
        to: usize,
        sub: usize,
        fragment: &mut [u8],
    ) -> Result<(), Error> {
        let r = row(from, to);
        fragment.copy_from_slice(&device[r * sub..(r + 1) * sub]);
        Ok(())
    }

    fn repair_decode(
        &self,
        _ctx: &CodingContext,
        fragments: &[&[u8]],
        helpers: &[usize],
        to: usize,
        sub: usize,
        device: &mut [u8],
    ) -> Result<(), Error> {
        for (&h, fragment) in helpers.iter().zip(fragments) {
            let r = row(to, h);
            device[r * sub..(r + 1) * sub].copy_from_slice(fragment);
        }
        Ok(())
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

// Edges `(a, b)`, `a < b`, in symbol order.
fn edges(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
        .collect()
}

// Row of `device` holding the symbol shared with `partner`.
fn row(device: usize, partner: usize) -> usize {
    if partner < device {
        partner
    } else {
        partner - 1
    }
}

fn slot(device: usize, partner: usize, sub: usize) -> Slot {
    Slot::new(device, row(device, partner) * sub)
}

// ======================================================================
// TESTS
