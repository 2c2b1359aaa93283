use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    codec::{self, Codec},
    gf::{Regions, Slot},
    CodingContext, Error, Requirement,
};

// ======================================================================
// Lrc - CRATE

/// Local Reconstruction Code.
///
/// Devices hold `f + 1` subpackets. The first `f` subpackets of all devices
/// form a Reed-Solomon code with `k` data devices. Devices are then split
/// into groups of `f + 1` consecutive devices, and in each group the
/// subpackets `(q, s)` with `q - s` equal modulo `f + 1` XOR to zero, where
/// `q` is position in group and `s` is subpacket index. Subpacket `f` of
/// each device is the local parity of its class.
pub(crate) struct Lrc;

impl Codec for Lrc {
    fn encode(
        &self,
        ctx: &CodingContext,
        data: &[u8],
        devices: &mut [&mut [u8]],
        sub: usize,
    ) -> Result<(), Error> {
        let req = ctx.requirement();
        let (n, k, f) = params(req);
        let span = f * sub;

        let mut regions = codec::device_regions(devices);
        let input = regions.push(data);

        for i in 0..k {
            regions.copy(Slot::new(input, i * span), Slot::new(i, 0), span);
        }
        codec::rs_encode(ctx, &mut regions, &rs_slots(n), span);

        for i in 0..n {
            local_parity(&mut regions, f, sub, i);
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
        let (n, k, f) = params(req);
        let span = f * sub;

        let mut regions = codec::device_regions(devices);
        codec::rs_decode(ctx, &mut regions, &rs_slots(n), erased, span)?;
        for i in erased.ones() {
            local_parity(&mut regions, f, sub, i);
        }

        for i in 0..k {
            output[i * span..(i + 1) * span].copy_from_slice(regions.get(Slot::new(i, 0), span));
        }

        Ok(())
    }

    fn fragment_subpackets(&self, req: &Requirement, from: usize, to: usize) -> Result<usize, Error> {
        let group = req.d() + 1;
        if from / group == to / group {
            Ok(group)
        } else {
            Err(Error::InvalidHelper {
                helper: from,
                target: to,
            })
        }
    }

    fn repair_encode(
        &self,
        _ctx: &CodingContext,
        device: &[u8],
        _from: usize,
        _to: usize,
        _sub: usize,
        fragment: &mut [u8],
    ) -> Result<(), Error> {
        fragment.copy_from_slice(device);
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
        let (_, _, f) = params(ctx.requirement());
        let group = f + 1;
        let p = to % group;

        // fragment index of group position
        let mut by_position = vec![0; group];
        for (i, &h) in helpers.iter().enumerate() {
            by_position[h % group] = i;
        }

        let (mut regions, out) = codec::repair_regions(fragments, device);
        for s in 0..group {
            let srcs: Vec<Slot> = (1..group)
                .map(|j| {
                    Slot::new(
                        by_position[(p + j) % group],
                        ((s + j) % group) * sub,
                    )
                })
                .collect();
            regions.parity(&srcs, Slot::new(out, s * sub), sub);
        }

        debug!(to, helpers = helpers.len(), "LRC local repair");
        Ok(())
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn params(req: &Requirement) -> (usize, usize, usize) {
    (req.n(), req.k(), req.f().unwrap_or_default())
}

// Reed-Solomon symbol of device `i` is its first `f` subpackets.
fn rs_slots(n: usize) -> Vec<Slot> {
    (0..n).map(|i| Slot::new(i, 0)).collect()
}

// Sets subpacket `f` of `device` from the other devices of its group.
fn local_parity(regions: &mut Regions, f: usize, sub: usize, device: usize) {
    let group = f + 1;
    let base = device - device % group;
    let p = device % group;
    let srcs: Vec<Slot> = (0..f)
        .map(|c| Slot::new(base + (p + 1 + c) % group, c * sub))
        .collect();
    regions.parity(&srcs, Slot::new(device, f * sub), sub);
}

// ======================================================================
// TESTS
