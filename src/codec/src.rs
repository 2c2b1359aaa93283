use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    codec::{self, Codec},
    gf::{Regions, Slot},
    CodingContext, Error, Requirement,
};

// ======================================================================
// Src - CRATE

/// Simple Regenerating Code.
///
/// Like [`Lrc`] but local groups overlap: subpacket `(q, s)` belongs to
/// group `q - s (mod n)`, so group `i` is subpacket `j` of device `i + j`
/// for `j <= f`, and subpacket `f` of device `i + f` is its parity.
/// A lost device is rebuilt from the `f` devices on either side of it.
///
/// [`Lrc`]: crate::codec::Lrc
pub(crate) struct Src;

impl Codec for Src {
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

        for device in 0..n {
            group_parity(&mut regions, n, f, sub, device);
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
        for device in erased.ones() {
            group_parity(&mut regions, n, f, sub, device);
        }

        for i in 0..k {
            output[i * span..(i + 1) * span].copy_from_slice(regions.get(Slot::new(i, 0), span));
        }

        Ok(())
    }

    fn fragment_subpackets(&self, req: &Requirement, from: usize, to: usize) -> Result<usize, Error> {
        let (n, _, f) = params(req);
        let (ahead, behind) = fragment_parts(n, f, from, to);
        if ahead + behind == 0 {
            Err(Error::InvalidHelper {
                helper: from,
                target: to,
            })
        } else {
            Ok(ahead + behind)
        }
    }

    fn repair_encode(
        &self,
        ctx: &CodingContext,
        device: &[u8],
        from: usize,
        to: usize,
        sub: usize,
        fragment: &mut [u8],
    ) -> Result<(), Error> {
        let (n, _, f) = params(ctx.requirement());
        let (ahead, behind) = fragment_parts(n, f, from, to);

        // `from` is ahead of `to`: it shares groups through subpackets f+1-ahead..=f
        let first = f + 1 - ahead;
        fragment[..ahead * sub].copy_from_slice(&device[first * sub..(f + 1) * sub]);
        // `from` is behind `to`: subpackets 0..behind
        fragment[ahead * sub..].copy_from_slice(&device[..behind * sub]);

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
        let (n, _, f) = params(ctx.requirement());

        // srcs[s] collects the other members of the group holding subpacket s
        let mut srcs: Vec<Vec<Slot>> = vec![Vec::with_capacity(f); f + 1];
        for (i, &h) in helpers.iter().enumerate() {
            let a = (h + n - to) % n;
            let b = (to + n - h) % n;
            let (ahead, _) = fragment_parts(n, f, h, to);
            if a <= f {
                // subpacket s of `to` pairs with subpacket s + a of `h`
                for s in 0..=f - a {
                    srcs[s].push(Slot::new(i, s * sub));
                }
            }
            if b <= f {
                // subpacket s of `to` pairs with subpacket s - b of `h`
                for s in b..=f {
                    srcs[s].push(Slot::new(i, (ahead + s - b) * sub));
                }
            }
        }

        let (mut regions, out) = codec::repair_regions(fragments, device);
        for (s, srcs) in srcs.iter().enumerate() {
            debug_assert_eq!(srcs.len(), f);
            regions.parity(srcs, Slot::new(out, s * sub), sub);
        }

        debug!(to, helpers = helpers.len(), "SRC ring repair");
        Ok(())
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

// Returns number of subpackets `from` sends to `to` because it is ahead of
// `to` on the ring (first) and because it is behind it (second).
fn fragment_parts(n: usize, f: usize, from: usize, to: usize) -> (usize, usize) {
    let a = (from + n - to) % n;
    let b = (to + n - from) % n;
    let ahead = if a >= 1 && a <= f { f + 1 - a } else { 0 };
    let behind = if b >= 1 && b <= f { f + 1 - b } else { 0 };
    (ahead, behind)
}

// Sets subpacket `f` of `device` from the `f` devices before it.
fn group_parity(regions: &mut Regions, n: usize, f: usize, sub: usize, device: usize) {
    let first = (device + n - f) % n;
    let srcs: Vec<Slot> = (0..f)
        .map(|j| Slot::new((first + j) % n, j * sub))
        .collect();
    regions.parity(&srcs, Slot::new(device, f * sub), sub);
}

fn params(req: &Requirement) -> (usize, usize, usize) {
    (req.n(), req.k(), req.f().unwrap_or_default())
}

fn rs_slots(n: usize) -> Vec<Slot> {
    (0..n).map(|i| Slot::new(i, 0)).collect()
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_util, Scheme};

    #[test]
    fn roundtrip_all_erasure_patterns() {
        test_util::roundtrip_all_erasures(Scheme::Src, 6, 3, 2, 8);
        test_util::roundtrip_all_erasures(Scheme::Src, 7, 4, 1, 8);
        test_util::roundtrip_all_erasures(Scheme::Src, 5, 3, 3, 4);
    }

    #[test]
    fn repair_every_device() {
        test_util::repair_every_device(Scheme::Src, 6, 3, 2, 8);
        test_util::repair_every_device(Scheme::Src, 7, 4, 1, 8);
        // 2f >= n: helpers are both ahead of and behind the target
        test_util::repair_every_device(Scheme::Src, 5, 3, 3, 4);
        test_util::repair_every_device(Scheme::Src, 4, 3, 2, 8);
    }

    #[test]
    fn repair_helper_counts() {
        test_util::repair_helper_counts(Scheme::Src, 6, 3, 2, 8);
        test_util::repair_helper_counts(Scheme::Src, 7, 4, 1, 8);
        test_util::repair_helper_counts(Scheme::Src, 4, 3, 2, 8);
    }

    #[test]
    fn helpers_beyond_ring_distance_are_skipped() {
        let (code, _, devices) = test_util::encoded(Scheme::Src, 12, 8, 2, 8, 6);
        let helpers: Vec<usize> = (1..12).collect();
        assert_eq!(code.repair(&devices, &helpers, 0).unwrap(), devices[0]);
        assert_eq!(
            code.repair(&devices, &[1, 2, 11, 5], 0),
            Err(Error::InsufficientHelpers { needed: 4, got: 3 })
        );
    }

    #[test]
    fn fragment_sizes_depend_on_distance() {
        let req = Requirement::new(Scheme::Src, 8, 4, 2, 8).unwrap();
        assert_eq!(Src.fragment_subpackets(&req, 1, 0), Ok(2));
        assert_eq!(Src.fragment_subpackets(&req, 2, 0), Ok(1));
        assert_eq!(Src.fragment_subpackets(&req, 7, 0), Ok(2));
        assert_eq!(Src.fragment_subpackets(&req, 6, 0), Ok(1));
        assert_eq!(
            Src.fragment_subpackets(&req, 4, 0),
            Err(Error::InvalidHelper {
                helper: 4,
                target: 0
            })
        );
        // wraps on both sides
        let req = Requirement::new(Scheme::Src, 4, 3, 2, 8).unwrap();
        assert_eq!(Src.fragment_subpackets(&req, 2, 0), Ok(2));
    }

    #[test]
    fn repair_bandwidth_is_below_device_size() {
        let req = Requirement::new(Scheme::Src, 8, 4, 2, 8).unwrap();
        let total: usize = [1, 2, 6, 7]
            .iter()
            .map(|&h| Src.fragment_subpackets(&req, h, 0).unwrap())
            .sum();
        assert_eq!(total, 6);
        assert!(total < req.d() * req.subpackets_per_device());
    }
}
