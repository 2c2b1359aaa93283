//! Per-scheme encode, decode and repair.
//!
//! Every codec works on caller-validated buffers: `devices` are `n` buffers
//! of `subpackets_per_device * sub` bytes, data is `data_subpackets * sub`
//! bytes and `sub` is a multiple of `ALIGNMENT * w`. Argument checking is
//! done once in [`RegeneratingCode`].
//!
//! [`RegeneratingCode`]: crate::RegeneratingCode

use fixedbitset::FixedBitSet;

use crate::{
    gf::{Regions, Slot},
    CodingContext, Error, Requirement, Scheme,
};

pub(crate) use self::{
    lrc::Lrc, mbr_product_matrix::MbrProductMatrix, mbr_repair_by_transfer::MbrRepairByTransfer,
    msr_product_matrix::MsrProductMatrix, src::Src,
};

mod lrc;
mod mbr_product_matrix;
mod mbr_repair_by_transfer;
mod message;
mod msr_product_matrix;
mod src;

// ======================================================================
// Codec - CRATE

pub(crate) trait Codec: Sync {
    /// Encodes `data` into `devices`.
    fn encode(
        &self,
        ctx: &CodingContext,
        data: &[u8],
        devices: &mut [&mut [u8]],
        sub: usize,
    ) -> Result<(), Error>;

    /// Restores `erased` devices in place and writes original data to `output`.
    fn decode(
        &self,
        ctx: &CodingContext,
        devices: &mut [&mut [u8]],
        erased: &FixedBitSet,
        sub: usize,
        output: &mut [u8],
    ) -> Result<(), Error>;

    /// Returns number of subpackets `from` sends when repairing `to`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHelper`] if `from` can't help `to`.
    fn fragment_subpackets(
        &self,
        _req: &Requirement,
        _from: usize,
        _to: usize,
    ) -> Result<usize, Error> {
        Ok(1)
    }

    /// Computes help fragment of device `from` for repairing `to`.
    fn repair_encode(
        &self,
        ctx: &CodingContext,
        device: &[u8],
        from: usize,
        to: usize,
        sub: usize,
        fragment: &mut [u8],
    ) -> Result<(), Error>;

    /// Rebuilds device `to` from help fragments of `helpers`.
    ///
    /// `helpers` are exactly the ones chosen by [`Codec::select_helpers`].
    fn repair_decode(
        &self,
        ctx: &CodingContext,
        fragments: &[&[u8]],
        helpers: &[usize],
        to: usize,
        sub: usize,
        device: &mut [u8],
    ) -> Result<(), Error>;

    /// Returns positions in `helpers` to use for repairing `to`.
    ///
    /// `helpers` are distinct, in range and don't include `to`.
    /// Default uses the first `d` helpers that [`Codec::fragment_subpackets`]
    /// accepts and skips the rest.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientHelpers`] if fewer than `d` helpers are given
    ///   or fewer than `d` of them can help `to`.
    /// - [`Error::InvalidHelper`] if none of them can help `to`.
    fn select_helpers(
        &self,
        req: &Requirement,
        helpers: &[usize],
        to: usize,
    ) -> Result<Vec<usize>, Error> {
        let d = req.d();
        if helpers.len() < d {
            return Err(Error::InsufficientHelpers {
                needed: d,
                got: helpers.len(),
            });
        }

        let usable: Vec<usize> = (0..helpers.len())
            .filter(|&i| self.fragment_subpackets(req, helpers[i], to).is_ok())
            .take(d)
            .collect();

        match (usable.len(), helpers.first()) {
            (got, _) if got == d => Ok(usable),
            (0, Some(&helper)) => Err(Error::InvalidHelper { helper, target: to }),
            (got, _) => Err(Error::InsufficientHelpers { needed: d, got }),
        }
    }
}

// ======================================================================
// FUNCTIONS - CRATE

pub(crate) fn codec_for(scheme: Scheme) -> &'static dyn Codec {
    match scheme {
        Scheme::Lrc => &Lrc,
        Scheme::Src => &Src,
        Scheme::MsrProductMatrix => &MsrProductMatrix,
        Scheme::MbrProductMatrix => &MbrProductMatrix,
        Scheme::MbrRepairByTransfer => &MbrRepairByTransfer,
    }
}

/// Adds `devices` to new [`Regions`] so that device `i` is buffer `i`.
pub(crate) fn device_regions<'a>(devices: &'a mut [&mut [u8]]) -> Regions<'a> {
    let mut regions = Regions::new();
    for device in devices.iter_mut() {
        regions.push_mut(device);
    }
    regions
}

/// Adds `fragments` to new [`Regions`] so that fragment `i` is buffer `i`,
/// followed by `device` as the last buffer.
pub(crate) fn repair_regions<'a>(
    fragments: &[&'a [u8]],
    device: &'a mut [u8],
) -> (Regions<'a>, usize) {
    let mut regions = Regions::new();
    for &fragment in fragments {
        regions.push(fragment);
    }
    let out = regions.push_mut(device);
    (regions, out)
}

/// Encodes Reed-Solomon parity of `n` devices, symbol `i` at `slots[i]`.
pub(crate) fn rs_encode(ctx: &CodingContext, regions: &mut Regions, slots: &[Slot], size: usize) {
    let k = ctx.generator().matrix().cols();
    ctx.generator().encode(regions, &slots[..k], &slots[k..], size);
}

/// Restores `erased` symbols of the Reed-Solomon code, symbol `i` at `slots[i]`.
pub(crate) fn rs_decode(
    ctx: &CodingContext,
    regions: &mut Regions,
    slots: &[Slot],
    erased: &FixedBitSet,
    size: usize,
) -> Result<(), Error> {
    crate::gf::decode_erasures(
        ctx.field(),
        ctx.generator().matrix(),
        erased,
        regions,
        slots,
        size,
    )
}

// ======================================================================
// TESTS
