use std::fmt;

use crate::{gf::MAX_W, Error};

// ======================================================================
// CONST - PUBLIC

/// Minimum packet size in bytes.
///
/// Every symbol is split into `w` packets, so subpacket sizes are
/// multiples of `ALIGNMENT * w`.
pub const ALIGNMENT: usize = 64;

/// Upper bound for data size accepted by a single encode.
pub const MAX_DATA_SIZE: usize = 64 * 1024 * 1024;

// ======================================================================
// Scheme - PUBLIC

/// Regenerating code construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Local Reconstruction Code: Reed-Solomon plus disjoint local parity
    /// groups of `f + 1` devices.
    Lrc,
    /// Simple Regenerating Code: Reed-Solomon plus overlapping local parity
    /// groups of `f + 1` consecutive devices around the ring.
    Src,
    /// Minimum-Storage-Regenerating code, product-matrix construction.
    MsrProductMatrix,
    /// Minimum-Bandwidth-Regenerating code, product-matrix construction.
    MbrProductMatrix,
    /// Minimum-Bandwidth-Regenerating code, exact repair-by-transfer.
    MbrRepairByTransfer,
}

impl Scheme {
    /// All schemes.
    pub const ALL: [Scheme; 5] = [
        Scheme::Lrc,
        Scheme::Src,
        Scheme::MsrProductMatrix,
        Scheme::MbrProductMatrix,
        Scheme::MbrRepairByTransfer,
    ];

    /// Returns short display name.
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Lrc => "LRC",
            Scheme::Src => "SRC",
            Scheme::MsrProductMatrix => "MSR-PM",
            Scheme::MbrProductMatrix => "MBR-PM",
            Scheme::MbrRepairByTransfer => "MBR-RBT",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ======================================================================
// Requirement - PUBLIC

/// Validated parameters and derived sizes of one code configuration.
///
/// Data given to encode must be a non-zero multiple of
/// [`multiple_of`](Requirement::multiple_of) bytes and at most
/// [`max_size`](Requirement::max_size) bytes. It is split into
/// [`data_subpackets`](Requirement::data_subpackets) subpackets, and each
/// device stores [`subpackets_per_device`](Requirement::subpackets_per_device)
/// subpackets of the same size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement {
    scheme: Scheme,
    n: usize,
    k: usize,
    d: usize,
    w: usize,
    f: usize,
    inner_n: usize,
    inner_k: usize,
    multiple_of: usize,
    max_size: usize,
}

impl Requirement {
    /// Returns error unless `data_size` is a valid encode input size.
    pub fn check_data_size(&self, data_size: usize) -> Result<(), Error> {
        if data_size == 0 || data_size % self.multiple_of != 0 {
            Err(Error::InvalidParameters {
                reason: "data size must be a non-zero multiple of multiple_of",
            })
        } else if data_size > self.max_size {
            Err(Error::InvalidParameters {
                reason: "data size exceeds max_size",
            })
        } else {
            Ok(())
        }
    }

    /// Returns size of each coded device buffer for `data_size` bytes of data.
    pub fn coded_packet_size(&self, data_size: usize) -> usize {
        self.subpacket_size(data_size) * self.subpackets_per_device()
    }

    /// Returns repair degree, i.e. number of helpers needed to repair one device.
    ///
    /// For [`Scheme::Lrc`] this is `f`, for [`Scheme::Src`] `min(2f, n - 1)`.
    pub fn d(&self) -> usize {
        self.d
    }

    /// Returns number of subpackets the data is split into.
    pub fn data_subpackets(&self) -> usize {
        match self.scheme {
            Scheme::Lrc | Scheme::Src => self.k * self.f,
            Scheme::MsrProductMatrix => self.k * self.alpha(),
            Scheme::MbrProductMatrix => self.k * (self.k + 1) / 2 + self.k * (self.d - self.k),
            Scheme::MbrRepairByTransfer => self.inner_k,
        }
    }

    /// Returns data size encoded into device buffers of `coded_size` bytes.
    pub fn data_size_for(&self, coded_size: usize) -> usize {
        coded_size / self.subpackets_per_device() * self.data_subpackets()
    }

    /// Returns local group parameter `f` of [`Scheme::Lrc`] and [`Scheme::Src`].
    pub fn f(&self) -> Option<usize> {
        match self.scheme {
            Scheme::Lrc | Scheme::Src => Some(self.f),
            _ => None,
        }
    }

    /// Returns `(inner_n, inner_k)` of the Reed-Solomon code
    /// inside [`Scheme::MbrRepairByTransfer`].
    pub fn inner(&self) -> Option<(usize, usize)> {
        match self.scheme {
            Scheme::MbrRepairByTransfer => Some((self.inner_n, self.inner_k)),
            _ => None,
        }
    }

    /// Returns number of information devices.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns maximum number of erased devices decode can handle, i.e. `n - k`.
    pub fn max_erasures(&self) -> usize {
        self.n - self.k
    }

    /// Returns largest accepted data size.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns smallest accepted data size.
    pub fn min_size(&self) -> usize {
        self.multiple_of
    }

    /// Returns granularity of accepted data sizes,
    /// `data_subpackets * ALIGNMENT * w`.
    pub fn multiple_of(&self) -> usize {
        self.multiple_of
    }

    /// Returns total number of devices.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Validates parameters and computes derived sizes.
    ///
    /// - `d` is the repair degree for [`Scheme::MsrProductMatrix`] and
    ///   [`Scheme::MbrProductMatrix`].
    /// - For [`Scheme::MbrRepairByTransfer`] any `k < d < n` is accepted
    ///   and `d` becomes `n - 1`.
    /// - For [`Scheme::Lrc`] and [`Scheme::Src`] `d` is the local group
    ///   parameter `f`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameters`] if the scheme's preconditions don't hold.
    pub fn new(scheme: Scheme, n: usize, k: usize, d: usize, w: usize) -> Result<Self, Error> {
        fn invalid(reason: &'static str) -> Error {
            Error::InvalidParameters { reason }
        }

        if w == 0 || w > MAX_W {
            return Err(invalid("w must be in 1..=32"));
        }
        if n < 3 {
            return Err(invalid("n must be at least 3"));
        }
        if k < 3 || k >= n {
            return Err(invalid("k must satisfy 3 <= k < n"));
        }

        let field_order = 1u128 << w;
        let fits = |points: usize| (points as u128) <= field_order;

        let mut req = Self {
            scheme,
            n,
            k,
            d,
            w,
            f: 0,
            inner_n: 0,
            inner_k: 0,
            multiple_of: 0,
            max_size: 0,
        };

        match scheme {
            Scheme::Lrc => {
                let f = d;
                if f == 0 {
                    return Err(invalid("f must be at least 1"));
                }
                if n % (f + 1) != 0 {
                    return Err(invalid("f + 1 must divide n"));
                }
                if !fits(n) {
                    return Err(invalid("2^w must be at least n"));
                }
                req.f = f;
                req.d = f;
            }

            Scheme::Src => {
                let f = d;
                if f == 0 {
                    return Err(invalid("f must be at least 1"));
                }
                if f + 1 > n {
                    return Err(invalid("f + 1 must not exceed n"));
                }
                if !fits(n) {
                    return Err(invalid("2^w must be at least n"));
                }
                req.f = f;
                req.d = (2 * f).min(n - 1);
            }

            Scheme::MsrProductMatrix => {
                if d >= n || d < k.max(2 * k - 2) {
                    return Err(invalid("MSR needs max(k, 2k - 2) <= d < n"));
                }
                if !fits(n) {
                    return Err(invalid("2^w must be at least n"));
                }
            }

            Scheme::MbrProductMatrix => {
                if d < k || d >= n {
                    return Err(invalid("MBR needs k <= d < n"));
                }
                if !fits(n - k + d) {
                    return Err(invalid("2^w must be at least n - k + d"));
                }
            }

            Scheme::MbrRepairByTransfer => {
                if d <= k || d >= n {
                    return Err(invalid("repair-by-transfer needs k < d < n"));
                }
                let inner_n = n
                    .checked_mul(n - 1)
                    .map(|x| x / 2)
                    .ok_or_else(|| invalid("n too large"))?;
                if !fits(inner_n) {
                    return Err(invalid("2^w must be at least n(n - 1)/2"));
                }
                req.d = n - 1;
                req.inner_n = inner_n;
                req.inner_k = k * n - k * (k + 1) / 2;
            }
        }

        req.multiple_of = req
            .data_subpackets()
            .checked_mul(ALIGNMENT * w)
            .filter(|&m| m <= MAX_DATA_SIZE)
            .ok_or_else(|| invalid("multiple_of exceeds MAX_DATA_SIZE"))?;
        req.max_size = MAX_DATA_SIZE / req.multiple_of * req.multiple_of;

        Ok(req)
    }

    /// Returns repair fragment size upper bound for `data_size` bytes of data.
    ///
    /// For [`Scheme::Lrc`] this is a whole device, for [`Scheme::Src`]
    /// a whole device is the upper bound and actual fragments depend on
    /// the distance between helper and target. Other schemes send
    /// one subpacket.
    pub fn repair_packet_size(&self, data_size: usize) -> usize {
        let sub = self.subpacket_size(data_size);
        match self.scheme {
            Scheme::Lrc | Scheme::Src => (self.f + 1) * sub,
            _ => sub,
        }
    }

    /// Rounds `size` down to a multiple of [`multiple_of`](Requirement::multiple_of),
    /// capped at [`max_size`](Requirement::max_size).
    pub fn round_down(&self, size: usize) -> usize {
        size.min(self.max_size) / self.multiple_of * self.multiple_of
    }

    /// Returns scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns size of one subpacket for `data_size` bytes of data.
    pub fn subpacket_size(&self, data_size: usize) -> usize {
        data_size / self.data_subpackets()
    }

    /// Returns number of subpackets stored on each device.
    pub fn subpackets_per_device(&self) -> usize {
        match self.scheme {
            Scheme::Lrc | Scheme::Src => self.f + 1,
            Scheme::MsrProductMatrix => self.alpha(),
            Scheme::MbrProductMatrix => self.d,
            Scheme::MbrRepairByTransfer => self.n - 1,
        }
    }

    /// Returns word size.
    pub fn w(&self) -> usize {
        self.w
    }
}

// ======================================================================
// Requirement - CRATE

impl Requirement {
    // MSR subpackets per device, `d - k + 1`.
    pub(crate) fn alpha(&self) -> usize {
        self.d - self.k + 1
    }

    // Smallest valid subpacket size granularity.
    pub(crate) fn subpacket_granularity(&self) -> usize {
        ALIGNMENT * self.w
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Same as [`Requirement::new`].
pub fn get_requirement(
    scheme: Scheme,
    n: usize,
    k: usize,
    d: usize,
    w: usize,
) -> Result<Requirement, Error> {
    Requirement::new(scheme, n, k, d, w)
}

/// Same as [`Requirement::coded_packet_size`].
pub fn compute_coded_packet_size(requirement: &Requirement, data_size: usize) -> usize {
    requirement.coded_packet_size(data_size)
}

/// Same as [`Requirement::repair_packet_size`].
pub fn compute_repair_packet_size(requirement: &Requirement, data_size: usize) -> usize {
    requirement.repair_packet_size(data_size)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lrc_sizes() {
        let req = Requirement::new(Scheme::Lrc, 6, 3, 1, 8).unwrap();
        assert_eq!(req.f(), Some(1));
        assert_eq!(req.d(), 1);
        assert_eq!(req.multiple_of(), 3 * 64 * 8);
        assert_eq!(req.min_size(), 1536);
        assert_eq!(req.coded_packet_size(1536), 2 * 512);
        assert_eq!(req.repair_packet_size(1536), 2 * 512);
        assert_eq!(req.data_size_for(1024), 1536);
    }

    #[test]
    fn src_repair_degree() {
        assert_eq!(Requirement::new(Scheme::Src, 8, 4, 2, 8).unwrap().d(), 4);
        assert_eq!(Requirement::new(Scheme::Src, 4, 3, 2, 8).unwrap().d(), 3);
    }

    #[test]
    fn msr_sizes() {
        let req = Requirement::new(Scheme::MsrProductMatrix, 5, 3, 4, 8).unwrap();
        assert_eq!(req.subpackets_per_device(), 2);
        assert_eq!(req.data_subpackets(), 6);
        assert_eq!(req.multiple_of(), 6 * 64 * 8);
        assert_eq!(req.coded_packet_size(req.multiple_of()), 2 * 512);
        assert_eq!(req.repair_packet_size(req.multiple_of()), 512);
    }

    #[test]
    fn mbr_sizes() {
        let req = Requirement::new(Scheme::MbrProductMatrix, 6, 3, 4, 8).unwrap();
        assert_eq!(req.data_subpackets(), 6 + 3);
        assert_eq!(req.subpackets_per_device(), 4);
    }

    #[test]
    fn repair_by_transfer_forces_full_degree() {
        let req = Requirement::new(Scheme::MbrRepairByTransfer, 5, 3, 4, 8).unwrap();
        assert_eq!(req.d(), 4);
        assert_eq!(req.inner(), Some((10, 9)));
        assert_eq!(req.subpackets_per_device(), 4);

        let req = Requirement::new(Scheme::MbrRepairByTransfer, 6, 3, 4, 8).unwrap();
        assert_eq!(req.d(), 5);
        assert_eq!(req.inner(), Some((15, 12)));
    }

    #[test]
    fn invalid_parameters() {
        let cases = [
            (Scheme::Lrc, 6, 3, 3, 8),
            (Scheme::Lrc, 6, 3, 0, 8),
            (Scheme::Lrc, 2, 1, 1, 8),
            (Scheme::Src, 6, 6, 1, 8),
            (Scheme::Src, 4, 3, 4, 8),
            (Scheme::Lrc, 18, 3, 1, 4),
            (Scheme::MsrProductMatrix, 8, 4, 5, 8),
            (Scheme::MsrProductMatrix, 5, 3, 5, 8),
            (Scheme::MsrProductMatrix, 5, 2, 2, 8),
            (Scheme::MbrProductMatrix, 6, 3, 2, 8),
            (Scheme::MbrRepairByTransfer, 5, 3, 3, 8),
            (Scheme::MbrRepairByTransfer, 8, 3, 7, 4),
            (Scheme::MsrProductMatrix, 5, 3, 4, 0),
            (Scheme::MsrProductMatrix, 5, 3, 4, 33),
        ];
        for (scheme, n, k, d, w) in cases {
            assert!(
                matches!(
                    Requirement::new(scheme, n, k, d, w),
                    Err(Error::InvalidParameters { .. })
                ),
                "{} n={} k={} d={} w={}",
                scheme,
                n,
                k,
                d,
                w
            );
        }
    }

    #[test]
    fn data_size_checks() {
        let req = Requirement::new(Scheme::Lrc, 6, 3, 1, 8).unwrap();
        assert!(req.check_data_size(1536).is_ok());
        assert!(req.check_data_size(3072).is_ok());
        assert!(req.check_data_size(0).is_err());
        assert!(req.check_data_size(1535).is_err());
        assert!(req.check_data_size(req.max_size() + req.multiple_of()).is_err());
        assert_eq!(req.round_down(4000), 3072);
        assert_eq!(req.round_down(1000), 0);
    }
}
