#![doc = include_str!(concat!(env!("OUT_DIR"), "/README-rustdocified.md"))]
#![deny(missing_docs)]

pub use crate::{
    context::CodingContext,
    regenerating_code::RegeneratingCode,
    requirement::{
        compute_coded_packet_size, compute_repair_packet_size, get_requirement, Requirement,
        Scheme, ALIGNMENT, MAX_DATA_SIZE,
    },
};

#[cfg(test)]
mod test_util;

mod codec;
mod context;
mod regenerating_code;
mod requirement;

pub mod algorithm {
    #![doc = include_str!("algorithm.md")]
}
pub mod gf;

// ======================================================================
// Error - PUBLIC

/// Represents all possible errors that can occur in this library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Device index was given twice.
    #[error("duplicate device index: {index}")]
    DuplicateDeviceIndex {
        /// Given duplicate index.
        index: usize,
    },

    /// Repair fragment doesn't match what its helper would send,
    /// or device buffer is not a valid coded packet.
    #[error("incorrect buffer size: expected {expected} bytes, got {got} bytes")]
    IncorrectBufferSize {
        /// Expected size, or nearest valid size if there is no single
        /// expected one.
        expected: usize,
        /// Given size.
        got: usize,
    },

    /// Repair was given fewer helpers than the repair degree.
    #[error("insufficient helpers: {got} given while {needed} are needed")]
    InsufficientHelpers {
        /// Number of helpers needed, i.e. [`Requirement::d`].
        needed: usize,
        /// Number of helpers given.
        got: usize,
    },

    /// Device index is not below `n`.
    #[error("invalid device index: {index} >= n {n}")]
    InvalidDeviceIndex {
        /// Given invalid index.
        index: usize,
        /// Configured number of devices.
        n: usize,
    },

    /// Helper can't contribute to repairing target, e.g. it is the target
    /// itself or outside of the target's local group.
    #[error("device {helper} can't help repairing device {target}")]
    InvalidHelper {
        /// Given helper.
        helper: usize,
        /// Device being repaired.
        target: usize,
    },

    /// Scheme parameters or data size are not supported.
    #[error("invalid parameters: {reason}")]
    InvalidParameters {
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// Allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// Matrix that must be invertible isn't.
    #[error("singular matrix")]
    SingularMatrix,

    /// More devices are erased than the code can recover from.
    #[error("too many erasures: {erased} erased while at most {max} can be recovered")]
    TooManyErasures {
        /// Number of erased devices or symbols.
        erased: usize,
        /// Maximum number that can be recovered.
        max: usize,
    },

    /// Decode was given other than `n` device buffers.
    #[error("wrong device count: expected {expected}, got {got}")]
    WrongDeviceCount {
        /// Expected number of buffers.
        expected: usize,
        /// Number of buffers given.
        got: usize,
    },
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Encodes in one go using [`RegeneratingCode`],
/// returning `n` device buffers.
///
/// - Parameters are as in [`Requirement::new`].
/// - `data.len()` must be a non-zero multiple of [`Requirement::multiple_of`].
///
/// See [simple usage](crate#simple-usage) for an example.
pub fn encode(
    scheme: Scheme,
    n: usize,
    k: usize,
    d: usize,
    w: usize,
    data: &[u8],
) -> Result<Vec<Vec<u8>>, Error> {
    RegeneratingCode::new(Requirement::new(scheme, n, k, d, w)?)?.encode(data)
}

/// Decodes in one go using [`RegeneratingCode`], returning original data.
///
/// - Parameters are as in [`Requirement::new`].
/// - `devices` must be all `n` device buffers in device order.
/// - `erasures` lists lost devices, their buffers are restored in place.
///
/// See [simple usage](crate#simple-usage) for an example.
pub fn decode<D: AsMut<[u8]>>(
    scheme: Scheme,
    n: usize,
    k: usize,
    d: usize,
    w: usize,
    devices: &mut [D],
    erasures: &[usize],
) -> Result<Vec<u8>, Error> {
    RegeneratingCode::new(Requirement::new(scheme, n, k, d, w)?)?.decode(devices, erasures)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    // ============================================================
    // SCENARIOS

    #[test]
    fn lrc_single_erasure_and_local_repair() {
        let data = test_util::generate_data(1536, 42);
        let devices = encode(Scheme::Lrc, 6, 3, 1, 8, &data).unwrap();

        assert_eq!(devices.len(), 6);
        assert!(devices.iter().all(|d| d.len() == 1024));

        let mut lost = devices.clone();
        lost[2].fill(0);
        assert_eq!(
            decode(Scheme::Lrc, 6, 3, 1, 8, &mut lost, &[2]).unwrap(),
            data
        );
        assert_eq!(lost, devices);

        // device 3 is the only other member of device 2's group
        let code = RegeneratingCode::new(Requirement::new(Scheme::Lrc, 6, 3, 1, 8).unwrap()).unwrap();
        let fragment = code.repair_encode(&devices[3], 3, 2).unwrap();
        assert_eq!(fragment, devices[3]);
        assert_eq!(code.repair_decode(&[fragment], &[3], 2).unwrap(), devices[2]);
    }

    #[test]
    fn msr_any_two_erasures_and_any_repair() {
        let req = Requirement::new(Scheme::MsrProductMatrix, 5, 3, 4, 8).unwrap();
        let code = RegeneratingCode::new(req).unwrap();
        let data = test_util::generate_data(req.multiple_of(), 43);
        let devices = code.encode(&data).unwrap();

        for a in 0..5 {
            for b in a + 1..5 {
                let mut lost = devices.clone();
                lost[a].fill(0xaa);
                lost[b].fill(0x55);
                assert_eq!(code.decode(&mut lost, &[a, b]).unwrap(), data);
                assert_eq!(lost, devices);
            }
        }

        for to in 0..5 {
            let helpers: Vec<usize> = (0..5).filter(|&h| h != to).collect();
            assert_eq!(code.repair(&devices, &helpers, to).unwrap(), devices[to]);
        }
    }

    // ============================================================
    // BOUNDARIES

    #[test]
    fn encode_rejects_invalid_parameters() {
        assert_eq!(
            encode(Scheme::Lrc, 6, 3, 3, 8, &[0u8; 1536]),
            Err(Error::InvalidParameters {
                reason: "f + 1 must divide n"
            })
        );
    }

    #[test]
    fn encode_rejects_non_multiple_size() {
        assert!(matches!(
            encode(Scheme::Lrc, 6, 3, 1, 8, &[0u8; 1024]),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn decode_rejects_too_many_erasures() {
        let data = test_util::generate_data(1536, 44);
        let mut devices = encode(Scheme::Lrc, 6, 3, 1, 8, &data).unwrap();
        assert_eq!(
            decode(Scheme::Lrc, 6, 3, 1, 8, &mut devices, &[0, 1, 2, 3]),
            Err(Error::TooManyErasures { erased: 4, max: 3 })
        );
    }

    // ============================================================
    // Error

    #[test]
    fn error_display() {
        assert_eq!(
            Error::InvalidDeviceIndex { index: 7, n: 6 }.to_string(),
            "invalid device index: 7 >= n 6"
        );
        assert_eq!(
            Error::InsufficientHelpers { needed: 4, got: 3 }.to_string(),
            "insufficient helpers: 3 given while 4 are needed"
        );
    }
}
