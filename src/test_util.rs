use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::{Error, RegeneratingCode, Requirement, Scheme};

// ======================================================================
// FUNCTIONS - CRATE

pub(crate) fn digest<T>(shards: T) -> String
where
    T: IntoIterator,
    T::Item: AsRef<[u8]>,
{
    let mut sha = Sha256::new();
    for shard in shards {
        sha.update(shard);
    }
    hex::encode(sha.finalize())
}

pub(crate) fn encoded(
    scheme: Scheme,
    n: usize,
    k: usize,
    d: usize,
    w: usize,
    seed: u8,
) -> (RegeneratingCode, Vec<u8>, Vec<Vec<u8>>) {
    let code = RegeneratingCode::new(Requirement::new(scheme, n, k, d, w).unwrap()).unwrap();
    let data = generate_data(code.requirement().multiple_of(), seed);
    let devices = code.encode(&data).unwrap();
    (code, data, devices)
}

pub(crate) fn generate_data(len: usize, seed: u8) -> Vec<u8> {
    let mut rng = ChaCha8Rng::from_seed([seed; 32]);
    let mut data = vec![0u8; len];
    rng.fill::<[u8]>(&mut data);
    data
}

pub(crate) fn generate_original(count: usize, size: usize, seed: u8) -> Vec<Vec<u8>> {
    let mut rng = ChaCha8Rng::from_seed([seed; 32]);
    let mut original = vec![vec![0u8; size]; count];
    for original in &mut original {
        rng.fill::<[u8]>(original);
    }
    original
}

/// Repairs every device from every valid helper set, with helpers given
/// in random order.
pub(crate) fn repair_every_device(scheme: Scheme, n: usize, k: usize, d: usize, w: usize) {
    let (code, _, devices) = encoded(scheme, n, k, d, w, (n * 7 + d) as u8);
    let degree = code.requirement().d();
    let coded_size = devices[0].len();
    let mut rng = ChaCha8Rng::from_seed([d as u8; 32]);

    for to in 0..n {
        let candidates: Vec<usize> = (0..n)
            .filter(|&h| h != to && code.repair_fragment_size(coded_size, h, to).is_ok())
            .collect();
        assert!(candidates.len() >= degree, "{} to={}", scheme, to);

        for mask in 0u32..1 << candidates.len() {
            if mask.count_ones() as usize != degree {
                continue;
            }
            let mut helpers: Vec<usize> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &h)| h)
                .collect();
            helpers.shuffle(&mut rng);

            let fragments: Vec<Vec<u8>> = helpers
                .iter()
                .map(|&h| {
                    let fragment = code.repair_encode(&devices[h], h, to).unwrap();
                    assert_eq!(
                        fragment.len(),
                        code.repair_fragment_size(coded_size, h, to).unwrap()
                    );
                    fragment
                })
                .collect();

            let repaired = code.repair_decode(&fragments, &helpers, to).unwrap();
            assert_eq!(
                digest([&repaired]),
                digest([&devices[to]]),
                "{} n={} k={} d={} w={} to={} helpers={:?}",
                scheme,
                n,
                k,
                d,
                w,
                to,
                helpers
            );
        }
    }
}

/// Repairs every device from all other devices, and fails to repair it
/// from one usable helper too few.
pub(crate) fn repair_helper_counts(scheme: Scheme, n: usize, k: usize, d: usize, w: usize) {
    let (code, _, devices) = encoded(scheme, n, k, d, w, (n * 3 + d) as u8);
    let degree = code.requirement().d();
    let coded_size = devices[0].len();
    let mut rng = ChaCha8Rng::from_seed([k as u8; 32]);

    for to in 0..n {
        let mut others: Vec<usize> = (0..n).filter(|&h| h != to).collect();
        others.shuffle(&mut rng);
        let usable: Vec<usize> = others
            .iter()
            .copied()
            .filter(|&h| code.repair_fragment_size(coded_size, h, to).is_ok())
            .collect();

        // superset, including devices which can't help `to`
        assert_eq!(
            code.repair(&devices, &others, to).unwrap(),
            devices[to],
            "{} to={} helpers={:?}",
            scheme,
            to,
            others
        );

        // fragments of helpers that aren't used are never read
        let fragments: Vec<Vec<u8>> = others
            .iter()
            .map(|&h| code.repair_encode(&devices[h], h, to).unwrap_or_default())
            .collect();
        assert_eq!(code.repair_decode(&fragments, &others, to).unwrap(), devices[to]);

        let few = &usable[..degree - 1];
        assert_eq!(
            code.repair(&devices, few, to),
            Err(Error::InsufficientHelpers {
                needed: degree,
                got: degree - 1
            }),
            "{} to={} helpers={:?}",
            scheme,
            to,
            few
        );

        // enough helpers, but one of them can't help
        if let Some(&useless) = others.iter().find(|h| !usable.contains(h)) {
            let mut helpers = few.to_vec();
            helpers.push(useless);
            let expected = if degree == 1 {
                Error::InvalidHelper {
                    helper: useless,
                    target: to,
                }
            } else {
                Error::InsufficientHelpers {
                    needed: degree,
                    got: degree - 1,
                }
            };
            assert_eq!(code.repair(&devices, &helpers, to), Err(expected));
        }
    }
}

/// Decodes after erasing every subset of at most `n - k` devices,
/// erasures given in random order.
pub(crate) fn roundtrip_all_erasures(scheme: Scheme, n: usize, k: usize, d: usize, w: usize) {
    let (code, data, devices) = encoded(scheme, n, k, d, w, (n * 5 + k) as u8);
    let expected = digest([&data]);
    let mut rng = ChaCha8Rng::from_seed([k as u8; 32]);

    for mask in 0u32..1 << n {
        if mask.count_ones() as usize > n - k {
            continue;
        }
        let mut erasures: Vec<usize> = (0..n).filter(|&i| mask & (1 << i) != 0).collect();
        erasures.shuffle(&mut rng);

        let mut lost = devices.clone();
        for &i in &erasures {
            rng.fill::<[u8]>(&mut lost[i]);
        }

        let restored = code.decode(&mut lost, &erasures).unwrap();
        assert_eq!(
            digest([&restored]),
            expected,
            "{} n={} k={} d={} w={} erasures={:?}",
            scheme,
            n,
            k,
            d,
            w,
            erasures
        );
        assert_eq!(digest(&lost), digest(&devices), "{} erasures={:?}", scheme, erasures);
    }
}

/// Smallest configuration of `scheme` used in tests.
pub(crate) fn small_requirement(scheme: Scheme) -> Requirement {
    let (n, k, d) = match scheme {
        Scheme::Lrc => (6, 3, 1),
        Scheme::Src => (6, 3, 2),
        Scheme::MsrProductMatrix => (5, 3, 4),
        Scheme::MbrProductMatrix => (6, 3, 4),
        Scheme::MbrRepairByTransfer => (5, 3, 4),
    };
    Requirement::new(scheme, n, k, d, 8).unwrap()
}
