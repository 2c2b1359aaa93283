use std::fmt;

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    codec::{self, Codec},
    gf::try_zeroed,
    CodingContext, Error, Requirement,
};

// ======================================================================
// RegeneratingCode - PUBLIC

/// Encoder, decoder and repairer of one [`Requirement`].
///
/// Holds the [`CodingContext`] and the codec of the requirement's scheme,
/// both chosen once at construction. All methods take `&self`, so one
/// `RegeneratingCode` can be shared between threads.
///
/// Device buffers are `coded_packet_size` bytes, i.e. `subpackets_per_device`
/// subpackets each a non-zero multiple of `ALIGNMENT * w` bytes. Every method
/// checks its arguments before touching any buffer.
///
/// # Example
///
/// ```rust
/// use regenerating_codes::{RegeneratingCode, Requirement, Scheme};
///
/// let req = Requirement::new(Scheme::MsrProductMatrix, 5, 3, 4, 8)?;
/// let code = RegeneratingCode::new(req)?;
///
/// let data = vec![7u8; req.multiple_of()];
/// let mut devices = code.encode(&data)?;
///
/// // lose devices 1 and 4
/// devices[1].fill(0);
/// devices[4].fill(0);
/// assert_eq!(code.decode(&mut devices, &[1, 4])?, data);
///
/// // regenerate device 2 from four helpers
/// let original = devices[2].clone();
/// assert_eq!(code.repair(&devices, &[0, 1, 3, 4], 2)?, original);
/// # Ok::<(), regenerating_codes::Error>(())
/// ```
pub struct RegeneratingCode {
    context: CodingContext,
    codec: &'static dyn Codec,
}

impl RegeneratingCode {
    /// Returns coding context.
    pub fn context(&self) -> &CodingContext {
        &self.context
    }

    /// Restores original data from `n` device buffers.
    ///
    /// - `devices` must contain all `n` buffers in device order, with equal sizes.
    /// - `erasures` lists devices whose content is lost. Content of those
    ///   buffers is ignored and they are overwritten with regenerated content.
    ///
    /// # Errors
    ///
    /// - [`Error::WrongDeviceCount`] unless exactly `n` buffers are given.
    /// - [`Error::IncorrectBufferSize`] if buffers differ in size or the size
    ///   is not a valid coded packet size.
    /// - [`Error::InvalidDeviceIndex`], [`Error::DuplicateDeviceIndex`]
    ///   for bad `erasures`.
    /// - [`Error::TooManyErasures`] if more than `n - k` devices are erased.
    pub fn decode<D: AsMut<[u8]>>(
        &self,
        devices: &mut [D],
        erasures: &[usize],
    ) -> Result<Vec<u8>, Error> {
        let req = self.requirement();
        let n = req.n();

        if devices.len() != n {
            return Err(Error::WrongDeviceCount {
                expected: n,
                got: devices.len(),
            });
        }

        let mut views: Vec<&mut [u8]> = devices.iter_mut().map(AsMut::as_mut).collect();
        let coded_size = views[0].len();
        for view in &views[1..] {
            if view.len() != coded_size {
                return Err(Error::IncorrectBufferSize {
                    expected: coded_size,
                    got: view.len(),
                });
            }
        }
        let sub = self.subpacket_size(coded_size)?;

        let erased = device_set(erasures, n)?;
        let erased_count = erased.count_ones(..);
        if erased_count > req.max_erasures() {
            return Err(Error::TooManyErasures {
                erased: erased_count,
                max: req.max_erasures(),
            });
        }

        debug!(
            scheme = %req.scheme(),
            erased = erased_count,
            sub,
            "decode"
        );

        let mut output = try_zeroed(req.data_subpackets() * sub)?;
        self.codec
            .decode(&self.context, &mut views, &erased, sub, &mut output)?;
        Ok(output)
    }

    /// Encodes `data` into `n` device buffers.
    ///
    /// Devices `0..k` of [`Scheme::Lrc`], [`Scheme::Src`],
    /// [`Scheme::MsrProductMatrix`] and [`Scheme::MbrProductMatrix`] start
    /// with the data itself.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameters`] unless `data.len()` is a non-zero multiple
    /// of [`Requirement::multiple_of`] not above [`Requirement::max_size`].
    ///
    /// [`Scheme::Lrc`]: crate::Scheme::Lrc
    /// [`Scheme::Src`]: crate::Scheme::Src
    /// [`Scheme::MsrProductMatrix`]: crate::Scheme::MsrProductMatrix
    /// [`Scheme::MbrProductMatrix`]: crate::Scheme::MbrProductMatrix
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
        let req = self.requirement();
        req.check_data_size(data.len())?;

        let sub = req.subpacket_size(data.len());
        let coded_size = req.coded_packet_size(data.len());

        let mut devices = Vec::new();
        devices
            .try_reserve_exact(req.n())
            .map_err(|_| Error::OutOfMemory)?;
        for _ in 0..req.n() {
            devices.push(try_zeroed::<u8>(coded_size)?);
        }

        let mut views: Vec<&mut [u8]> = devices.iter_mut().map(Vec::as_mut_slice).collect();
        self.codec.encode(&self.context, data, &mut views, sub)?;

        Ok(devices)
    }

    /// Builds [`CodingContext`] for `requirement` and selects its codec.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if allocation fails.
    pub fn new(requirement: Requirement) -> Result<Self, Error> {
        Ok(Self {
            context: CodingContext::new(requirement)?,
            codec: codec::codec_for(requirement.scheme()),
        })
    }

    /// Repairs device `to` using devices `helpers`, running
    /// [`repair_encode`] on the helpers the scheme needs and
    /// [`repair_decode`] on the resulting fragments.
    ///
    /// `devices` must contain all `n` buffers in device order,
    /// content of device `to` is ignored.
    ///
    /// [`repair_encode`]: RegeneratingCode::repair_encode
    /// [`repair_decode`]: RegeneratingCode::repair_decode
    pub fn repair<D: AsRef<[u8]>>(
        &self,
        devices: &[D],
        helpers: &[usize],
        to: usize,
    ) -> Result<Vec<u8>, Error> {
        let req = self.requirement();
        if devices.len() != req.n() {
            return Err(Error::WrongDeviceCount {
                expected: req.n(),
                got: devices.len(),
            });
        }

        self.check_helpers(helpers, to)?;
        let chosen: Vec<usize> = self
            .codec
            .select_helpers(req, helpers, to)?
            .into_iter()
            .map(|i| helpers[i])
            .collect();

        let fragments = chosen
            .iter()
            .map(|&h| self.repair_encode(devices[h].as_ref(), h, to))
            .collect::<Result<Vec<_>, _>>()?;

        self.repair_decode(&fragments, &chosen, to)
    }

    /// Rebuilds device `to` from help fragments.
    ///
    /// `fragments[i]` must be the [`repair_encode`] output of device
    /// `helpers[i]` for target `to`. Extra helpers beyond what the scheme
    /// needs are ignored, and so are helpers that can't help `to`
    /// (outside the local group of [`Scheme::Lrc`] or farther than `f`
    /// on the ring of [`Scheme::Src`]). Their fragments are never read.
    ///
    /// # Errors
    ///
    /// - [`Error::WrongDeviceCount`] if `fragments` and `helpers` differ in length.
    /// - [`Error::InvalidDeviceIndex`], [`Error::DuplicateDeviceIndex`] for bad indexes.
    /// - [`Error::InvalidHelper`] if `to` is listed as a helper or no helper can help `to`.
    /// - [`Error::InsufficientHelpers`] if fewer helpers than [`Requirement::d`]
    ///   are given or can help `to`.
    /// - [`Error::IncorrectBufferSize`] if fragment sizes are inconsistent.
    ///
    /// [`repair_encode`]: RegeneratingCode::repair_encode
    /// [`Scheme::Lrc`]: crate::Scheme::Lrc
    /// [`Scheme::Src`]: crate::Scheme::Src
    pub fn repair_decode<F: AsRef<[u8]>>(
        &self,
        fragments: &[F],
        helpers: &[usize],
        to: usize,
    ) -> Result<Vec<u8>, Error> {
        let req = self.requirement();

        if fragments.len() != helpers.len() {
            return Err(Error::WrongDeviceCount {
                expected: helpers.len(),
                got: fragments.len(),
            });
        }
        self.check_helpers(helpers, to)?;

        let chosen = self.codec.select_helpers(req, helpers, to)?;
        let chosen_helpers: Vec<usize> = chosen.iter().map(|&i| helpers[i]).collect();
        let chosen_fragments: Vec<&[u8]> = chosen.iter().map(|&i| fragments[i].as_ref()).collect();

        let mut sub = None;
        for (&h, fragment) in chosen_helpers.iter().zip(&chosen_fragments) {
            let parts = self.codec.fragment_subpackets(req, h, to)?;
            let expected = match sub {
                Some(sub) => parts * sub,
                None => {
                    let size = self.check_subpacket(fragment.len() / parts)?;
                    sub = Some(size);
                    parts * size
                }
            };
            if fragment.len() != expected {
                return Err(Error::IncorrectBufferSize {
                    expected,
                    got: fragment.len(),
                });
            }
        }
        let sub = sub.ok_or(Error::InsufficientHelpers {
            needed: req.d(),
            got: 0,
        })?;

        let mut device = try_zeroed(req.subpackets_per_device() * sub)?;
        self.codec.repair_decode(
            &self.context,
            &chosen_fragments,
            &chosen_helpers,
            to,
            sub,
            &mut device,
        )?;
        Ok(device)
    }

    /// Computes help fragment of device `from` for repairing device `to`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDeviceIndex`] if `from` or `to` is out of range.
    /// - [`Error::InvalidHelper`] if `from` can't help `to`.
    /// - [`Error::IncorrectBufferSize`] if `device` is not a valid coded packet.
    pub fn repair_encode(&self, device: &[u8], from: usize, to: usize) -> Result<Vec<u8>, Error> {
        let size = self.repair_fragment_size(device.len(), from, to)?;
        let sub = self.subpacket_size(device.len())?;

        let mut fragment = try_zeroed(size)?;
        self.codec
            .repair_encode(&self.context, device, from, to, sub, &mut fragment)?;
        Ok(fragment)
    }

    /// Returns size of the help fragment device `from` sends to `to`
    /// when devices are `coded_size` bytes.
    ///
    /// This is [`Requirement::repair_packet_size`] except for [`Scheme::Src`],
    /// where it depends on the distance between `from` and `to`.
    ///
    /// [`Scheme::Src`]: crate::Scheme::Src
    pub fn repair_fragment_size(
        &self,
        coded_size: usize,
        from: usize,
        to: usize,
    ) -> Result<usize, Error> {
        let req = self.requirement();
        let n = req.n();
        for index in [from, to] {
            if index >= n {
                return Err(Error::InvalidDeviceIndex { index, n });
            }
        }
        if from == to {
            return Err(Error::InvalidHelper {
                helper: from,
                target: to,
            });
        }

        let sub = self.subpacket_size(coded_size)?;
        Ok(self.codec.fragment_subpackets(req, from, to)? * sub)
    }

    /// Returns requirement.
    pub fn requirement(&self) -> &Requirement {
        self.context.requirement()
    }
}

// ======================================================================
// RegeneratingCode - IMPL DEBUG

impl fmt::Debug for RegeneratingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegeneratingCode")
            .field("requirement", self.requirement())
            .finish()
    }
}

// ======================================================================
// RegeneratingCode - PRIVATE

impl RegeneratingCode {
    fn check_helpers(&self, helpers: &[usize], to: usize) -> Result<(), Error> {
        let n = self.requirement().n();
        if to >= n {
            return Err(Error::InvalidDeviceIndex { index: to, n });
        }
        let set = device_set(helpers, n)?;
        if set[to] {
            return Err(Error::InvalidHelper {
                helper: to,
                target: to,
            });
        }
        Ok(())
    }

    fn check_subpacket(&self, sub: usize) -> Result<usize, Error> {
        let granularity = self.requirement().subpacket_granularity();
        if sub == 0 || sub % granularity != 0 {
            Err(Error::IncorrectBufferSize {
                expected: (sub / granularity).max(1) * granularity,
                got: sub,
            })
        } else {
            Ok(sub)
        }
    }

    // Subpacket size of `coded_size` byte devices.
    fn subpacket_size(&self, coded_size: usize) -> Result<usize, Error> {
        let req = self.requirement();
        let unit = req.subpackets_per_device() * req.subpacket_granularity();
        if coded_size == 0 || coded_size % unit != 0 {
            Err(Error::IncorrectBufferSize {
                expected: (coded_size / unit).max(1) * unit,
                got: coded_size,
            })
        } else {
            Ok(coded_size / req.subpackets_per_device())
        }
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn device_set(indexes: &[usize], n: usize) -> Result<FixedBitSet, Error> {
    let mut set = FixedBitSet::with_capacity(n);
    for &index in indexes {
        if index >= n {
            return Err(Error::InvalidDeviceIndex { index, n });
        }
        if set.put(index) {
            return Err(Error::DuplicateDeviceIndex { index });
        }
    }
    Ok(set)
}

// ======================================================================
// TESTS
