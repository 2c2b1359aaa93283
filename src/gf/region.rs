// ======================================================================
// Slot - PUBLIC

/// Position of a symbol: buffer index in [`Regions`] and byte offset in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Index of buffer in [`Regions`].
    pub buf: usize,
    /// Byte offset of symbol within that buffer.
    pub offset: usize,
}

impl Slot {
    /// Creates new [`Slot`].
    pub const fn new(buf: usize, offset: usize) -> Self {
        Self { buf, offset }
    }

    /// Returns slot `bytes` further in same buffer.
    pub const fn add(self, bytes: usize) -> Self {
        Self {
            buf: self.buf,
            offset: self.offset + bytes,
        }
    }
}

// ======================================================================
// Buffer - PRIVATE

enum Buffer<'a> {
    Shared(&'a [u8]),
    Exclusive(&'a mut [u8]),
}

impl<'a> Buffer<'a> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Shared(b) => b,
            Buffer::Exclusive(b) => b,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Shared(_) => panic!("write to read-only region"),
            Buffer::Exclusive(b) => b,
        }
    }
}

// ======================================================================
// Regions - PUBLIC

/// Set of borrowed byte buffers addressed by [`Slot`].
///
/// Symbols are never addressed by pointer, so one buffer can hold many
/// symbols (e.g. a whole message matrix) and any two non-overlapping
/// symbols can be read and written at the same time.
///
/// # Panics
///
/// Operations panic if a slot is out of bounds, if source and destination
/// overlap, or if destination is in a buffer added with [`Regions::push`].
#[derive(Default)]
pub struct Regions<'a> {
    bufs: Vec<Buffer<'a>>,
}

impl<'a> Regions<'a> {
    /// Copies `len` bytes from `src` to `dst`.
    pub fn copy(&mut self, src: Slot, dst: Slot, len: usize) {
        let (s, d) = self.pair(src, dst, len);
        d.copy_from_slice(s);
    }

    /// Returns `len` bytes at `slot`.
    pub fn get(&self, slot: Slot, len: usize) -> &[u8] {
        &self.bufs[slot.buf].as_slice()[slot.offset..slot.offset + len]
    }

    /// Returns `len` mutable bytes at `slot`.
    pub fn get_mut(&mut self, slot: Slot, len: usize) -> &mut [u8] {
        &mut self.bufs[slot.buf].as_mut_slice()[slot.offset..slot.offset + len]
    }

    /// Creates empty [`Regions`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `dst` to XOR of all `srcs`, or zeroes it if there are none.
    pub fn parity(&mut self, srcs: &[Slot], dst: Slot, len: usize) {
        match srcs.split_first() {
            Some((first, rest)) => {
                self.copy(*first, dst, len);
                for src in rest {
                    self.xor(*src, dst, len);
                }
            }
            None => self.zero(dst, len),
        }
    }

    /// Adds read-only buffer, returning its index.
    pub fn push(&mut self, buf: &'a [u8]) -> usize {
        self.bufs.push(Buffer::Shared(buf));
        self.bufs.len() - 1
    }

    /// Adds writable buffer, returning its index.
    pub fn push_mut(&mut self, buf: &'a mut [u8]) -> usize {
        self.bufs.push(Buffer::Exclusive(buf));
        self.bufs.len() - 1
    }

    /// XORs `len` bytes from `src` into `dst`.
    pub fn xor(&mut self, src: Slot, dst: Slot, len: usize) {
        let (s, d) = self.pair(src, dst, len);
        xor(d, s);
    }

    /// Zeroes `len` bytes at `dst`.
    pub fn zero(&mut self, dst: Slot, len: usize) {
        self.get_mut(dst, len).fill(0);
    }
}

// ======================================================================
// Regions - PRIVATE

impl<'a> Regions<'a> {
    fn pair(&mut self, src: Slot, dst: Slot, len: usize) -> (&[u8], &mut [u8]) {
        if src.buf == dst.buf {
            let buf = self.bufs[dst.buf].as_mut_slice();
            if src.offset < dst.offset {
                assert!(src.offset + len <= dst.offset, "overlapping regions");
                let (a, b) = buf.split_at_mut(dst.offset);
                (&a[src.offset..src.offset + len], &mut b[..len])
            } else {
                assert!(dst.offset + len <= src.offset, "overlapping regions");
                let (a, b) = buf.split_at_mut(src.offset);
                (&b[..len], &mut a[dst.offset..dst.offset + len])
            }
        } else if src.buf < dst.buf {
            let (lo, hi) = self.bufs.split_at_mut(dst.buf);
            (
                &lo[src.buf].as_slice()[src.offset..src.offset + len],
                &mut hi[0].as_mut_slice()[dst.offset..dst.offset + len],
            )
        } else {
            let (lo, hi) = self.bufs.split_at_mut(src.buf);
            (
                &hi[0].as_slice()[src.offset..src.offset + len],
                &mut lo[dst.buf].as_mut_slice()[dst.offset..dst.offset + len],
            )
        }
    }
}

// ======================================================================
// FUNCTIONS - CRATE

/// `dst ^= src`, word at a time when both are 8-byte aligned.
pub(crate) fn xor(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());

    if let (Ok(d), Ok(s)) = (
        bytemuck::try_cast_slice_mut::<u8, u64>(dst),
        bytemuck::try_cast_slice::<u8, u64>(src),
    ) {
        for (d, s) in d.iter_mut().zip(s) {
            *d ^= s;
        }
        return;
    }

    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

// ======================================================================
// TESTS
