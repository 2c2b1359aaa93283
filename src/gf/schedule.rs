use crate::{
    gf::{Bitmatrix, Field, Matrix, Regions, Slot},
    Error,
};

// ======================================================================
// Packet - PUBLIC

/// Source packet of an [`Op`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packet {
    /// Input bit-column `j * w + x`, i.e. packet `x` of input symbol `j`.
    Input(usize),
    /// Already computed output bit-row `i * w + l`.
    Output(usize),
}

// ======================================================================
// Op - PUBLIC

/// One packet operation of a [`Schedule`].
///
/// `dst` is output bit-row `i * w + l`, i.e. packet `l` of output symbol `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// `dst = src`
    Copy {
        /// Source packet.
        src: Packet,
        /// Destination bit-row.
        dst: usize,
    },
    /// `dst ^= src`
    Xor {
        /// Source packet.
        src: Packet,
        /// Destination bit-row.
        dst: usize,
    },
    /// `dst = 0`
    Zero {
        /// Destination bit-row.
        dst: usize,
    },
}

// ======================================================================
// Schedule - PUBLIC

/// Ordered packet operations computing a bitmatrix-vector product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    w: usize,
    rows: usize,
    cols: usize,
    ops: Vec<Op>,
}

impl Schedule {
    /// Returns operations in execution order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Runs this schedule with `inputs.len() == cols` input symbols
    /// and `outputs.len() == rows` output symbols, all `size` bytes.
    ///
    /// # Panics
    ///
    /// If slot counts don't match or `size` is not a multiple of `w`.
    pub fn run(&self, regions: &mut Regions, inputs: &[Slot], outputs: &[Slot], size: usize) {
        assert_eq!(inputs.len(), self.cols);
        assert_eq!(outputs.len(), self.rows);
        assert_eq!(size % self.w, 0);

        let w = self.w;
        let packet = size / w;
        let locate = |slots: &[Slot], bit: usize| slots[bit / w].add((bit % w) * packet);

        for op in &self.ops {
            match *op {
                Op::Copy { src, dst } => {
                    let src = match src {
                        Packet::Input(c) => locate(inputs, c),
                        Packet::Output(r) => locate(outputs, r),
                    };
                    regions.copy(src, locate(outputs, dst), packet);
                }
                Op::Xor { src, dst } => {
                    let src = match src {
                        Packet::Input(c) => locate(inputs, c),
                        Packet::Output(r) => locate(outputs, r),
                    };
                    regions.xor(src, locate(outputs, dst), packet);
                }
                Op::Zero { dst } => regions.zero(locate(outputs, dst), packet),
            }
        }
    }

    /// Creates schedule which computes each output bit-row either from
    /// inputs or from an earlier output bit-row, whichever needs fewer XORs.
    ///
    /// Bit-rows are computed in order of increasing cost, so cheap rows
    /// become starting points of similar rows.
    pub fn smart(bitmatrix: &Bitmatrix) -> Self {
        let w = bitmatrix.w();
        let bit_rows = bitmatrix.rows() * w;

        let mut diff: Vec<usize> = (0..bit_rows)
            .map(|r| bitmatrix.bit_row(r).count_ones(..))
            .collect();
        let mut from: Vec<Option<usize>> = vec![None; bit_rows];
        let mut remaining: Vec<usize> = (0..bit_rows).collect();
        let mut ops = Vec::new();

        while let Some(pos) = (0..remaining.len()).min_by_key(|&p| diff[remaining[p]]) {
            let row = remaining.remove(pos);
            let bits = bitmatrix.bit_row(row);

            match from[row] {
                Some(prev) => {
                    ops.push(Op::Copy {
                        src: Packet::Output(prev),
                        dst: row,
                    });
                    for c in bits.symmetric_difference(bitmatrix.bit_row(prev)) {
                        ops.push(Op::Xor {
                            src: Packet::Input(c),
                            dst: row,
                        });
                    }
                }
                None => {
                    let mut ones = bits.ones();
                    match ones.next() {
                        Some(first) => {
                            ops.push(Op::Copy {
                                src: Packet::Input(first),
                                dst: row,
                            });
                            for c in ones {
                                ops.push(Op::Xor {
                                    src: Packet::Input(c),
                                    dst: row,
                                });
                            }
                        }
                        None => ops.push(Op::Zero { dst: row }),
                    }
                }
            }

            for &r in &remaining {
                let cost = bitmatrix.bit_row(r).symmetric_difference(bits).count() + 1;
                if cost < diff[r] {
                    diff[r] = cost;
                    from[r] = Some(row);
                }
            }
        }

        Self {
            w,
            rows: bitmatrix.rows(),
            cols: bitmatrix.cols(),
            ops,
        }
    }

    /// Returns number of XOR operations.
    pub fn xor_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Xor { .. }))
            .count()
    }
}

// ======================================================================
// CodingMatrix - PUBLIC

/// [`Matrix`] together with its [`Bitmatrix`] and smart [`Schedule`].
#[derive(Clone, Debug)]
pub struct CodingMatrix {
    field: Field,
    matrix: Matrix,
    bitmatrix: Bitmatrix,
    schedule: Schedule,
}

impl CodingMatrix {
    /// Returns bitmatrix.
    pub fn bitmatrix(&self) -> &Bitmatrix {
        &self.bitmatrix
    }

    /// Computes `outputs = matrix * inputs` over symbols of `size` bytes.
    pub fn encode(&self, regions: &mut Regions, inputs: &[Slot], outputs: &[Slot], size: usize) {
        self.schedule.run(regions, inputs, outputs, size);
    }

    /// Returns field.
    pub fn field(&self) -> Field {
        self.field
    }

    /// Returns matrix.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Expands `matrix` and schedules it.
    pub fn new(field: Field, matrix: Matrix) -> Self {
        let bitmatrix = Bitmatrix::from_matrix(&matrix, field);
        let schedule = Schedule::smart(&bitmatrix);
        Self {
            field,
            matrix,
            bitmatrix,
            schedule,
        }
    }

    /// Returns schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Creates [`CodingMatrix`] of given rows.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self, Error> {
        Ok(Self::new(self.field, self.matrix.select_rows(rows)?))
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gf::GfElement, test_util};

    // Multiplies symbols bytewise using the packet layout directly.
    fn reference_product(
        field: Field,
        matrix: &Matrix,
        inputs: &[Vec<u8>],
        size: usize,
    ) -> Vec<Vec<u8>> {
        let w = field.w();
        let packet = size / w;
        let mut out = vec![vec![0u8; size]; matrix.rows()];
        for (i, out) in out.iter_mut().enumerate() {
            for (j, input) in inputs.iter().enumerate() {
                // element of input at byte position p, bit b, is given by
                // bits b of packets 0..w at offset p
                for p in 0..packet {
                    for b in 0..8 {
                        let mut e: GfElement = 0;
                        for x in 0..w {
                            e |= (((input[x * packet + p] >> b) & 1) as GfElement) << x;
                        }
                        let y = field.mul(matrix.get(i, j), e);
                        for l in 0..w {
                            out[l * packet + p] ^= (((y >> l) & 1) as u8) << b;
                        }
                    }
                }
            }
        }
        out
    }

    fn check(w: usize, rows: usize, cols: usize) {
        let field = Field::new(w).unwrap();
        let matrix = Matrix::cauchy(field, rows, cols).unwrap();
        let cm = CodingMatrix::new(field, matrix.clone());

        let size = w * 16;
        let inputs = test_util::generate_original(cols, size, w as u8);
        let mut outputs = vec![vec![0xaau8; size]; rows];

        let mut regions = Regions::new();
        let in_slots: Vec<_> = inputs.iter().map(|b| Slot::new(regions.push(b), 0)).collect();
        let out_slots: Vec<_> = outputs
            .iter_mut()
            .map(|b| Slot::new(regions.push_mut(b), 0))
            .collect();
        cm.encode(&mut regions, &in_slots, &out_slots, size);
        drop(regions);

        assert_eq!(outputs, reference_product(field, &matrix, &inputs, size));
    }

    #[test]
    fn schedule_matches_field_product() {
        check(4, 3, 5);
        check(8, 2, 4);
        check(16, 3, 3);
    }

    #[test]
    fn smart_schedule_is_not_worse_than_bitmatrix() {
        let field = Field::new(8).unwrap();
        let cm = CodingMatrix::new(field, Matrix::cauchy(field, 4, 6).unwrap());
        let ones = cm.bitmatrix().ones();
        let rows = 4 * 8;
        assert!(cm.schedule().xor_count() <= ones - rows);
    }

    #[test]
    fn zero_rows_are_zeroed() {
        let field = Field::new(8).unwrap();
        let cm = CodingMatrix::new(field, Matrix::zero(1, 2).unwrap());
        let input = [0x55u8; 64];
        let mut output = [0xffu8; 64];
        let mut regions = Regions::new();
        let a = regions.push(&input);
        let o = regions.push_mut(&mut output);
        cm.encode(
            &mut regions,
            &[Slot::new(a, 0), Slot::new(a, 0)],
            &[Slot::new(o, 0)],
            64,
        );
        drop(regions);
        assert_eq!(output, [0u8; 64]);
    }
}
