//! Scatter kernel: one work unit per source pixel.
//!
//! Each unit reads its own source sample, rotates its coordinate and, if the
//! destination lands inside the raster, writes the sample there. Units share
//! nothing but the read-only source and the destination cells.
//!
//! # Collisions
//!
//! Several source pixels can truncate to the same destination. Every such
//! unit stores its sample and the last store to land wins. Which unit that is
//! depends on the dispatcher's scheduling and is unspecified.

use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::buffer::{PixelBuffer, Sample};
use crate::dispatch::ParallelDispatcher;
use crate::error::{Error, Result};
use crate::transform::{RotationParameters, destination_offset};

const _: () = assert!(align_of::<AtomicU32>() == align_of::<Sample>());
const _: () = assert!(size_of::<AtomicU32>() == size_of::<Sample>());

/// Shared, write-only view of the destination during the scatter phase.
///
/// Stores are relaxed: there is no read-modify-write and no ordering between
/// units, only a defined last-writer-wins race.
struct ScatterTarget<'a> {
    cells: &'a [AtomicU32],
}

impl<'a> ScatterTarget<'a> {
    fn new(samples: &'a mut [Sample]) -> Self {
        // SAFETY: size and alignment match (checked above), every bit pattern
        // is a valid u32, and the exclusive borrow rules out any non-atomic
        // access for as long as the view lives.
        let cells = unsafe { &*(samples as *mut [Sample] as *const [AtomicU32]) };
        Self { cells }
    }

    #[inline]
    fn store(&self, offset: usize, value: Sample) {
        self.cells[offset].store(value.to_bits(), Ordering::Relaxed);
    }
}

/// The rotation kernel as an explicit function object.
///
/// Holds only the rotation parameters; buffers and the dispatch substrate are
/// supplied per run.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScatterKernel {
    params: RotationParameters,
}

impl ScatterKernel {
    pub fn new(params: RotationParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RotationParameters {
        &self.params
    }

    /// Scatters every pixel of `src` into `dst`.
    ///
    /// Cells of `dst` that no unit reaches keep whatever they held before.
    /// Blocks until the dispatcher reports every unit finished.
    pub fn run<D: ParallelDispatcher>(
        &self,
        dispatcher: &D,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
    ) -> Result<()> {
        ensure_same_extent(src, dst)?;

        let (rows, cols) = (src.rows(), src.cols());
        debug!(
            "scatter {rows}x{cols}, cos={}, sin={}",
            self.params.cos(),
            self.params.sin()
        );

        let source = src.as_slice();
        let target = ScatterTarget::new(dst.as_mut_slice());
        let params = self.params;

        dispatcher.for_each_2d(rows, cols, |row, col| {
            scatter_unit(source, &target, rows, cols, &params, row, col);
        });
        Ok(())
    }
}

/// Fails with [`Error::DimensionMismatch`] unless both buffers are `rows x cols` alike.
pub(crate) fn ensure_same_extent(src: &PixelBuffer, dst: &PixelBuffer) -> Result<()> {
    if src.rows() != dst.rows() || src.cols() != dst.cols() {
        return Err(Error::DimensionMismatch {
            src_rows: src.rows(),
            src_cols: src.cols(),
            dst_rows: dst.rows(),
            dst_cols: dst.cols(),
        });
    }
    Ok(())
}

#[inline]
fn scatter_unit(
    source: &[Sample],
    target: &ScatterTarget<'_>,
    rows: usize,
    cols: usize,
    params: &RotationParameters,
    row: usize,
    col: usize,
) {
    let value = source[cols * row + col];
    if let Some(offset) = destination_offset(row, col, rows, cols, params) {
        target.store(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{RayonDispatcher, SequentialDispatcher};

    fn ramp(rows: usize, cols: usize) -> PixelBuffer {
        let data = (0..rows * cols).map(|i| i as Sample).collect();
        PixelBuffer::from_vec(rows, cols, data).expect("ramp")
    }

    #[test]
    fn test_mismatched_destination_is_rejected() {
        let src = ramp(4, 4);
        let mut dst = PixelBuffer::filled(4, 5, 0.0).expect("dst");
        let err = ScatterKernel::default()
            .run(&SequentialDispatcher, &src, &mut dst)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_identity_parameters_transpose_square_raster() {
        // (row, col) -> x2 = row, y2 = col -> offset cols * col + row
        let src = ramp(3, 3);
        let mut dst = PixelBuffer::filled(3, 3, -1.0).expect("dst");
        ScatterKernel::default()
            .run(&SequentialDispatcher, &src, &mut dst)
            .expect("run");
        assert_eq!(
            dst.as_slice(),
            &[0.0, 3.0, 6.0, 1.0, 4.0, 7.0, 2.0, 5.0, 8.0]
        );
    }

    #[test]
    fn test_quarter_turn_keeps_only_first_row() {
        // (0, col) -> offset col; every other row lands at y2 < 0.
        let src = ramp(2, 2);
        let mut dst = PixelBuffer::filled(2, 2, 9.0).expect("dst");
        ScatterKernel::new(RotationParameters::from_cos_sin(0.0, 1.0))
            .run(&SequentialDispatcher, &src, &mut dst)
            .expect("run");
        assert_eq!(dst.as_slice(), &[0.0, 1.0, 9.0, 9.0]);
    }

    #[test]
    fn test_nan_samples_are_carried_bitwise() {
        let mut src = ramp(1, 1);
        src.set(0, 0, f32::NAN);
        let mut dst = PixelBuffer::filled(1, 1, 0.0).expect("dst");
        ScatterKernel::default()
            .run(&RayonDispatcher::new(), &src, &mut dst)
            .expect("run");
        assert!(dst.at(0, 0).is_nan());
    }
}
