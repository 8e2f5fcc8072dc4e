//! Shared helpers for benchmark drivers and tests.

use crate::{PixelBuffer, Sample};

pub const BENCH_SIZES: [usize; 4] = [256, 512, 1024, 2048];
pub const BENCH_ANGLES: [f64; 5] = [-45.0, 15.0, 30.0, 90.0, 180.0];

/// Buffer whose sample at linear offset `i` is `i`, so every pixel is distinct.
pub fn create_ramp_buffer(rows: usize, cols: usize) -> PixelBuffer {
    let data = (0..rows * cols).map(|i| i as Sample).collect();
    PixelBuffer::from_vec(rows, cols, data).expect("ramp buffer")
}

/// Gradient in `0..=255`, shaped like a decoded 8-bit image.
pub fn create_test_buffer(rows: usize, cols: usize) -> PixelBuffer {
    let mut buf = PixelBuffer::new(rows, cols).expect("test buffer");
    for row in 0..rows {
        let samples = buf.row_mut(row);
        for (col, sample) in samples.iter_mut().enumerate() {
            let val = (col + row) as f64 / (rows + cols) as f64;
            *sample = (val * 255.0) as Sample;
        }
    }
    buf
}
