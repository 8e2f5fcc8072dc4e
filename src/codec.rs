//! Image file boundary: decode to and encode from [`PixelBuffer`].
//!
//! Files are read as 8-bit luma, row 0 at the top, and widened to `f32`
//! samples in `0.0..=255.0`. Encoding clamps to that range and truncates.

use std::path::Path;

use image::{GrayImage, Luma};
use log::debug;

use crate::buffer::{PixelBuffer, Sample};
use crate::error::{Error, Result};

/// Reads `path` into a `rows x cols` buffer (`rows` = image height).
pub fn decode(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let luma = image::open(path)?.into_luma8();
    let (width, height) = luma.dimensions();
    let (rows, cols) = (height as usize, width as usize);
    debug!("decoded {} as {rows}x{cols}", path.display());

    let data = luma.into_raw().into_iter().map(Sample::from).collect();
    PixelBuffer::from_vec(rows, cols, data)
}

/// Writes `buffer` to `path` as 8-bit luma. The format follows the extension.
///
/// When `reference` is given it must be an image with the same extent as
/// `buffer`, e.g. the file the buffer was decoded from.
pub fn encode(
    buffer: &PixelBuffer,
    path: impl AsRef<Path>,
    reference: Option<&Path>,
) -> Result<()> {
    let path = path.as_ref();
    let (rows, cols) = (buffer.rows(), buffer.cols());

    if let Some(reference) = reference {
        let (ref_width, ref_height) = image::image_dimensions(reference)?;
        let (ref_rows, ref_cols) = (ref_height as usize, ref_width as usize);
        if (ref_rows, ref_cols) != (rows, cols) {
            return Err(Error::ReferenceMismatch {
                path: reference.to_path_buf(),
                rows,
                cols,
                ref_rows,
                ref_cols,
            });
        }
    }

    let width = u32::try_from(cols).map_err(|_| Error::Allocation { rows, cols })?;
    let height = u32::try_from(rows).map_err(|_| Error::Allocation { rows, cols })?;
    let luma = GrayImage::from_fn(width, height, |x, y| {
        Luma([to_u8(buffer.at(y as usize, x as usize))])
    });
    luma.save(path)?;
    debug!("encoded {rows}x{cols} to {}", path.display());
    Ok(())
}

/// Clamps to `0..=255` and truncates. NaN maps to 0.
fn to_u8(sample: Sample) -> u8 {
    sample.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_u8_clamps_and_truncates() {
        assert_eq!(to_u8(-3.0), 0);
        assert_eq!(to_u8(12.9), 12);
        assert_eq!(to_u8(1234.0), 255);
        assert_eq!(to_u8(f32::NAN), 0);
    }
}
