//! Origin-anchored rotation of integer pixel coordinates.
//!
//! For a source coordinate `(x1, y1) = (row, col)` the destination is
//!
//! ```text
//! x2 = trunc( cos * x1 + sin * y1)
//! y2 = trunc(-sin * x1 + cos * y1)
//! ```
//!
//! The pivot is pinned at `(0, 0)`; nothing is re-centered on the image
//! midpoint and angles are not normalized. Truncation is toward zero, never
//! rounding, so output addresses are reproducible bit for bit.

/// Cosine/sine pair of a rotation angle, computed once per run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotationParameters {
    cos: f32,
    sin: f32,
}

impl RotationParameters {
    /// Builds the pair from a signed angle in degrees.
    ///
    /// Trigonometry is evaluated in `f64` and narrowed to `f32`.
    pub fn from_degrees(angle_degrees: f64) -> Self {
        let radians = angle_degrees.to_radians();
        Self {
            cos: radians.cos() as f32,
            sin: radians.sin() as f32,
        }
    }

    /// Builds the pair from explicit values, e.g. the exact quarter turn `(0.0, 1.0)`.
    pub fn from_cos_sin(cos: f32, sin: f32) -> Self {
        Self { cos, sin }
    }

    pub fn cos(&self) -> f32 {
        self.cos
    }

    pub fn sin(&self) -> f32 {
        self.sin
    }

    /// Parameters of the opposite rotation.
    pub fn inverse(&self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }
}

impl Default for RotationParameters {
    fn default() -> Self {
        Self { cos: 1.0, sin: 0.0 }
    }
}

/// Maps `(x1, y1)` to its truncated destination `(x2, y2)`.
///
/// The x term is accumulated in `f32`. The y term negates `sin` in `f64` and
/// is narrowed to `f32` before truncation; reference output depends on that
/// mixed precision.
#[inline]
pub fn rotate_point(x1: i32, y1: i32, params: &RotationParameters) -> (i32, i32) {
    let (fx, fy) = (x1 as f32, y1 as f32);
    let x_rotated = params.cos * fx + params.sin * fy;
    let y_rotated = (-f64::from(params.sin) * f64::from(fx) + f64::from(params.cos * fy)) as f32;
    (x_rotated as i32, y_rotated as i32)
}

/// Destination offset for source pixel `(row, col)` of a `rows x cols` raster.
///
/// Returns `None` unless `0 <= x2 < cols` and `0 <= y2 < rows`. Note that x2
/// is bounded by the column count and y2 by the row count, and the offset is
/// `cols * y2 + x2`. Coordinates beyond `i32::MAX` are treated as out of
/// bounds.
#[inline]
pub fn destination_offset(
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
    params: &RotationParameters,
) -> Option<usize> {
    let (Ok(x1), Ok(y1)) = (i32::try_from(row), i32::try_from(col)) else {
        return None;
    };
    let (x2, y2) = rotate_point(x1, y1, params);
    if x2 < 0 || y2 < 0 {
        return None;
    }
    let (x2, y2) = (x2 as usize, y2 as usize);
    if x2 < cols && y2 < rows {
        Some(cols * y2 + x2)
    } else {
        None
    }
}
