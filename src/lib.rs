//! Data-parallel scatter rotation of single-channel float rasters.
//!
//! # Scatter Design
//!
//! Every source pixel is an independent work unit. A unit rotates its own
//! `(row, col)` about the origin, truncates the result to an integer address
//! and, if that address is inside the raster, writes its sample there. The
//! destination starts out filled with a sentinel so cells that no unit reaches
//! are easy to spot.
//!
//! - [`PixelBuffer`]: row-major `f32` raster, `rows * cols` samples.
//! - [`RotationParameters`] / [`rotate_point`]: the truncating transform.
//! - [`ParallelDispatcher`]: the execution substrate (rayon pool or sequential).
//! - [`ScatterKernel`]: per-unit logic, independent of the substrate.
//! - [`OpScatterRotate`]: allocates, fills, dispatches and times a run.
//!
//! Collisions are last-writer-wins with no ordering between units.
//!
//! # Example
//!
//! ```
//! use scatter_rotate::{OpScatterRotate, PixelBuffer, RayonDispatcher};
//!
//! let src = PixelBuffer::filled(64, 64, 128.0).unwrap();
//!
//! let mut rotate = OpScatterRotate::new();
//! rotate.set_rotation(-45.0);
//! let run = rotate.apply(&RayonDispatcher::new(), &src).unwrap();
//!
//! assert_eq!(run.output.len(), 64 * 64);
//! println!("{} cells hold the sentinel after {:?}", run.sentinel_cells, run.elapsed);
//! ```

#[doc(hidden)]
pub mod bench_utils;
mod buffer;
pub mod codec;
pub mod config;
mod dispatch;
mod error;
mod kernel;
mod op_scatter_rotate;
mod transform;

pub use crate::buffer::{BufferAllocation, PixelBuffer, Sample};
pub use crate::config::{AllocationSetting, RotateConfig};
pub use crate::dispatch::{
    Dispatcher, ExecutionContext, ParallelDispatcher, RayonDispatcher, SequentialDispatcher,
};
pub use crate::error::{Error, Result};
pub use crate::kernel::ScatterKernel;
pub use crate::op_scatter_rotate::{
    DEFAULT_ANGLE_DEGREES, DEFAULT_SENTINEL, OpScatterRotate, RotationRun,
};
pub use crate::transform::{RotationParameters, destination_offset, rotate_point};
