//! Host-side driver for a single scatter rotation.
//!
//! # Run Overview
//!
//! 1. **Parameters**: cos/sin are computed once from the configured angle.
//! 2. **Destination**: a buffer with the source extent is allocated and filled
//!    with the sentinel so unreached cells stay recognizable.
//! 3. **Dispatch**: the execution context is reported, then the
//!    [`ScatterKernel`] runs synchronously. Only this call is timed.
//! 4. **Fault boundary**: a panic in any work unit is caught here, once, and
//!    surfaced as [`Error::Dispatch`]. There is no retry.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::buffer::{BufferAllocation, PixelBuffer, Sample};
use crate::dispatch::{ExecutionContext, ParallelDispatcher};
use crate::error::{Error, Result};
use crate::kernel::{ScatterKernel, ensure_same_extent};
use crate::transform::RotationParameters;

/// Default rotation angle in degrees.
pub const DEFAULT_ANGLE_DEGREES: f64 = -45.0;

/// Default fill value for destination cells no unit writes.
pub const DEFAULT_SENTINEL: Sample = 1234.0;

/// Result of one rotation run.
#[derive(Clone, Debug)]
pub struct RotationRun {
    pub output: PixelBuffer,
    /// Wall time of the kernel call only.
    pub elapsed: Duration,
    pub context: ExecutionContext,
    /// Destination cells whose bits equal the sentinel after the run.
    ///
    /// Includes cells a unit wrote with a sample equal to the sentinel, so it
    /// is an upper bound on the cells no unit reached.
    pub sentinel_cells: usize,
}

/// Scatter rotation operator.
///
/// ```
/// use scatter_rotate::{OpScatterRotate, PixelBuffer, SequentialDispatcher};
///
/// let src = PixelBuffer::filled(8, 8, 1.0).unwrap();
/// let mut rotate = OpScatterRotate::new();
/// rotate.set_rotation(-45.0).set_sentinel(0.0);
/// let run = rotate.apply(&SequentialDispatcher, &src).unwrap();
/// assert_eq!(run.output.len(), 64);
/// ```
#[derive(Clone, Debug)]
pub struct OpScatterRotate {
    angle_degrees: f64,
    params: RotationParameters,
    sentinel: Sample,
    allocation: BufferAllocation,
}

impl Default for OpScatterRotate {
    fn default() -> Self {
        Self::new()
    }
}

impl OpScatterRotate {
    pub fn new() -> Self {
        Self {
            angle_degrees: DEFAULT_ANGLE_DEGREES,
            params: RotationParameters::from_degrees(DEFAULT_ANGLE_DEGREES),
            sentinel: DEFAULT_SENTINEL,
            allocation: BufferAllocation::default(),
        }
    }

    /// Sets the rotation angle. Not normalized: 405° and 45° differ only by
    /// the rounding of their trigonometry.
    pub fn set_rotation(&mut self, angle_degrees: f64) -> &mut Self {
        self.angle_degrees = angle_degrees;
        self.params = RotationParameters::from_degrees(angle_degrees);
        self
    }

    /// Uses an explicit cos/sin pair instead of an angle.
    pub fn set_rotation_parameters(&mut self, params: RotationParameters) -> &mut Self {
        self.angle_degrees = f64::from(params.sin())
            .atan2(f64::from(params.cos()))
            .to_degrees();
        self.params = params;
        self
    }

    pub fn set_sentinel(&mut self, sentinel: Sample) -> &mut Self {
        self.sentinel = sentinel;
        self
    }

    pub fn set_allocation(&mut self, allocation: BufferAllocation) -> &mut Self {
        self.allocation = allocation;
        self
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    pub fn params(&self) -> &RotationParameters {
        &self.params
    }

    pub fn sentinel(&self) -> Sample {
        self.sentinel
    }

    /// Allocates a sentinel-filled destination and rotates `src` into it.
    pub fn apply<D: ParallelDispatcher>(
        &self,
        dispatcher: &D,
        src: &PixelBuffer,
    ) -> Result<RotationRun> {
        let mut output = PixelBuffer::filled_with_allocation(
            src.rows(),
            src.cols(),
            self.sentinel,
            self.allocation,
        )?;
        let context = dispatcher.context();
        let elapsed = self.dispatch(dispatcher, &context, src, &mut output)?;
        let sentinel_cells = output.count_equal(self.sentinel);
        debug!(
            "{sentinel_cells} of {} destination cells hold the sentinel",
            output.len()
        );
        Ok(RotationRun {
            output,
            elapsed,
            context,
            sentinel_cells,
        })
    }

    /// Refills `dst` with the sentinel and rotates `src` into it.
    ///
    /// Returns the kernel wall time. `dst` is left untouched when its extent
    /// differs from `src`.
    pub fn apply_to_preallocated<D: ParallelDispatcher>(
        &self,
        dispatcher: &D,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
    ) -> Result<Duration> {
        ensure_same_extent(src, dst)?;
        dst.fill(self.sentinel);
        let context = dispatcher.context();
        self.dispatch(dispatcher, &context, src, dst)
    }

    fn dispatch<D: ParallelDispatcher>(
        &self,
        dispatcher: &D,
        context: &ExecutionContext,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
    ) -> Result<Duration> {
        info!(
            "rotating {}x{} by {:.3} deg on {context}",
            src.rows(),
            src.cols(),
            self.angle_degrees
        );
        let kernel = ScatterKernel::new(self.params);

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| kernel.run(dispatcher, src, dst)));
        let elapsed = start.elapsed();

        match outcome {
            Ok(result) => result?,
            Err(payload) => return Err(Error::Dispatch(panic_message(payload.as_ref()))),
        }
        info!("kernel finished in {:.6} s", elapsed.as_secs_f64());
        Ok(elapsed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "work unit panicked".to_string()
    }
}
