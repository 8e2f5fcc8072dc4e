//! Single-channel float raster with row-major storage.
//!
//! # Memory Layout
//!
//! Samples are stored in a flat `f32` buffer in row-major order:
//!
//! ```text
//! data[row * cols + col]
//! ```
//!
//! The length of the backing store is always exactly `rows * cols`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use log::{debug, warn};

use crate::error::{Error, Result};

/// A single pixel sample.
pub type Sample = f32;

/// Allocation strategy for pixel buffers.
///
/// The default uses huge pages on macOS/Linux and standard pages elsewhere.
/// `HugePages` is best-effort: it falls back to standard pages if the OS
/// cannot satisfy the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferAllocation {
    Standard,
    HugePages,
}

impl Default for BufferAllocation {
    fn default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "linux")) {
            BufferAllocation::HugePages
        } else {
            BufferAllocation::Standard
        }
    }
}

pub(crate) enum SampleStore {
    Vec(Vec<Sample>),
    Mmap {
        ptr: NonNull<Sample>,
        len: usize,
        bytes: usize,
    },
}

// SAFETY: the mapping is owned exclusively by this store and unmapped on drop.
unsafe impl Send for SampleStore {}
unsafe impl Sync for SampleStore {}

impl SampleStore {
    fn empty() -> Self {
        SampleStore::Vec(Vec::new())
    }

    /// Allocates `len` samples, all set to `value`.
    fn filled(len: usize, value: Sample, allocation: BufferAllocation) -> Option<Self> {
        if len == 0 {
            return Some(SampleStore::empty());
        }
        if allocation == BufferAllocation::HugePages {
            if let Some(mut store) = try_huge_pages(len) {
                // Anonymous mappings come back zeroed.
                if value.to_bits() != 0 {
                    store.as_mut_slice().fill(value);
                }
                return Some(store);
            }
            if len.saturating_mul(size_of::<Sample>()) >= HUGE_PAGE_MIN_BYTES {
                warn!("huge page mapping unavailable for {len} samples, using the heap");
            }
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, value);
        Some(SampleStore::Vec(data))
    }

    pub(crate) fn as_slice(&self) -> &[Sample] {
        match self {
            SampleStore::Vec(data) => data.as_slice(),
            SampleStore::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Sample] {
        match self {
            SampleStore::Vec(data) => data.as_mut_slice(),
            SampleStore::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
        }
    }
}

impl Deref for SampleStore {
    type Target = [Sample];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for SampleStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_slice().fmt(f)
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        if let SampleStore::Mmap { ptr, bytes, .. } = self {
            #[cfg(any(target_os = "macos", target_os = "linux"))]
            unsafe {
                libc::munmap(ptr.as_ptr() as *mut libc::c_void, *bytes);
            }
            #[cfg(not(any(target_os = "macos", target_os = "linux")))]
            let _ = (ptr, bytes);
        }
    }
}

const HUGE_PAGE_MIN_BYTES: usize = 2 * 1024 * 1024;

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 {
        return None;
    }
    let rem = value % alignment;
    if rem == 0 {
        Some(value)
    } else {
        value.checked_add(alignment - rem)
    }
}

#[cfg(target_os = "linux")]
fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

#[cfg(target_os = "macos")]
const VM_FLAGS_SUPERPAGE_SIZE_2MB: libc::c_int = 0x00020000;

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn try_huge_pages(len: usize) -> Option<SampleStore> {
    let byte_len = len.checked_mul(size_of::<Sample>())?;
    if byte_len < HUGE_PAGE_MIN_BYTES {
        return None;
    }

    #[cfg(target_os = "linux")]
    let (alloc_bytes, fd) = (align_up(byte_len, page_size())?, -1);
    #[cfg(target_os = "macos")]
    let (alloc_bytes, fd) = (
        align_up(byte_len, HUGE_PAGE_MIN_BYTES)?,
        VM_FLAGS_SUPERPAGE_SIZE_2MB,
    );

    let map_ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            alloc_bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            fd,
            0,
        )
    };
    if map_ptr == libc::MAP_FAILED {
        return None;
    }
    #[cfg(target_os = "linux")]
    unsafe {
        libc::madvise(map_ptr, alloc_bytes, libc::MADV_HUGEPAGE);
    }
    let ptr = match NonNull::new(map_ptr as *mut Sample) {
        Some(ptr) => ptr,
        None => {
            unsafe {
                libc::munmap(map_ptr, alloc_bytes);
            }
            return None;
        }
    };
    Some(SampleStore::Mmap {
        ptr,
        len,
        bytes: alloc_bytes,
    })
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn try_huge_pages(_len: usize) -> Option<SampleStore> {
    None
}

/// A 2D single-channel raster of `f32` samples in row-major order.
///
/// Sample `(row, col)` lives at linear offset `row * cols + col`. The backing
/// store always holds exactly `rows * cols` samples; there is no stride padding.
#[derive(Debug)]
pub struct PixelBuffer {
    rows: usize,
    cols: usize,
    allocation: BufferAllocation,
    pub(crate) data: SampleStore,
}

impl Clone for PixelBuffer {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            allocation: BufferAllocation::Standard,
            data: SampleStore::Vec(self.data.to_vec()),
        }
    }
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && *self.data == *other.data
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl PixelBuffer {
    /// Creates a buffer with no extent.
    pub fn new_empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            allocation: BufferAllocation::Standard,
            data: SampleStore::empty(),
        }
    }

    /// Creates a zero-initialized buffer.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::filled_with_allocation(rows, cols, 0.0, BufferAllocation::default())
    }

    /// Creates a buffer with every sample set to `value`.
    pub fn filled(rows: usize, cols: usize, value: Sample) -> Result<Self> {
        Self::filled_with_allocation(rows, cols, value, BufferAllocation::default())
    }

    /// Creates a buffer with every sample set to `value` using a specific allocation strategy.
    pub fn filled_with_allocation(
        rows: usize,
        cols: usize,
        value: Sample,
        allocation: BufferAllocation,
    ) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or(Error::Allocation { rows, cols })?;
        let data =
            SampleStore::filled(len, value, allocation).ok_or(Error::Allocation { rows, cols })?;
        debug!("allocated {rows}x{cols} buffer ({allocation:?})");
        Ok(Self {
            rows,
            cols,
            allocation,
            data,
        })
    }

    /// Wraps existing row-major samples. Fails unless `data.len() == rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<Sample>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or(Error::Allocation { rows, cols })?;
        if data.len() != expected {
            return Err(Error::LengthMismatch {
                rows,
                cols,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            allocation: BufferAllocation::Standard,
            data: SampleStore::Vec(data),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of samples (`rows * cols`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the allocation strategy requested when this buffer was created.
    pub fn allocation(&self) -> BufferAllocation {
        self.allocation
    }

    /// Linear offset of `(row, col)`. Does not check bounds.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Returns the sample at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<Sample> {
        if row < self.rows && col < self.cols {
            Some(self.data[self.index(row, col)])
        } else {
            None
        }
    }

    /// Returns the sample at `(row, col)`. Panics when out of bounds.
    pub fn at(&self, row: usize, col: usize) -> Sample {
        assert!(
            row < self.rows && col < self.cols,
            "({row}, {col}) outside {}x{} buffer",
            self.rows,
            self.cols
        );
        self.data[self.index(row, col)]
    }

    /// Writes the sample at `(row, col)`. Panics when out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: Sample) {
        assert!(
            row < self.rows && col < self.cols,
            "({row}, {col}) outside {}x{} buffer",
            self.rows,
            self.cols
        );
        let index = self.index(row, col);
        self.data[index] = value;
    }

    /// Returns the samples of row `row`.
    pub fn row(&self, row: usize) -> &[Sample] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Returns mutable samples of row `row`.
    pub fn row_mut(&mut self, row: usize) -> &mut [Sample] {
        let start = row * self.cols;
        let end = start + self.cols;
        &mut self.data[start..end]
    }

    /// Overwrites every sample with `value`.
    pub fn fill(&mut self, value: Sample) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[Sample] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        self.data.as_mut_slice()
    }

    /// Number of samples whose bit pattern equals `value`.
    ///
    /// Compares bits rather than values so a NaN sentinel can be counted.
    pub fn count_equal(&self, value: Sample) -> usize {
        let bits = value.to_bits();
        self.data.iter().filter(|s| s.to_bits() == bits).count()
    }

    /// Consumes the buffer and returns the row-major samples.
    pub fn into_vec(self) -> Vec<Sample> {
        let mut store = self.data;
        if let SampleStore::Vec(data) = &mut store {
            return std::mem::take(data);
        }
        store.to_vec()
    }
}
