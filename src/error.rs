//! Error taxonomy shared by every stage of a rotation run.
//!
//! Out-of-bounds destinations and write collisions are defined kernel behavior
//! and never show up here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot allocate a {rows}x{cols} pixel buffer")]
    Allocation { rows: usize, cols: usize },

    #[error("pixel data has {got} samples, expected {rows}x{cols} = {expected}")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        got: usize,
    },

    #[error("destination is {dst_rows}x{dst_cols} but source is {src_rows}x{src_cols}")]
    DimensionMismatch {
        src_rows: usize,
        src_cols: usize,
        dst_rows: usize,
        dst_cols: usize,
    },

    #[error("no usable execution context: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("kernel dispatch faulted: {0}")]
    Dispatch(String),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error(
        "reference image {} is {ref_cols}x{ref_rows} (WxH) but buffer is {cols}x{rows}",
        path.display()
    )]
    ReferenceMismatch {
        path: PathBuf,
        rows: usize,
        cols: usize,
        ref_rows: usize,
        ref_cols: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
