//! Batch driver: decode an image, scatter-rotate it, encode the result.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin scatter_rotate                       # ./Images/cat.bmp -> cat-rot.bmp, -45 deg
//! cargo run --release --bin scatter_rotate -- --angle 30 -i in.bmp -o out.bmp
//! cargo run --release --bin scatter_rotate -- --sequential       # single-threaded reference run
//! RUST_LOG=debug cargo run --bin scatter_rotate                  # extents, parameters, pool details
//! ```
//!
//! Console output is informational: the execution context, the kernel time in
//! seconds, and the output path. Any failure exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use scatter_rotate::{AllocationSetting, Error, ParallelDispatcher, RotateConfig, codec};

/// Rotate a grayscale image by scattering every pixel to its rotated address
#[derive(Parser, Debug)]
#[command(name = "scatter_rotate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rotation angle in degrees (default: -45)
    #[arg(short, long, value_name = "DEGREES", allow_negative_numbers = true)]
    angle: Option<f64>,

    /// Input image (default: ./Images/cat.bmp)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output image (default: cat-rot.bmp)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Value written to every destination cell before the kernel runs
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    sentinel: Option<f32>,

    /// Worker threads (default: one per core)
    #[arg(short = 'j', long, value_name = "N")]
    threads: Option<usize>,

    /// Run every work unit on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Request huge pages for the destination buffer
    #[arg(long)]
    huge_pages: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut RotateConfig) {
        if let Some(angle) = self.angle {
            config.angle_degrees = angle;
        }
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(sentinel) = self.sentinel {
            config.sentinel = sentinel;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if self.sequential {
            config.sequential = true;
        }
        if self.huge_pages {
            config.allocation = AllocationSetting::HugePages;
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(Error::Dispatch(_)) = err.downcast_ref::<Error>() {
                println!("An exception was caught while rotating the image.");
            }
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = RotateConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate()?;

    let src = codec::decode(&config.input)
        .with_context(|| format!("failed to read {}", config.input.display()))?;
    println!("imageRows={}, imageCols={}", src.rows(), src.cols());

    let dispatcher = config.dispatcher()?;
    println!("Running on device: {}", dispatcher.context());

    let rotated = config.operator().apply(&dispatcher, &src)?;
    println!("{} seconds", rotated.elapsed.as_secs_f64());
    info!(
        "{} of {} cells hold the sentinel",
        rotated.sentinel_cells,
        rotated.output.len()
    );

    codec::encode(&rotated.output, &config.output, Some(&config.input))
        .with_context(|| format!("failed to write {}", config.output.display()))?;
    println!("Output image saved as: {}", config.output.display());
    Ok(())
}
