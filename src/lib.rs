//! vplenc - encode raw video frames and record per-frame statistics.
//!
//! The crate drives an encode session from [`vplenc_codec`] over a flat file
//! of raw frames, writes the encoded bitstream, and can emit a JSON report
//! with the size, type and encode time of every frame.
//!
//! # Quick Start
//!
//! ```ignore
//! use vplenc::{run, CliArgs, EncodeConfig};
//! use clap::Parser;
//!
//! let config = EncodeConfig::from_args(CliArgs::parse())?;
//! let outcome = run(&config)?;
//! println!("{} frames -> {}", outcome.frames, outcome.output_path.display());
//! ```
//!
//! # Feature Flags
//!
//! - `onevpl` - Software and hardware encoding on the Intel oneVPL runtime
//! - `openh264` - Software AVC encoding through OpenH264

pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod statistics;

pub use config::{CliArgs, EncodeConfig, FileConfig};
pub use encoder::VideoEncoder;
pub use error::EncodeError;
pub use pipeline::{encode_loop, run, run_with, EncodedOutput, LoopOptions, RunOutcome};
pub use report::{EncodingSettings, FrameEntry, ReportDocument, ReportSummary};
pub use statistics::{FrameRecord, FrameSample, RunMetadata, Statistics, StatsError};

pub use vplenc_codec as codec;
