//! Run configuration: command-line flags, optional JSON file, and defaults.
//!
//! Values given on the command line win over the config file; anything set
//! in neither place falls back to the defaults below.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use serde::Deserialize;
use vplenc_codec::{
    lookup_chroma_format, lookup_codec, lookup_color_format, lookup_rate_control, ChromaFormat,
    Codec, ColorFormat, ExtParam, FrameParams, Implementation, RateControlMode,
};

use crate::error::EncodeError;
use crate::report::EncodingSettings;
use crate::statistics::RunMetadata;

/// Default frame rate in frames per second.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Command-line flags of `hello-encode`.
///
/// Every value is optional here so a config file can fill the gaps.
#[derive(Debug, Default, Parser)]
#[command(name = "hello-encode", version, about = "Encode raw frames and record per-frame statistics")]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Raw input file of concatenated frames
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Encoded output file (default: input path with the codec's extension)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Frame height in pixels
    #[arg(short = 'h', long)]
    pub height: Option<u32>,

    /// Frame width in pixels
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Frame rate in frames per second [default: 30]
    #[arg(short, long)]
    pub rate: Option<u32>,

    /// Codec: avc, hevc, mpeg2, vc1, capture, vp9, av1 [default: hevc]
    #[arg(short = 'c', long)]
    pub codec_type: Option<String>,

    /// Input pixel layout [default: i420 for software, nv12 for hardware]
    #[arg(long)]
    pub color_format: Option<String>,

    /// Chroma subsampling [default: yuv420]
    #[arg(long)]
    pub chroma_format: Option<String>,

    /// Rate control method: cbr, vbr, cqp, avbr, la, icq, vcm, la_icq, la_hrd, qvbr [default: cqp]
    #[arg(long)]
    pub bitrate_mode: Option<String>,

    /// Target bitrate in kbps
    #[arg(long)]
    pub bitrate: Option<u32>,

    /// Key frame distance in frames
    #[arg(long)]
    pub gop: Option<u32>,

    /// Use a hardware implementation
    #[arg(long)]
    pub use_hw: bool,

    /// Write the JSON statistics report to this path
    #[arg(long, value_name = "FILE")]
    pub stats: Option<PathBuf>,

    /// Run identifier written to the report
    #[arg(long)]
    pub id: Option<String>,

    /// Run description written to the report
    #[arg(long)]
    pub description: Option<String>,

    /// Test name written to the report
    #[arg(long)]
    pub test_name: Option<String>,

    /// Test definition reference written to the report
    #[arg(long)]
    pub test_definition: Option<String>,

    /// Load settings from a JSON file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Settings read from a `--config` JSON file. Keys mirror the long flags
/// with underscores.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub rate: Option<u32>,
    pub codec_type: Option<String>,
    pub color_format: Option<String>,
    pub chroma_format: Option<String>,
    pub bitrate_mode: Option<String>,
    pub bitrate: Option<u32>,
    pub gop: Option<u32>,
    pub use_hw: Option<bool>,
    pub stats: Option<PathBuf>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub test_name: Option<String>,
    pub test_definition: Option<String>,
}

impl FileConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, EncodeError> {
        let text = std::fs::read_to_string(path).map_err(|e| EncodeError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| EncodeError::config(format!("{}: {e}", path.display())))
    }
}

/// Fully resolved settings for one encode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub codec: Codec,
    pub color_format: ColorFormat,
    pub chroma_format: ChromaFormat,
    pub rate_control: RateControlMode,
    pub bitrate_kbps: Option<u32>,
    pub gop: Option<u32>,
    pub implementation: Implementation,
    pub stats_path: Option<PathBuf>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub test_name: Option<String>,
    pub test_definition: Option<String>,
}

impl EncodeConfig {
    /// Resolve parsed flags, loading the config file they name, if any.
    pub fn from_args(args: CliArgs) -> Result<Self, EncodeError> {
        let file = match &args.config {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                FileConfig::load(path)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    /// Merge flags over file values and apply defaults.
    pub fn resolve(args: CliArgs, file: FileConfig) -> Result<Self, EncodeError> {
        let input = args
            .input
            .or(file.input)
            .ok_or_else(|| EncodeError::config("an input file is required (--input)"))?;

        let width = args.width.or(file.width).unwrap_or(0);
        let height = args.height.or(file.height).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(EncodeError::config(format!(
                "frame size must be given and non-zero (--width, --height), got {width}x{height}"
            )));
        }

        let frame_rate = args.rate.or(file.rate).unwrap_or(DEFAULT_FRAME_RATE);
        if frame_rate == 0 {
            return Err(EncodeError::config("frame rate must be non-zero"));
        }

        let implementation = if args.use_hw || file.use_hw.unwrap_or(false) {
            Implementation::Hardware
        } else {
            Implementation::Software
        };

        let codec = match args.codec_type.or(file.codec_type) {
            Some(name) => lookup_codec(&name)?,
            None => Codec::default(),
        };
        let color_format = match args.color_format.or(file.color_format) {
            Some(name) => lookup_color_format(&name)?,
            None => implementation.default_color_format(),
        };
        let chroma_format = match args.chroma_format.or(file.chroma_format) {
            Some(name) => lookup_chroma_format(&name)?,
            None => ChromaFormat::default(),
        };
        let rate_control = match args.bitrate_mode.or(file.bitrate_mode) {
            Some(name) => lookup_rate_control(&name)?,
            None => RateControlMode::default(),
        };

        let bitrate_kbps = args.bitrate.or(file.bitrate);
        match (rate_control.uses_bitrate(), bitrate_kbps) {
            (true, None) => {
                return Err(EncodeError::config(format!(
                    "{rate_control} rate control needs --bitrate"
                )))
            }
            (false, Some(kbps)) => {
                return Err(EncodeError::config(format!(
                    "{rate_control} rate control ignores --bitrate {kbps}"
                )))
            }
            _ => {}
        }

        let output = args
            .output
            .or(file.output)
            .unwrap_or_else(|| input.with_extension(codec.file_extension()));
        if output == input {
            return Err(EncodeError::config(format!(
                "output {} would overwrite the input",
                output.display()
            )));
        }

        Ok(Self {
            input,
            output,
            width,
            height,
            frame_rate,
            codec,
            color_format,
            chroma_format,
            rate_control,
            bitrate_kbps,
            gop: args.gop.or(file.gop),
            implementation,
            stats_path: args.stats.or(file.stats),
            id: args.id.or(file.id),
            description: args.description.or(file.description),
            test_name: args.test_name.or(file.test_name),
            test_definition: args.test_definition.or(file.test_definition),
        })
    }

    /// Frame description handed to the encoder.
    #[must_use]
    pub fn frame_params(&self) -> FrameParams {
        FrameParams::new(self.width, self.height)
            .frame_rate(self.frame_rate, 1)
            .fourcc(self.color_format)
            .chroma(self.chroma_format)
    }

    /// Extension parameters for the configured bitrate and GOP.
    #[must_use]
    pub fn ext_params(&self) -> Vec<ExtParam> {
        let mut ext = Vec::new();
        if let Some(kbps) = self.bitrate_kbps {
            ext.push(ExtParam::TargetKbps(kbps));
        }
        if let Some(gop) = self.gop {
            ext.push(ExtParam::GopSize(gop));
        }
        ext
    }

    /// Settings block for the statistics report.
    #[must_use]
    pub fn encoding_settings(&self) -> EncodingSettings {
        let mut settings =
            EncodingSettings::new(self.codec.name(), self.width, self.height, self.frame_rate);
        if let Some(gop) = self.gop {
            settings = settings.gop(gop);
        }
        if let Some(kbps) = self.bitrate_kbps {
            settings = settings.bitrate(format!("{kbps} kbps"));
        }
        settings
    }

    /// Report metadata, with configured values over the defaults.
    #[must_use]
    pub fn run_metadata(&self) -> RunMetadata {
        let mut metadata = RunMetadata::new(
            self.input.display().to_string(),
            self.output.display().to_string(),
        );
        if let Some(id) = &self.id {
            metadata = metadata.id(id.clone());
        }
        if let Some(description) = &self.description {
            metadata = metadata.description(description.clone());
        }
        if let Some(test) = &self.test_name {
            metadata = metadata.test(test.clone());
        }
        if let Some(definition) = &self.test_definition {
            metadata = metadata.test_definition(definition.clone());
        }
        metadata
    }
}
