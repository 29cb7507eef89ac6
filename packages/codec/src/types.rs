//! Core types describing an encode configuration.

use std::fmt;

/// Round a dimension up to the next multiple of 16.
#[must_use]
pub fn align16(value: u32) -> u32 {
    (value + 15) & !15
}

/// Compressed output codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// H.264/AVC.
    Avc,
    /// H.265/HEVC.
    Hevc,
    /// MPEG-2 video.
    Mpeg2,
    /// SMPTE VC-1.
    Vc1,
    /// Screen capture codec.
    Capture,
    /// VP9.
    Vp9,
    /// AV1.
    Av1,
}

impl Codec {
    /// Every codec, in lookup-table order.
    pub const ALL: [Codec; 7] = [
        Self::Avc,
        Self::Hevc,
        Self::Mpeg2,
        Self::Vc1,
        Self::Capture,
        Self::Vp9,
        Self::Av1,
    ];

    /// Lowercase name used on the command line and in reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Avc => "avc",
            Self::Hevc => "hevc",
            Self::Mpeg2 => "mpeg2",
            Self::Vc1 => "vc1",
            Self::Capture => "capture",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
        }
    }

    /// File extension for an elementary stream of this codec.
    #[must_use]
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Avc => "h264",
            Self::Hevc => "hevc",
            Self::Mpeg2 => "m2v",
            Self::Vc1 => "vc1",
            Self::Capture => "bin",
            Self::Vp9 | Self::Av1 => "ivf",
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::Hevc
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chroma subsampling of the input frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaFormat {
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
    Yuv400,
    Yuv411,
    Yuv422H,
    Yuv422V,
}

impl ChromaFormat {
    /// Every chroma format, in lookup-table order.
    pub const ALL: [ChromaFormat; 8] = [
        Self::Monochrome,
        Self::Yuv420,
        Self::Yuv422,
        Self::Yuv444,
        Self::Yuv400,
        Self::Yuv411,
        Self::Yuv422H,
        Self::Yuv422V,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Monochrome => "monochrome",
            Self::Yuv420 => "yuv420",
            Self::Yuv422 => "yuv422",
            Self::Yuv444 => "yuv444",
            Self::Yuv400 => "yuv400",
            Self::Yuv411 => "yuv411",
            Self::Yuv422H => "yuv422h",
            Self::Yuv422V => "yuv422v",
        }
    }
}

impl Default for ChromaFormat {
    fn default() -> Self {
        Self::Yuv420
    }
}

impl fmt::Display for ChromaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw pixel layout of the input frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Nv12,
    Yv12,
    Nv16,
    Yuy2,
    Rgb565,
    Rgbp,
    Rgb3,
    Bgra,
    P8,
    P8Texture,
    P010,
    P016,
    P210,
    Bgr4,
    A2Rgb10,
    Argb16,
    Abgr16,
    R16,
    Ayuv,
    AyuvRgb4,
    Uyvy,
    Y210,
    Y410,
    Y216,
    Y416,
    Nv21,
    I420,
    I010,
    I210,
    I422,
    Bgrp,
}

impl ColorFormat {
    /// Every color format, in lookup-table order.
    pub const ALL: [ColorFormat; 31] = [
        Self::Nv12,
        Self::Yv12,
        Self::Nv16,
        Self::Yuy2,
        Self::Rgb565,
        Self::Rgbp,
        Self::Rgb3,
        Self::Bgra,
        Self::P8,
        Self::P8Texture,
        Self::P010,
        Self::P016,
        Self::P210,
        Self::Bgr4,
        Self::A2Rgb10,
        Self::Argb16,
        Self::Abgr16,
        Self::R16,
        Self::Ayuv,
        Self::AyuvRgb4,
        Self::Uyvy,
        Self::Y210,
        Self::Y410,
        Self::Y216,
        Self::Y416,
        Self::Nv21,
        Self::I420,
        Self::I010,
        Self::I210,
        Self::I422,
        Self::Bgrp,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nv12 => "nv12",
            Self::Yv12 => "yv12",
            Self::Nv16 => "nv16",
            Self::Yuy2 => "yuy2",
            Self::Rgb565 => "rgb565",
            Self::Rgbp => "rgbp",
            Self::Rgb3 => "rgb3",
            Self::Bgra => "bgra",
            Self::P8 => "p8",
            Self::P8Texture => "p8_texture",
            Self::P010 => "p010",
            Self::P016 => "p016",
            Self::P210 => "p210",
            Self::Bgr4 => "bgr4",
            Self::A2Rgb10 => "a2rgb10",
            Self::Argb16 => "argb16",
            Self::Abgr16 => "abgr16",
            Self::R16 => "r16",
            Self::Ayuv => "ayuv",
            Self::AyuvRgb4 => "ayuv_rgb4",
            Self::Uyvy => "uyvy",
            Self::Y210 => "y210",
            Self::Y410 => "y410",
            Self::Y216 => "y216",
            Self::Y416 => "y416",
            Self::Nv21 => "nv21",
            Self::I420 => "i420",
            Self::I010 => "i010",
            Self::I210 => "i210",
            Self::I422 => "i422",
            Self::Bgrp => "bgrp",
        }
    }

    /// Chroma subsampling implied by the layout.
    #[must_use]
    pub fn chroma(&self) -> ChromaFormat {
        match self {
            Self::Nv12
            | Self::Yv12
            | Self::Nv21
            | Self::I420
            | Self::P010
            | Self::P016
            | Self::I010 => ChromaFormat::Yuv420,
            Self::Nv16
            | Self::Yuy2
            | Self::Uyvy
            | Self::P210
            | Self::Y210
            | Self::Y216
            | Self::I210
            | Self::I422 => ChromaFormat::Yuv422,
            Self::P8 | Self::P8Texture | Self::R16 => ChromaFormat::Monochrome,
            _ => ChromaFormat::Yuv444,
        }
    }

    /// Returns true for the 8-bit 4:2:0 layouts.
    #[must_use]
    pub fn is_yuv420_8bit(&self) -> bool {
        matches!(self, Self::Nv12 | Self::Yv12 | Self::Nv21 | Self::I420)
    }
}

impl Default for ColorFormat {
    fn default() -> Self {
        Self::I420
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rate control method used by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateControlMode {
    /// Constant bitrate.
    Cbr,
    /// Variable bitrate.
    Vbr,
    /// Constant QP - fixed quality, variable bitrate.
    Cqp,
    /// Average variable bitrate.
    Avbr,
    /// Look-ahead.
    La,
    /// Intelligent constant quality.
    Icq,
    /// Video conferencing mode.
    Vcm,
    /// Look-ahead with intelligent constant quality.
    LaIcq,
    /// Look-ahead with HRD compliance.
    LaHrd,
    /// Quality-defined variable bitrate.
    Qvbr,
}

impl RateControlMode {
    /// Every rate control method, in lookup-table order.
    pub const ALL: [RateControlMode; 10] = [
        Self::Cbr,
        Self::Vbr,
        Self::Cqp,
        Self::Avbr,
        Self::La,
        Self::Icq,
        Self::Vcm,
        Self::LaIcq,
        Self::LaHrd,
        Self::Qvbr,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cbr => "cbr",
            Self::Vbr => "vbr",
            Self::Cqp => "cqp",
            Self::Avbr => "avbr",
            Self::La => "la",
            Self::Icq => "icq",
            Self::Vcm => "vcm",
            Self::LaIcq => "la_icq",
            Self::LaHrd => "la_hrd",
            Self::Qvbr => "qvbr",
        }
    }

    /// Returns true when the method is driven by a target bitrate.
    #[must_use]
    pub fn uses_bitrate(&self) -> bool {
        !matches!(self, Self::Cqp | Self::Icq | Self::LaIcq)
    }
}

impl Default for RateControlMode {
    fn default() -> Self {
        Self::Cqp
    }
}

impl fmt::Display for RateControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the session implementation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Implementation {
    /// CPU implementation.
    #[default]
    Software,
    /// GPU / fixed-function implementation.
    Hardware,
}

impl Implementation {
    /// Default input layout for the implementation.
    #[must_use]
    pub fn default_color_format(&self) -> ColorFormat {
        match self {
            Self::Software => ColorFormat::I420,
            Self::Hardware => ColorFormat::Nv12,
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software => f.write_str("software"),
            Self::Hardware => f.write_str("hardware"),
        }
    }
}

/// Memory the session reads input surfaces from. Frames are always read
/// from a file into system memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IoPattern {
    #[default]
    SystemMemory,
}

/// Description of the raw input frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParams {
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    /// Framerate as (numerator, denominator).
    pub frame_rate: (u32, u32),
    /// Input pixel layout.
    pub fourcc: ColorFormat,
    /// Chroma subsampling.
    pub chroma: ChromaFormat,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            frame_rate: (30, 1),
            fourcc: ColorFormat::I420,
            chroma: ChromaFormat::Yuv420,
        }
    }
}

impl FrameParams {
    /// Create frame parameters with the given visible dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the framerate.
    #[must_use]
    pub fn frame_rate(mut self, num: u32, den: u32) -> Self {
        self.frame_rate = (num, den);
        self
    }

    /// Set the input pixel layout.
    #[must_use]
    pub fn fourcc(mut self, fourcc: ColorFormat) -> Self {
        self.fourcc = fourcc;
        self
    }

    /// Set the chroma subsampling.
    #[must_use]
    pub fn chroma(mut self, chroma: ChromaFormat) -> Self {
        self.chroma = chroma;
        self
    }

    /// Surface width, padded to a multiple of 16.
    #[must_use]
    pub fn aligned_width(&self) -> u32 {
        align16(self.width)
    }

    /// Surface height, padded to a multiple of 16.
    #[must_use]
    pub fn aligned_height(&self) -> u32 {
        align16(self.height)
    }

    /// Framerate in frames per second.
    #[must_use]
    pub fn fps(&self) -> f64 {
        let (num, den) = self.frame_rate;
        if den == 0 {
            0.0
        } else {
            f64::from(num) / f64::from(den)
        }
    }
}

/// Optional parameters attached to the parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtParam {
    /// Target bitrate in kilobits per second.
    TargetKbps(u32),
    /// Distance between key frames.
    GopSize(u32),
}

/// Parameter block handed to a session at init and read back afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderParams {
    pub codec: Codec,
    pub rate_control: RateControlMode,
    pub io_pattern: IoPattern,
    pub frame: FrameParams,
    pub ext: Vec<ExtParam>,
}

impl EncoderParams {
    /// Create a parameter block for the given frames and codec.
    #[must_use]
    pub fn new(frame: FrameParams, codec: Codec) -> Self {
        Self {
            codec,
            rate_control: RateControlMode::default(),
            io_pattern: IoPattern::default(),
            frame,
            ext: Vec::new(),
        }
    }

    /// Set the rate control method.
    #[must_use]
    pub fn rate_control(mut self, mode: RateControlMode) -> Self {
        self.rate_control = mode;
        self
    }

    /// Attach extension parameters.
    #[must_use]
    pub fn with_ext(mut self, ext: &[ExtParam]) -> Self {
        self.ext.extend_from_slice(ext);
        self
    }

    /// Target bitrate, if one was attached. The last value wins.
    #[must_use]
    pub fn target_kbps(&self) -> Option<u32> {
        self.ext.iter().rev().find_map(|p| match p {
            ExtParam::TargetKbps(kbps) => Some(*kbps),
            _ => None,
        })
    }

    /// Key frame distance, if one was attached.
    #[must_use]
    pub fn gop_size(&self) -> Option<u32> {
        self.ext.iter().rev().find_map(|p| match p {
            ExtParam::GopSize(gop) => Some(*gop),
            _ => None,
        })
    }
}

impl fmt::Display for EncoderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = &self.frame;
        writeln!(f, "Codec:           {}", self.codec)?;
        writeln!(f, "RateControl:     {}", self.rate_control)?;
        match self.io_pattern {
            IoPattern::SystemMemory => writeln!(f, "IOPattern:       system memory")?,
        }
        writeln!(f, "FourCC:          {}", frame.fourcc)?;
        writeln!(f, "ChromaFormat:    {}", frame.chroma)?;
        writeln!(
            f,
            "Size:            {}x{} (surface {}x{})",
            frame.width,
            frame.height,
            frame.aligned_width(),
            frame.aligned_height()
        )?;
        writeln!(
            f,
            "FrameRate:       {}/{}",
            frame.frame_rate.0, frame.frame_rate.1
        )?;
        if let Some(kbps) = self.target_kbps() {
            writeln!(f, "TargetKbps:      {kbps}")?;
        }
        if let Some(gop) = self.gop_size() {
            writeln!(f, "GopPicSize:      {gop}")?;
        }
        write!(f, "PicStruct:       progressive")
    }
}
