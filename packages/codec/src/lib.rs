//! Format tables, parameter blocks and encode sessions for vplenc.
//!
//! This crate holds everything the encode application needs to talk to an
//! encode session:
//!
//! - **Lookup tables** ([`mapping`]): command-line names for codecs, chroma
//!   subsamplings, input pixel layouts and rate control methods
//! - **Parameter blocks** ([`EncoderParams`], [`FrameParams`], [`ExtParam`])
//! - **Raw input** ([`RawFrameReader`]): flat files of concatenated frames
//! - **Sessions** ([`EncodeSession`]): the seam to the external encoder,
//!   opened through [`open_session`]
//!
//! # Quick Start
//!
//! ```ignore
//! use vplenc_codec::{open_session, Codec, EncoderParams, FrameParams, Implementation};
//! use vplenc_codec::{Bitstream, ColorFormat, EncodeStatus, RawFrameReader};
//!
//! let file = std::fs::File::open("input.yuv")?;
//! let reader = RawFrameReader::new(file, 320, 240, ColorFormat::I420)?;
//! let mut session = open_session(Implementation::Software, Codec::Avc, Box::new(reader))?;
//! session.init(&EncoderParams::new(FrameParams::new(320, 240), Codec::Avc))?;
//!
//! let mut bs = Bitstream::new();
//! while session.encode_frame(&mut bs)? == EncodeStatus::Ok {
//!     // bs.data holds one encoded frame
//!     bs.clear();
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `onevpl` - Software and hardware sessions on the Intel oneVPL runtime
//! - `openh264` - Software AVC session built on OpenH264
//! - `testing` - [`scripted::ScriptedSession`] for driving code without an encoder

mod error;
mod frame;
pub mod mapping;
pub mod nal;
mod select;
mod traits;
mod types;

pub use error::CodecError;
pub use frame::{expected_frame_size, FrameSource, RawFrameReader, VideoFrame};
pub use mapping::{lookup_chroma_format, lookup_codec, lookup_color_format, lookup_rate_control};
pub use select::{available_implementations, open_session};
pub use traits::{Bitstream, EncodeSession, EncodeStatus, FrameType};
pub use types::{
    align16, ChromaFormat, Codec, ColorFormat, EncoderParams, ExtParam, FrameParams,
    Implementation, IoPattern, RateControlMode,
};

// oneVPL backend
#[cfg(feature = "onevpl")]
pub mod onevpl;

#[cfg(feature = "onevpl")]
pub use self::onevpl::OneVplSession;

// OpenH264 backend
#[cfg(feature = "openh264")]
pub mod openh264;

#[cfg(feature = "openh264")]
pub use self::openh264::OpenH264Session;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;
