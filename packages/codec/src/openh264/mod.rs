//! Software AVC session backed by Cisco's OpenH264.
//!
//! The library is BSD-2 licensed and built from the source bundled with the
//! `openh264` crate, so no system installation is needed.
//!
//! # Limitations
//!
//! - AVC only
//! - 8-bit 4:2:0 input (I420, YV12, NV12, NV21); other layouts are rejected
//!   at init
//! - No frame reordering, so the session is drained as soon as the source is
//!   exhausted
//!
//! # Example
//!
//! ```ignore
//! use vplenc_codec::{EncodeSession, EncoderParams, FrameParams, Codec};
//! use vplenc_codec::openh264::OpenH264Session;
//!
//! let mut session = OpenH264Session::new(Box::new(reader));
//! session.init(&EncoderParams::new(FrameParams::new(320, 240), Codec::Avc))?;
//! ```

mod session;

pub use session::OpenH264Session;
