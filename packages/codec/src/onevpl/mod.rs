//! Encode sessions on the Intel oneVPL runtime.
//!
//! The dispatcher picks a software or hardware implementation that can
//! encode the requested codec. It needs `libvpl` and at least one runtime
//! (the CPU runtime or a GPU driver) installed on the host.
//!
//! # Limitations
//!
//! - 8-bit 4:2:0 input only; NV12 frames go to the runtime as they are and
//!   YV12/NV21 are converted to I420 first
//! - Key frame distance and QP are chosen by the runtime
//! - Intra flags come from the AVC/HEVC NAL headers; other codecs report no
//!   picture type
//!
//! # Example
//!
//! ```ignore
//! use vplenc_codec::{Codec, EncodeSession, EncoderParams, FrameParams, Implementation};
//! use vplenc_codec::onevpl::OneVplSession;
//!
//! let mut session = OneVplSession::new(Implementation::Hardware, Box::new(reader));
//! session.init(&EncoderParams::new(FrameParams::new(1920, 1080), Codec::Hevc))?;
//! ```

mod session;

pub use session::OneVplSession;

use crate::Codec;

/// Returns true when oneVPL defines an encoder for `codec`.
#[must_use]
pub fn supports(codec: Codec) -> bool {
    session::mfx_codec(codec).is_some()
}
