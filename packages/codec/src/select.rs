//! Session selection by implementation type and codec.

use crate::{Codec, CodecError, EncodeSession, FrameSource, Implementation};

/// Implementation types compiled into this build.
///
/// A listed pair can still fail at init when the host has no runtime or
/// device for it.
#[must_use]
pub fn available_implementations() -> Vec<(Implementation, Codec)> {
    #[allow(unused_mut)]
    let mut available = Vec::new();
    #[cfg(feature = "onevpl")]
    for implementation in [Implementation::Software, Implementation::Hardware] {
        for codec in Codec::ALL {
            if crate::onevpl::supports(codec) {
                available.push((implementation, codec));
            }
        }
    }
    #[cfg(feature = "openh264")]
    if !available.contains(&(Implementation::Software, Codec::Avc)) {
        available.push((Implementation::Software, Codec::Avc));
    }
    available
}

/// Open an encode session for `codec` on the requested implementation.
///
/// oneVPL is preferred when it is compiled in. The returned session pulls
/// frames from `source` and still has to be initialized.
pub fn open_session(
    implementation: Implementation,
    codec: Codec,
    source: Box<dyn FrameSource>,
) -> Result<Box<dyn EncodeSession>, CodecError> {
    match (implementation, codec) {
        #[cfg(feature = "onevpl")]
        (_, _) if crate::onevpl::supports(codec) => {
            tracing::debug!("Selected oneVPL {} session", implementation);
            Ok(Box::new(crate::onevpl::OneVplSession::new(
                implementation,
                source,
            )))
        }
        #[cfg(feature = "openh264")]
        (Implementation::Software, Codec::Avc) => {
            tracing::debug!("Selected OpenH264 software session");
            Ok(Box::new(crate::openh264::OpenH264Session::new(source)))
        }
        _ => {
            drop(source);
            Err(CodecError::no_implementation(format!(
                "{implementation} {codec} encoding is not available in this build"
            )))
        }
    }
}
