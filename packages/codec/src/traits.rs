//! The encode session seam: output buffers, statuses and the session trait.

use std::time::Duration;

use bitflags::bitflags;

use crate::{CodecError, EncoderParams, Implementation};

bitflags! {
    /// Picture type flags reported for an encoded frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameType: u16 {
        const I = 0x0001;
        const P = 0x0002;
        const B = 0x0004;
        const S = 0x0008;
        const REF = 0x0040;
        const IDR = 0x0080;
    }
}

impl FrameType {
    /// Returns true when the I bit is set.
    #[must_use]
    pub fn is_intra(&self) -> bool {
        self.contains(Self::I)
    }
}

/// Destination buffer for one encoded frame.
#[derive(Debug, Clone, Default)]
pub struct Bitstream {
    /// Encoded payload.
    pub data: Vec<u8>,
    /// Picture type of the payload.
    pub frame_type: FrameType,
    /// Presentation timestamp in 90 kHz units, when known.
    pub pts: Option<i64>,
}

impl Bitstream {
    /// Create an empty bitstream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the valid payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop the payload so the buffer can be reused for the next frame.
    pub fn clear(&mut self) {
        self.data.clear();
        self.frame_type = FrameType::empty();
        self.pts = None;
    }
}

/// Outcome of a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// A payload is ready in the bitstream.
    Ok,
    /// The frame source is exhausted and the session is drained.
    EndOfStream,
    /// Transient backpressure; nothing was produced and no input consumed.
    DeviceBusy,
    /// Any other status code reported by the session.
    Other(i32),
}

/// An encode session: the external encoder the application drives.
///
/// Sessions own their frame source and pull one frame per `encode_frame`
/// call. The call sequence is `init`, then `encode_frame` until
/// `EndOfStream`, with `working_params` available after `init`.
pub trait EncodeSession {
    /// Initialize the session with a parameter block.
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError>;

    /// Encode the next frame into `dst`.
    ///
    /// May block on the underlying encoder.
    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError>;

    /// Wait up to `timeout` for the payload in `dst` to become readable.
    ///
    /// Synchronous sessions have nothing to wait for.
    fn sync_output(&mut self, _dst: &mut Bitstream, _timeout: Duration) -> Result<(), CodecError> {
        Ok(())
    }

    /// Parameters negotiated by the session, possibly adjusted from the
    /// ones passed to `init`.
    fn working_params(&self) -> Result<EncoderParams, CodecError>;

    /// Implementation type backing the session.
    fn implementation(&self) -> Implementation;
}

impl<S: EncodeSession + ?Sized> EncodeSession for Box<S> {
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError> {
        (**self).init(params)
    }

    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        (**self).encode_frame(dst)
    }

    fn sync_output(&mut self, dst: &mut Bitstream, timeout: Duration) -> Result<(), CodecError> {
        (**self).sync_output(dst, timeout)
    }

    fn working_params(&self) -> Result<EncoderParams, CodecError> {
        (**self).working_params()
    }

    fn implementation(&self) -> Implementation {
        (**self).implementation()
    }
}
