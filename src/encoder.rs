//! Thin facade over an encode session.

use std::time::Duration;

use vplenc_codec::{
    Bitstream, Codec, CodecError, ColorFormat, EncodeSession, EncodeStatus, EncoderParams,
    ExtParam, FrameParams, Implementation, IoPattern, RateControlMode,
};

use crate::error::EncodeError;

/// Upper bound on the wait for a payload after a successful encode.
pub const SYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// Video encoder driving one session.
///
/// The session is created by the caller; the encoder builds the parameter
/// block, initializes the session and forwards encode calls to it.
pub struct VideoEncoder {
    session: Box<dyn EncodeSession>,
    initialized: bool,
}

impl VideoEncoder {
    /// Wrap an uninitialized session.
    #[must_use]
    pub fn new(session: Box<dyn EncodeSession>) -> Self {
        Self {
            session,
            initialized: false,
        }
    }

    /// Build the parameter block and initialize the session with it.
    ///
    /// `color_format` overrides the FourCC in `frame`. Input is always read
    /// from system memory.
    pub fn initialize(
        &mut self,
        frame: FrameParams,
        codec: Codec,
        color_format: ColorFormat,
        rate_control: RateControlMode,
        ext: &[ExtParam],
    ) -> Result<(), EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::config(format!(
                "frame size must be non-zero, got {}x{}",
                frame.width, frame.height
            )));
        }
        if frame.frame_rate.0 == 0 || frame.frame_rate.1 == 0 {
            return Err(EncodeError::config(format!(
                "frame rate must be non-zero, got {}/{}",
                frame.frame_rate.0, frame.frame_rate.1
            )));
        }

        let mut params = EncoderParams::new(frame.fourcc(color_format), codec)
            .rate_control(rate_control)
            .with_ext(ext);
        params.io_pattern = IoPattern::SystemMemory;

        self.session.init(&params).map_err(EncodeError::EncoderInit)?;
        self.initialized = true;

        tracing::info!(
            "Encoder initialized: {} {}x{} {} ({})",
            codec,
            params.frame.width,
            params.frame.height,
            rate_control,
            self.session.implementation()
        );
        Ok(())
    }

    /// Encode the next frame into `dst`.
    pub fn encode_one_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        if !self.initialized {
            return Err(CodecError::NotInitialized);
        }
        self.session.encode_frame(dst)
    }

    /// Wait up to `timeout` for the payload of the last encode.
    pub fn sync_output(&mut self, dst: &mut Bitstream, timeout: Duration) -> Result<(), CodecError> {
        self.session.sync_output(dst, timeout)
    }

    /// Parameter block as negotiated by the session.
    pub fn current_parameters(&self) -> Result<EncoderParams, CodecError> {
        if !self.initialized {
            return Err(CodecError::NotInitialized);
        }
        self.session.working_params()
    }

    #[must_use]
    pub fn implementation(&self) -> Implementation {
        self.session.implementation()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vplenc_codec::scripted::{ScriptStep, ScriptedSession};
    use vplenc_codec::ChromaFormat;

    fn frame() -> FrameParams {
        FrameParams::new(320, 240).frame_rate(30, 1)
    }

    #[test]
    fn test_initialize_builds_parameter_block() {
        let mut encoder = VideoEncoder::new(Box::new(ScriptedSession::new(Vec::new())));
        encoder
            .initialize(
                frame().chroma(ChromaFormat::Yuv420),
                Codec::Hevc,
                ColorFormat::Nv12,
                RateControlMode::Vbr,
                &[ExtParam::TargetKbps(2500), ExtParam::GopSize(30)],
            )
            .unwrap();

        let params = encoder.current_parameters().unwrap();
        assert_eq!(params.codec, Codec::Hevc);
        assert_eq!(params.rate_control, RateControlMode::Vbr);
        assert_eq!(params.io_pattern, IoPattern::SystemMemory);
        assert_eq!(params.frame.fourcc, ColorFormat::Nv12);
        assert_eq!(params.frame.chroma, ChromaFormat::Yuv420);
        assert_eq!(params.frame.aligned_height(), 240);
        assert_eq!(params.target_kbps(), Some(2500));
        assert_eq!(params.gop_size(), Some(30));
    }

    #[test]
    fn test_zero_geometry_never_reaches_session() {
        let mut encoder = VideoEncoder::new(Box::new(ScriptedSession::new(Vec::new())));
        let err = encoder
            .initialize(
                FrameParams::new(0, 240),
                Codec::Hevc,
                ColorFormat::I420,
                RateControlMode::Cqp,
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, EncodeError::Config(_)));

        let err = encoder
            .initialize(
                frame().frame_rate(0, 1),
                Codec::Hevc,
                ColorFormat::I420,
                RateControlMode::Cqp,
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, EncodeError::Config(_)));
        assert!(!encoder.is_initialized());
    }

    #[test]
    fn test_rejected_init_is_init_error() {
        let session = ScriptedSession::new(Vec::new()).reject_init("unsupported");
        let mut encoder = VideoEncoder::new(Box::new(session));
        let err = encoder
            .initialize(frame(), Codec::Avc, ColorFormat::I420, RateControlMode::Cqp, &[])
            .unwrap_err();
        assert!(matches!(err, EncodeError::EncoderInit(_)));
        assert_eq!(err.exit_code(), libc::EIO);
    }

    #[test]
    fn test_encode_requires_initialize() {
        let mut encoder = VideoEncoder::new(Box::new(ScriptedSession::new([ScriptStep::frame(10, true)])));
        let mut bs = Bitstream::new();
        assert!(matches!(
            encoder.encode_one_frame(&mut bs),
            Err(CodecError::NotInitialized)
        ));
        assert!(encoder.current_parameters().is_err());
    }

    #[test]
    fn test_forwards_encode_calls() {
        let session = ScriptedSession::new([
            ScriptStep::frame(10, true),
            ScriptStep::Busy,
            ScriptStep::Status(-17),
        ]);
        let mut encoder = VideoEncoder::new(Box::new(session));
        encoder
            .initialize(frame(), Codec::Hevc, ColorFormat::I420, RateControlMode::Cqp, &[])
            .unwrap();

        let mut bs = Bitstream::new();
        assert_eq!(encoder.encode_one_frame(&mut bs).unwrap(), EncodeStatus::Ok);
        encoder.sync_output(&mut bs, SYNC_TIMEOUT).unwrap();
        assert_eq!(bs.len(), 10);
        assert_eq!(encoder.encode_one_frame(&mut bs).unwrap(), EncodeStatus::DeviceBusy);
        assert_eq!(encoder.encode_one_frame(&mut bs).unwrap(), EncodeStatus::Other(-17));
        assert_eq!(encoder.encode_one_frame(&mut bs).unwrap(), EncodeStatus::EndOfStream);
    }

    #[test]
    fn test_current_parameters_reflect_session_adjustments() {
        let session = ScriptedSession::new(Vec::new()).adjust_params(|p| p.frame.width = 336);
        let mut encoder = VideoEncoder::new(Box::new(session));
        encoder
            .initialize(frame(), Codec::Hevc, ColorFormat::I420, RateControlMode::Cqp, &[])
            .unwrap();
        assert_eq!(encoder.current_parameters().unwrap().frame.width, 336);
    }
}
