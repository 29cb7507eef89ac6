//! OpenH264 encode session implementation.

use ::openh264::encoder::{
    BitRate, Encoder, EncoderConfig, FrameRate, FrameType as H264FrameType,
    RateControlMode as H264RateControl,
};
use ::openh264::formats::YUVSource;
use ::openh264::OpenH264API;

use crate::{
    Bitstream, ChromaFormat, Codec, CodecError, EncodeSession, EncodeStatus, EncoderParams,
    FrameSource, FrameType, Implementation,
};

/// 90 kHz presentation clock.
const PTS_CLOCK_HZ: i64 = 90_000;

/// OpenH264 software encode session.
///
/// Pulls frames from its source on every `encode_frame` call.
pub struct OpenH264Session {
    source: Box<dyn FrameSource>,
    encoder: Option<Encoder>,
    params: Option<EncoderParams>,
    frame_duration: i64,
    frames_encoded: u64,
}

impl OpenH264Session {
    /// Create an uninitialized session reading from `source`.
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            encoder: None,
            params: None,
            frame_duration: 0,
            frames_encoded: 0,
        }
    }

    fn validate(params: &EncoderParams) -> Result<(), CodecError> {
        if params.codec != Codec::Avc {
            return Err(CodecError::unsupported_param(format!(
                "openh264 encodes avc only, not {}",
                params.codec
            )));
        }
        let frame = &params.frame;
        if frame.chroma != ChromaFormat::Yuv420 || !frame.fourcc.is_yuv420_8bit() {
            return Err(CodecError::unsupported_param(format!(
                "openh264 needs 8-bit 4:2:0 input, got {} ({})",
                frame.fourcc, frame.chroma
            )));
        }
        if frame.width == 0 || frame.height == 0 || frame.width % 2 != 0 || frame.height % 2 != 0 {
            return Err(CodecError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        match (params.rate_control.uses_bitrate(), params.target_kbps()) {
            (true, None) => Err(CodecError::unsupported_param(format!(
                "{} rate control needs a target bitrate",
                params.rate_control
            ))),
            (false, Some(kbps)) => Err(CodecError::unsupported_param(format!(
                "{} rate control cannot honour a {kbps} kbps target",
                params.rate_control
            ))),
            _ => Ok(()),
        }
    }
}

impl EncodeSession for OpenH264Session {
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError> {
        Self::validate(params)?;

        let mut config = EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(params.frame.fps() as f32))
            .scene_change_detect(false);

        config = match params.target_kbps() {
            Some(kbps) => config
                .bitrate(BitRate::from_bps(kbps.saturating_mul(1000)))
                .rate_control_mode(H264RateControl::Bitrate),
            None => config.rate_control_mode(H264RateControl::Quality),
        };

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CodecError::init_failed(format!("failed to create H.264 encoder: {e:?}")))?;

        let (num, den) = params.frame.frame_rate;
        self.frame_duration = if num == 0 {
            0
        } else {
            PTS_CLOCK_HZ * i64::from(den) / i64::from(num)
        };
        self.encoder = Some(encoder);
        self.params = Some(params.clone());
        self.frames_encoded = 0;

        tracing::debug!(
            "OpenH264 session ready: {}x{} @ {:.2} fps",
            params.frame.width,
            params.frame.height,
            params.frame.fps()
        );
        Ok(())
    }

    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        let gop = self.params.as_ref().and_then(EncoderParams::gop_size);
        let encoder = self.encoder.as_mut().ok_or(CodecError::NotInitialized)?;

        let frame = match self.source.read_frame()? {
            Some(frame) => frame.to_i420()?,
            None => return Ok(EncodeStatus::EndOfStream),
        };

        if let Some(gop) = gop.filter(|&g| g > 0) {
            if self.frames_encoded > 0 && self.frames_encoded % u64::from(gop) == 0 {
                encoder.force_intra_frame();
            }
        }

        let yuv = I420Frame {
            data: &frame.data,
            width: frame.width as usize,
            height: frame.height as usize,
        };
        let encoded = encoder
            .encode(&yuv)
            .map_err(|e| CodecError::encode_failed(format!("H.264 encode failed: {e:?}")))?;

        dst.frame_type = match encoded.frame_type() {
            H264FrameType::IDR => FrameType::I | FrameType::IDR | FrameType::REF,
            H264FrameType::I => FrameType::I | FrameType::REF,
            H264FrameType::P => FrameType::P | FrameType::REF,
            H264FrameType::IPMixed => FrameType::I | FrameType::P | FrameType::REF,
            _ => FrameType::empty(),
        };
        dst.data = encoded.to_vec();
        dst.pts = Some(frame.index as i64 * self.frame_duration);

        self.frames_encoded += 1;
        Ok(EncodeStatus::Ok)
    }

    fn working_params(&self) -> Result<EncoderParams, CodecError> {
        self.params.clone().ok_or(CodecError::NotInitialized)
    }

    fn implementation(&self) -> Implementation {
        Implementation::Software
    }
}

/// Borrowed I420 frame handed to OpenH264.
struct I420Frame<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl YUVSource for I420Frame<'_> {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn strides(&self) -> (usize, usize, usize) {
        (self.width, self.width / 2, self.width / 2)
    }

    fn y(&self) -> &[u8] {
        &self.data[..self.width * self.height]
    }

    fn u(&self) -> &[u8] {
        let y_size = self.width * self.height;
        let u_size = (self.width / 2) * (self.height / 2);
        &self.data[y_size..y_size + u_size]
    }

    fn v(&self) -> &[u8] {
        let y_size = self.width * self.height;
        let u_size = (self.width / 2) * (self.height / 2);
        &self.data[y_size + u_size..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExtParam, FrameParams, RateControlMode, RawFrameReader};
    use crate::{expected_frame_size, ColorFormat};
    use std::io::Cursor;

    fn reader(frames: usize) -> Box<dyn FrameSource> {
        let bytes = vec![128u8; expected_frame_size(64, 64, ColorFormat::I420) * frames];
        Box::new(RawFrameReader::new(Cursor::new(bytes), 64, 64, ColorFormat::I420).unwrap())
    }

    #[test]
    fn test_rejects_non_avc() {
        let mut session = OpenH264Session::new(reader(1));
        let params = EncoderParams::new(FrameParams::new(64, 64), Codec::Hevc);
        assert!(session.init(&params).is_err());
    }

    #[test]
    fn test_rejects_bitrate_mode_without_target() {
        let mut session = OpenH264Session::new(reader(1));
        let params = EncoderParams::new(FrameParams::new(64, 64), Codec::Avc)
            .rate_control(RateControlMode::Vbr);
        assert!(session.init(&params).is_err());
    }

    #[test]
    fn test_rejects_bitrate_in_quality_mode() {
        let mut session = OpenH264Session::new(reader(1));
        let params = EncoderParams::new(FrameParams::new(64, 64), Codec::Avc)
            .rate_control(RateControlMode::Cqp)
            .with_ext(&[ExtParam::TargetKbps(2500)]);
        assert!(matches!(
            session.init(&params),
            Err(CodecError::UnsupportedParam(_))
        ));
    }

    #[test]
    fn test_gop_forces_intra_frames() {
        let mut session = OpenH264Session::new(reader(5));
        let params = EncoderParams::new(FrameParams::new(64, 64), Codec::Avc)
            .with_ext(&[ExtParam::GopSize(2)]);
        session.init(&params).unwrap();

        let mut intra = Vec::new();
        let mut bs = Bitstream::new();
        while session.encode_frame(&mut bs).unwrap() == EncodeStatus::Ok {
            intra.push(bs.frame_type.is_intra());
            bs.clear();
        }
        assert_eq!(intra, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_encode_until_end_of_stream() {
        let mut session = OpenH264Session::new(reader(3));
        let params = EncoderParams::new(FrameParams::new(64, 64), Codec::Avc)
            .rate_control(RateControlMode::Vbr)
            .with_ext(&[ExtParam::TargetKbps(500)]);
        session.init(&params).unwrap();

        let mut bs = Bitstream::new();
        assert_eq!(session.encode_frame(&mut bs).unwrap(), EncodeStatus::Ok);
        assert!(bs.frame_type.is_intra());
        assert!(!bs.is_empty());
        assert_eq!(bs.pts, Some(0));

        bs.clear();
        assert_eq!(session.encode_frame(&mut bs).unwrap(), EncodeStatus::Ok);
        assert_eq!(bs.pts, Some(3000));

        bs.clear();
        assert_eq!(session.encode_frame(&mut bs).unwrap(), EncodeStatus::Ok);
        bs.clear();
        assert_eq!(session.encode_frame(&mut bs).unwrap(), EncodeStatus::EndOfStream);
    }
}
