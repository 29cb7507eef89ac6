//! Scripted encode session for exercising drivers without an encoder.
//!
//! A [`ScriptedSession`] replays a fixed list of [`ScriptStep`]s, one per
//! `encode_frame` call, and reports end of stream once the script runs out.

use std::collections::VecDeque;

use crate::{
    Bitstream, CodecError, EncodeSession, EncodeStatus, EncoderParams, FrameType, Implementation,
};

/// One scripted response to `encode_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Produce a payload.
    Frame {
        data: Vec<u8>,
        frame_type: FrameType,
        pts: Option<i64>,
    },
    /// Report transient backpressure.
    Busy,
    /// Report that the session is drained.
    EndOfStream,
    /// Report an unrecognized status code.
    Status(i32),
    /// Fail the call.
    Fail(String),
}

impl ScriptStep {
    /// A payload of `size` zero bytes, intra when `key` is set.
    #[must_use]
    pub fn frame(size: usize, key: bool) -> Self {
        let frame_type = if key {
            FrameType::I | FrameType::IDR | FrameType::REF
        } else {
            FrameType::P | FrameType::REF
        };
        Self::Frame {
            data: vec![0; size],
            frame_type,
            pts: None,
        }
    }
}

/// Encode session replaying a script.
pub struct ScriptedSession {
    steps: VecDeque<ScriptStep>,
    init_error: Option<String>,
    adjust: Option<Box<dyn Fn(&mut EncoderParams)>>,
    params: Option<EncoderParams>,
    encode_calls: usize,
}

impl ScriptedSession {
    /// Create a session that replays `steps` in order.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            init_error: None,
            adjust: None,
            params: None,
            encode_calls: 0,
        }
    }

    /// Make `init` fail with the given message.
    #[must_use]
    pub fn reject_init(mut self, msg: impl Into<String>) -> Self {
        self.init_error = Some(msg.into());
        self
    }

    /// Rewrite the parameter block during `init`, the way a real session
    /// rounds or clamps values it cannot honour.
    #[must_use]
    pub fn adjust_params(mut self, f: impl Fn(&mut EncoderParams) + 'static) -> Self {
        self.adjust = Some(Box::new(f));
        self
    }

    /// Number of `encode_frame` calls made so far.
    #[must_use]
    pub fn encode_calls(&self) -> usize {
        self.encode_calls
    }

    /// Steps not yet replayed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl EncodeSession for ScriptedSession {
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError> {
        if let Some(msg) = &self.init_error {
            return Err(CodecError::init_failed(msg.clone()));
        }
        let mut params = params.clone();
        if let Some(adjust) = &self.adjust {
            adjust(&mut params);
        }
        self.params = Some(params);
        Ok(())
    }

    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        if self.params.is_none() {
            return Err(CodecError::NotInitialized);
        }
        self.encode_calls += 1;

        match self.steps.pop_front() {
            Some(ScriptStep::Frame {
                data,
                frame_type,
                pts,
            }) => {
                dst.data = data;
                dst.frame_type = frame_type;
                dst.pts = pts;
                Ok(EncodeStatus::Ok)
            }
            Some(ScriptStep::Busy) => Ok(EncodeStatus::DeviceBusy),
            Some(ScriptStep::EndOfStream) | None => Ok(EncodeStatus::EndOfStream),
            Some(ScriptStep::Status(code)) => Ok(EncodeStatus::Other(code)),
            Some(ScriptStep::Fail(msg)) => Err(CodecError::encode_failed(msg)),
        }
    }

    fn working_params(&self) -> Result<EncoderParams, CodecError> {
        self.params.clone().ok_or(CodecError::NotInitialized)
    }

    fn implementation(&self) -> Implementation {
        Implementation::Software
    }
}
