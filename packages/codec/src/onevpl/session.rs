//! oneVPL encode session implementation.

use std::io::Cursor;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use ::onevpl::bitstream::Bitstream as MfxBitstream;
use ::onevpl::constants::{self, FourCC, IoPattern as MfxIoPattern};
use ::onevpl::encode::EncodeCtrl;
use ::onevpl::{Loader, MfxVideoParams};
use intel_onevpl_sys::MfxStatus;

use crate::{
    nal, Bitstream, ChromaFormat, Codec, CodecError, ColorFormat, EncodeSession, EncodeStatus,
    EncoderParams, FrameSource, Implementation, RateControlMode, VideoFrame,
};

/// Slack on top of the runtime's suggested bitstream buffer size.
const BUFFER_HEADROOM: usize = 5000;

/// Work handed to the encode worker.
enum Request {
    /// Encode one frame in the surface layout.
    Frame(Vec<u8>),
    /// Flush frames still buffered inside the runtime.
    Drain,
}

/// Worker response to one [`Request`].
enum Reply {
    Encoded(Vec<u8>),
    /// The runtime buffered the input and produced nothing yet.
    NeedMoreInput,
    /// The device was busy; the rejected frame is handed back.
    Busy(Option<Vec<u8>>),
    Failed(String),
}

pub(crate) fn mfx_codec(codec: Codec) -> Option<constants::Codec> {
    match codec {
        Codec::Avc => Some(constants::Codec::AVC),
        Codec::Hevc => Some(constants::Codec::HEVC),
        Codec::Mpeg2 => Some(constants::Codec::MPEG2),
        Codec::Vp9 => Some(constants::Codec::VP9),
        Codec::Av1 => Some(constants::Codec::AV1),
        Codec::Vc1 | Codec::Capture => None,
    }
}

fn mfx_rate_control(mode: RateControlMode) -> constants::RateControlMethod {
    match mode {
        RateControlMode::Cbr => constants::RateControlMethod::CBR,
        RateControlMode::Vbr => constants::RateControlMethod::VBR,
        RateControlMode::Cqp => constants::RateControlMethod::CQP,
        RateControlMode::Avbr => constants::RateControlMethod::AVBR,
        RateControlMode::La => constants::RateControlMethod::LA,
        RateControlMode::Icq => constants::RateControlMethod::ICQ,
        RateControlMode::Vcm => constants::RateControlMethod::VCM,
        RateControlMode::LaIcq => constants::RateControlMethod::LA_ICQ,
        RateControlMode::LaHrd => constants::RateControlMethod::LA_HRD,
        RateControlMode::Qvbr => constants::RateControlMethod::QVBR,
    }
}

/// Layout of the frames written into encoder surfaces. NV12 input is
/// passed through; the other 4:2:0 layouts are converted to I420.
fn surface_layout(input: ColorFormat) -> ColorFormat {
    match input {
        ColorFormat::Nv12 => ColorFormat::Nv12,
        _ => ColorFormat::I420,
    }
}

fn surface_data(frame: VideoFrame) -> Result<Vec<u8>, CodecError> {
    if surface_layout(frame.fourcc) == frame.fourcc {
        Ok(frame.data)
    } else {
        Ok(frame.to_i420()?.data)
    }
}

fn mfx_fourcc(layout: ColorFormat) -> FourCC {
    match layout {
        ColorFormat::Nv12 => FourCC::NV12,
        _ => FourCC::IyuvOrI420,
    }
}

fn mfx_params(params: &EncoderParams, codec: constants::Codec) -> Result<MfxVideoParams, String> {
    let frame = &params.frame;
    let mut mfx = MfxVideoParams::default();

    mfx.set_codec(codec);
    mfx.set_target_usage(constants::TargetUsage::Level4);
    mfx.set_rate_control_method(mfx_rate_control(params.rate_control));
    if let Some(kbps) = params.target_kbps() {
        mfx.set_target_kbps(
            kbps.try_into()
                .map_err(|_| format!("target bitrate {kbps} kbps is out of range"))?,
        );
    }
    mfx.set_framerate(frame.frame_rate.0, frame.frame_rate.1);

    mfx.set_fourcc(mfx_fourcc(surface_layout(frame.fourcc)));
    mfx.set_chroma_format(constants::ChromaFormat::YUV420);
    mfx.set_io_pattern(MfxIoPattern::IN_SYSTEM_MEMORY);

    // Surfaces are 16-aligned; the crop is the visible frame.
    mfx.set_width(frame.aligned_width());
    mfx.set_height(frame.aligned_height());
    mfx.set_crop(frame.width, frame.height);
    Ok(mfx)
}

/// Channel ends of a running encode worker.
struct Worker {
    requests: Option<mpsc::Sender<Request>>,
    replies: mpsc::Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start `body` on its own thread and wait for it to report ready.
    fn spawn<F>(body: F) -> Result<Self, CodecError>
    where
        F: FnOnce(mpsc::Sender<Result<(), String>>, mpsc::Receiver<Request>, mpsc::Sender<Reply>)
            + Send
            + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("onevpl-encode".into())
            .spawn(move || body(ready_tx, request_rx, reply_tx))
            .map_err(|e| CodecError::init_failed(format!("failed to start encode worker: {e}")))?;

        let worker = Self {
            requests: Some(request_tx),
            replies: reply_rx,
            handle: Some(handle),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(worker),
            Ok(Err(msg)) => Err(CodecError::init_failed(msg)),
            Err(_) => Err(CodecError::init_failed("encode worker exited during setup")),
        }
    }

    fn call(&self, request: Request) -> Result<Reply, CodecError> {
        let exited = || CodecError::encode_failed("encode worker exited");
        self.requests
            .as_ref()
            .ok_or_else(exited)?
            .send(request)
            .map_err(|_| exited())?;
        self.replies.recv().map_err(|_| exited())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("oneVPL encode worker panicked");
            }
        }
    }
}

/// Worker thread body: owns the runtime objects for the whole session.
fn run_worker(
    implementation: Implementation,
    params: EncoderParams,
    ready: mpsc::Sender<Result<(), String>>,
    requests: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Reply>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to start async runtime: {e}")));
            return;
        }
    };
    runtime.block_on(serve(implementation, params, ready, requests, replies));
}

async fn serve(
    implementation: Implementation,
    params: EncoderParams,
    ready: mpsc::Sender<Result<(), String>>,
    requests: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Reply>,
) {
    macro_rules! setup {
        ($result:expr, $what:literal) => {
            match $result {
                Ok(value) => value,
                Err(e) => {
                    let _ = ready.send(Err(format!("{}: {:?}", $what, e)));
                    return;
                }
            }
        };
    }

    let codec = setup!(
        mfx_codec(params.codec).ok_or(params.codec),
        "codec not supported by oneVPL"
    );
    let surface_fourcc = mfx_fourcc(surface_layout(params.frame.fourcc));
    let mfx = setup!(mfx_params(&params, codec), "invalid parameters");

    let mut loader = setup!(Loader::new(), "failed to load the oneVPL dispatcher");
    let mfx_impl = match implementation {
        Implementation::Software => constants::Implementation::SOFTWARE,
        Implementation::Hardware => constants::Implementation::HARDWARE,
    };
    setup!(
        loader.set_filter_property("mfxImplDescription.Impl", mfx_impl, None),
        "failed to filter on implementation"
    );
    setup!(
        loader.set_filter_property(
            "mfxImplDescription.mfxEncoderDescription.encoder.CodecID",
            codec,
            None,
        ),
        "failed to filter on codec"
    );
    setup!(
        loader.set_filter_property(
            "mfxImplDescription.ApiVersion.Version",
            constants::ApiVersion::new(2, 2),
            None,
        ),
        "failed to filter on API version"
    );

    let session = setup!(
        loader.new_session(0),
        "no oneVPL implementation matches the request"
    );
    let mut encoder = setup!(session.encoder(mfx), "encoder rejected the parameters");
    let working = setup!(encoder.params(), "failed to read working parameters");

    let mut buffer = vec![0u8; working.suggested_buffer_size() as usize + BUFFER_HEADROOM];
    let mut bitstream = MfxBitstream::with_codec(&mut buffer, codec);

    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(request) = requests.recv() {
        let mut ctrl = EncodeCtrl::new();
        let (result, retained) = match request {
            Request::Frame(data) => {
                let mut surface = match encoder.get_surface() {
                    Ok(surface) => surface,
                    Err(e) => {
                        let _ = replies.send(Reply::Failed(format!("no free surface: {e:?}")));
                        continue;
                    }
                };
                if let Err(e) = surface
                    .read_raw_frame(&mut Cursor::new(&data[..]), surface_fourcc)
                    .await
                {
                    let _ = replies.send(Reply::Failed(format!("failed to fill surface: {e:?}")));
                    continue;
                }
                let result = encoder
                    .encode(&mut ctrl, Some(surface), &mut bitstream, None)
                    .await;
                (result, Some(data))
            }
            Request::Drain => (
                encoder.encode(&mut ctrl, None, &mut bitstream, None).await,
                None,
            ),
        };

        let reply = match result {
            Ok(written) if written > 0 => {
                let mut payload = Vec::with_capacity(bitstream.size() as usize);
                match std::io::copy(&mut bitstream, &mut payload) {
                    Ok(_) => Reply::Encoded(payload),
                    Err(e) => Reply::Failed(format!("failed to read bitstream: {e}")),
                }
            }
            Ok(_) | Err(MfxStatus::MoreData) => Reply::NeedMoreInput,
            Err(MfxStatus::DeviceBusy) => Reply::Busy(retained),
            Err(e) => Reply::Failed(format!("{e:?}")),
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// oneVPL encode session on a software or hardware implementation.
///
/// The runtime objects borrow each other and their encode calls are async,
/// so they live on a dedicated worker thread. Frames are read from the
/// source on the caller's thread and passed over a channel one at a time.
pub struct OneVplSession {
    implementation: Implementation,
    source: Box<dyn FrameSource>,
    worker: Option<Worker>,
    params: Option<EncoderParams>,
    /// Frame handed back by a busy device, resubmitted on the next call.
    pending: Option<Vec<u8>>,
    draining: bool,
    drained: bool,
}

impl OneVplSession {
    /// Create an uninitialized session reading from `source`.
    #[must_use]
    pub fn new(implementation: Implementation, source: Box<dyn FrameSource>) -> Self {
        Self {
            implementation,
            source,
            worker: None,
            params: None,
            pending: None,
            draining: false,
            drained: false,
        }
    }

    fn validate(params: &EncoderParams) -> Result<(), CodecError> {
        if mfx_codec(params.codec).is_none() {
            return Err(CodecError::unsupported_param(format!(
                "oneVPL has no {} encoder",
                params.codec
            )));
        }
        let frame = &params.frame;
        if frame.chroma != ChromaFormat::Yuv420 || !frame.fourcc.is_yuv420_8bit() {
            return Err(CodecError::unsupported_param(format!(
                "oneVPL session needs 8-bit 4:2:0 input, got {} ({})",
                frame.fourcc, frame.chroma
            )));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(CodecError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        if let Some(gop) = params.gop_size() {
            return Err(CodecError::unsupported_param(format!(
                "key frame distance {gop} is left to the runtime"
            )));
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
            (true, Some(kbps)) if kbps > u32::from(u16::MAX) => Err(
                CodecError::unsupported_param(format!("target bitrate {kbps} kbps is too high")),
            ),
            _ => Ok(()),
        }
    }
}

impl EncodeSession for OneVplSession {
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError> {
        Self::validate(params)?;

        let implementation = self.implementation;
        let worker_params = params.clone();
        let worker = Worker::spawn(move |ready, requests, replies| {
            run_worker(implementation, worker_params, ready, requests, replies)
        })?;

        self.worker = Some(worker);
        self.params = Some(params.clone());
        self.pending = None;
        self.draining = false;
        self.drained = false;

        tracing::debug!(
            "oneVPL {} session ready: {} {}x{}",
            self.implementation,
            params.codec,
            params.frame.width,
            params.frame.height
        );
        Ok(())
    }

    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        let codec = self
            .params
            .as_ref()
            .map(|p| p.codec)
            .ok_or(CodecError::NotInitialized)?;
        let worker = self.worker.as_ref().ok_or(CodecError::NotInitialized)?;
        if self.drained {
            return Ok(EncodeStatus::EndOfStream);
        }

        loop {
            let request = match self.pending.take() {
                Some(data) => Request::Frame(data),
                None if self.draining => Request::Drain,
                None => match self.source.read_frame()? {
                    Some(frame) => Request::Frame(surface_data(frame)?),
                    None => {
                        tracing::debug!("Frame source exhausted, draining encoder");
                        self.draining = true;
                        Request::Drain
                    }
                },
            };

            match worker.call(request)? {
                Reply::Encoded(data) => {
                    dst.frame_type = nal::frame_type(codec, &data);
                    dst.data = data;
                    dst.pts = None;
                    return Ok(EncodeStatus::Ok);
                }
                Reply::NeedMoreInput if self.draining => {
                    self.drained = true;
                    return Ok(EncodeStatus::EndOfStream);
                }
                Reply::NeedMoreInput => {}
                Reply::Busy(frame) => {
                    self.pending = frame;
                    return Ok(EncodeStatus::DeviceBusy);
                }
                Reply::Failed(msg) => return Err(CodecError::encode_failed(msg)),
            }
        }
    }

    fn working_params(&self) -> Result<EncoderParams, CodecError> {
        self.params.clone().ok_or(CodecError::NotInitialized)
    }

    fn implementation(&self) -> Implementation {
        self.implementation
    }
}
