//! The encode run: open files, drive the session, record statistics.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vplenc_codec::{
    Bitstream, Codec, CodecError, EncodeSession, EncodeStatus, FrameSource, Implementation,
    RawFrameReader,
};

use crate::config::EncodeConfig;
use crate::encoder::{VideoEncoder, SYNC_TIMEOUT};
use crate::error::EncodeError;
use crate::statistics::{now_ms, FrameSample, Statistics};

/// Pause before retrying an encode that reported a busy device.
pub const BUSY_WAIT: Duration = Duration::from_millis(1);

/// Timing knobs for [`encode_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    /// Sleep between busy retries.
    pub busy_wait: Duration,
    /// Upper bound on the wait for each payload.
    pub sync_timeout: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            busy_wait: BUSY_WAIT,
            sync_timeout: SYNC_TIMEOUT,
        }
    }
}

/// Destination for encoded payloads.
pub struct EncodedOutput<W: Write> {
    path: PathBuf,
    writer: W,
    bytes_written: u64,
}

impl<W: Write> EncodedOutput<W> {
    /// Wrap `writer`; `path` is only used in error messages.
    pub fn new(path: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            path: path.into(),
            writer,
            bytes_written: 0,
        }
    }

    /// Append one payload.
    pub fn write_frame(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.writer
            .write_all(data)
            .map_err(|e| EncodeError::io(&self.path, e))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.writer.flush().map_err(|e| EncodeError::io(&self.path, e))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Counts from one pass of [`encode_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSummary {
    /// Successful encodes.
    pub frames: u64,
    /// Busy retries.
    pub busy_retries: u64,
    /// Payload bytes written.
    pub bytes: u64,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub frames: u64,
    pub bytes: u64,
    /// Total processing time in milliseconds.
    pub proctime: i64,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
}

/// Encode until the session reports end of stream.
///
/// Every successful encode is written to `output` and recorded in `stats`,
/// which must already be started. Busy retries are neither written nor
/// recorded. The output is flushed before returning, whatever the outcome.
pub fn encode_loop<W: Write>(
    encoder: &mut VideoEncoder,
    output: &mut EncodedOutput<W>,
    stats: &mut Statistics,
    options: &LoopOptions,
) -> Result<LoopSummary, EncodeError> {
    let result = drive(encoder, output, stats, options);
    match (result, output.flush()) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), flushed) => {
            if let Err(flush_err) = flushed {
                tracing::warn!("Failed to flush output after error: {}", flush_err);
            }
            Err(e)
        }
    }
}

fn drive<W: Write>(
    encoder: &mut VideoEncoder,
    output: &mut EncodedOutput<W>,
    stats: &mut Statistics,
    options: &LoopOptions,
) -> Result<LoopSummary, EncodeError> {
    let mut summary = LoopSummary::default();
    let mut bitstream = Bitstream::new();

    loop {
        bitstream.clear();
        let start = now_ms();
        let status = encoder
            .encode_one_frame(&mut bitstream)
            .map_err(|e| EncodeError::runtime(e.to_string()))?;
        // The wall clock may step backwards between the two reads.
        let stop = now_ms().max(start);

        match status {
            EncodeStatus::Ok => {
                encoder
                    .sync_output(&mut bitstream, options.sync_timeout)
                    .map_err(|e| EncodeError::runtime(e.to_string()))?;
                output.write_frame(&bitstream.data)?;
                stats.record_frame(FrameSample {
                    is_key_frame: bitstream.frame_type.is_intra(),
                    byte_size: bitstream.len() as u64,
                    presentation_timestamp: bitstream.pts,
                    encode_start_time: start,
                    encode_stop_time: stop,
                })?;
                summary.frames += 1;
                summary.bytes += bitstream.len() as u64;
            }
            EncodeStatus::EndOfStream => {
                tracing::info!("End of stream reached");
                break;
            }
            EncodeStatus::DeviceBusy => {
                tracing::debug!("Device busy, retrying in {:?}", options.busy_wait);
                summary.busy_retries += 1;
                std::thread::sleep(options.busy_wait);
            }
            EncodeStatus::Other(code) => {
                return Err(EncodeError::runtime(format!(
                    "unknown encode status: {code}"
                )));
            }
        }
    }

    Ok(summary)
}

/// Run an encode with the session selected for the configuration.
pub fn run(config: &EncodeConfig) -> Result<RunOutcome, EncodeError> {
    run_with(config, vplenc_codec::open_session)
}

/// Run an encode with a session built by `factory` from the frame source.
pub fn run_with<F>(config: &EncodeConfig, factory: F) -> Result<RunOutcome, EncodeError>
where
    F: FnOnce(
        Implementation,
        Codec,
        Box<dyn FrameSource>,
    ) -> Result<Box<dyn EncodeSession>, CodecError>,
{
    let input = File::open(&config.input).map_err(|e| EncodeError::io(&config.input, e))?;
    let output = File::create(&config.output).map_err(|e| EncodeError::io(&config.output, e))?;

    let reader = RawFrameReader::new(
        BufReader::new(input),
        config.width,
        config.height,
        config.color_format,
    )?;
    let session = factory(config.implementation, config.codec, Box::new(reader))?;

    let mut encoder = VideoEncoder::new(session);
    encoder.initialize(
        config.frame_params(),
        config.codec,
        config.color_format,
        config.rate_control,
        &config.ext_params(),
    )?;

    tracing::info!(
        "Encoding {} -> {}",
        config.input.display(),
        config.output.display()
    );

    let mut output = EncodedOutput::new(&config.output, BufWriter::new(output));
    let mut stats = Statistics::new(config.encoding_settings());
    stats.start()?;

    let summary = encode_loop(&mut encoder, &mut output, &mut stats, &LoopOptions::default())?;
    stats.finalize(config.run_metadata(), summary.frames)?;

    tracing::info!(
        "Encoded {} frames ({} bytes, {} busy retries)",
        summary.frames,
        summary.bytes,
        summary.busy_retries
    );

    if let Some(path) = &config.stats_path {
        stats.write_file(path)?;
    }

    match encoder.current_parameters() {
        Ok(params) => tracing::info!("-- Encode information --\n{}", params),
        Err(e) => tracing::warn!("Could not read working parameters: {}", e),
    }

    Ok(RunOutcome {
        frames: summary.frames,
        bytes: summary.bytes,
        proctime: stats.proctime().unwrap_or(0),
        output_path: config.output.clone(),
        report_path: config.stats_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::EncodingSettings;
    use vplenc_codec::scripted::{ScriptStep, ScriptedSession};
    use vplenc_codec::{ColorFormat, FrameParams, RateControlMode};

    fn encoder(steps: Vec<ScriptStep>) -> VideoEncoder {
        let mut encoder = VideoEncoder::new(Box::new(ScriptedSession::new(steps)));
        encoder
            .initialize(
                FrameParams::new(320, 240),
                Codec::Hevc,
                ColorFormat::I420,
                RateControlMode::Cqp,
                &[],
            )
            .unwrap();
        encoder
    }

    fn started_stats() -> Statistics {
        let mut stats = Statistics::new(EncodingSettings::new("hevc", 320, 240, 30));
        stats.start().unwrap();
        stats
    }

    fn fast() -> LoopOptions {
        LoopOptions {
            busy_wait: Duration::ZERO,
            ..LoopOptions::default()
        }
    }

    #[test]
    fn test_busy_retries_do_not_consume_numbers() {
        let mut encoder = encoder(vec![
            ScriptStep::frame(1000, true),
            ScriptStep::Busy,
            ScriptStep::Busy,
            ScriptStep::frame(200, false),
            ScriptStep::Busy,
            ScriptStep::frame(250, false),
        ]);
        let mut output = EncodedOutput::new("out.hevc", Vec::new());
        let mut stats = started_stats();

        let summary = encode_loop(&mut encoder, &mut output, &mut stats, &fast()).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.busy_retries, 3);
        assert_eq!(summary.bytes, 1450);
        assert_eq!(output.bytes_written(), 1450);
        assert_eq!(output.into_inner().len(), 1450);

        let numbers: Vec<u64> = stats.frames().iter().map(|f| f.sequence_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        let keys: Vec<bool> = stats.frames().iter().map(|f| f.is_key_frame).collect();
        assert_eq!(keys, vec![true, false, false]);
        assert!(stats.frames().iter().all(|f| f.proctime() >= 0));
    }

    #[test]
    fn test_unknown_status_stops_with_runtime_error() {
        let mut encoder = encoder(vec![
            ScriptStep::frame(10, true),
            ScriptStep::Status(-3),
            ScriptStep::frame(10, false),
        ]);
        let mut output = EncodedOutput::new("out.hevc", Vec::new());
        let mut stats = started_stats();

        let err = encode_loop(&mut encoder, &mut output, &mut stats, &fast()).unwrap_err();
        assert!(matches!(err, EncodeError::EncoderRuntime(_)));
        assert_eq!(err.exit_code(), libc::EIO);
        // Bytes before the failure stay written.
        assert_eq!(output.bytes_written(), 10);
        assert_eq!(stats.frames().len(), 1);
    }

    #[test]
    fn test_session_failure_is_runtime_error() {
        let mut encoder = encoder(vec![ScriptStep::Fail("device lost".into())]);
        let mut output = EncodedOutput::new("out.hevc", Vec::new());
        let mut stats = started_stats();

        let err = encode_loop(&mut encoder, &mut output, &mut stats, &fast()).unwrap_err();
        assert!(err.to_string().contains("device lost"));
    }

    #[test]
    fn test_immediate_end_of_stream() {
        let mut encoder = encoder(Vec::new());
        let mut output = EncodedOutput::new("out.hevc", Vec::new());
        let mut stats = started_stats();

        let summary = encode_loop(&mut encoder, &mut output, &mut stats, &fast()).unwrap();
        assert_eq!(summary, LoopSummary::default());
        assert!(stats.frames().is_empty());
    }

    #[test]
    fn test_pts_is_carried_into_records() {
        let mut encoder = encoder(vec![ScriptStep::Frame {
            data: vec![1; 4],
            frame_type: vplenc_codec::FrameType::I,
            pts: Some(3000),
        }]);
        let mut output = EncodedOutput::new("out.hevc", Vec::new());
        let mut stats = started_stats();

        encode_loop(&mut encoder, &mut output, &mut stats, &fast()).unwrap();
        assert_eq!(stats.frames()[0].presentation_timestamp, Some(3000));
    }
}
