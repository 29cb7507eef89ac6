//! End-to-end runs over real files with in-process sessions.

use std::fs;
use std::path::Path;

use clap::Parser;
use vplenc::codec::scripted::{ScriptStep, ScriptedSession};
use vplenc::codec::{
    expected_frame_size, Bitstream, Codec, CodecError, ColorFormat, EncodeSession, EncodeStatus,
    EncoderParams, FrameSource, FrameType, Implementation,
};
use vplenc::{run_with, CliArgs, EncodeConfig, EncodeError, FileConfig, ReportDocument};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 16;

/// Session that turns each source frame into a 16-byte payload, with an
/// I-frame every `gop` frames.
struct PassthroughSession {
    source: Box<dyn FrameSource>,
    params: Option<EncoderParams>,
    gop: u64,
}

impl EncodeSession for PassthroughSession {
    fn init(&mut self, params: &EncoderParams) -> Result<(), CodecError> {
        self.params = Some(params.clone());
        Ok(())
    }

    fn encode_frame(&mut self, dst: &mut Bitstream) -> Result<EncodeStatus, CodecError> {
        let Some(frame) = self.source.read_frame()? else {
            return Ok(EncodeStatus::EndOfStream);
        };
        dst.data = frame.data[..16].to_vec();
        dst.frame_type = if frame.index % self.gop == 0 {
            FrameType::I | FrameType::IDR
        } else {
            FrameType::P
        };
        dst.pts = Some(frame.index as i64 * 3000);
        Ok(EncodeStatus::Ok)
    }

    fn working_params(&self) -> Result<EncoderParams, CodecError> {
        self.params.clone().ok_or(CodecError::NotInitialized)
    }

    fn implementation(&self) -> Implementation {
        Implementation::Software
    }
}

fn write_input(dir: &Path, frames: usize) -> String {
    let size = expected_frame_size(WIDTH, HEIGHT, ColorFormat::I420);
    let mut bytes = Vec::with_capacity(size * frames);
    for i in 0..frames {
        bytes.extend(std::iter::repeat(i as u8).take(size));
    }
    let path = dir.join("input.yuv");
    fs::write(&path, bytes).unwrap();
    path.display().to_string()
}

fn config(args: &[&str]) -> Result<EncodeConfig, EncodeError> {
    let argv = std::iter::once("hello-encode").chain(args.iter().copied());
    EncodeConfig::resolve(CliArgs::try_parse_from(argv).unwrap(), FileConfig::default())
}

type SessionResult = Result<Box<dyn EncodeSession>, CodecError>;

fn scripted(
    steps: Vec<ScriptStep>,
) -> impl FnOnce(Implementation, Codec, Box<dyn FrameSource>) -> SessionResult {
    move |_, _, _| Ok(Box::new(ScriptedSession::new(steps)) as Box<dyn EncodeSession>)
}

#[test]
fn scripted_run_writes_output_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 3);
    let output = dir.path().join("out.hevc");
    let stats = dir.path().join("stats.json");
    let config = config(&[
        "-i",
        &input,
        "-o",
        output.to_str().unwrap(),
        "-w",
        "320",
        "-h",
        "240",
        "--stats",
        stats.to_str().unwrap(),
        "--id",
        "run-7",
    ])
    .unwrap();

    let outcome = run_with(
        &config,
        scripted(vec![
            ScriptStep::frame(1000, true),
            ScriptStep::Busy,
            ScriptStep::frame(200, false),
            ScriptStep::frame(250, false),
        ]),
    )
    .unwrap();

    assert_eq!(outcome.frames, 3);
    assert_eq!(outcome.bytes, 1450);
    assert_eq!(fs::metadata(&output).unwrap().len(), 1450);
    assert_eq!(outcome.report_path.as_deref(), Some(stats.as_path()));

    let text = fs::read_to_string(&stats).unwrap();
    assert!(text.ends_with("}\n"));
    let doc: ReportDocument = text.parse().unwrap();
    assert_eq!(doc.id, "run-7");
    assert_eq!(doc.framecount, 3);
    assert_eq!(doc.settings.codec, "hevc");
    assert_eq!(doc.settings.width, 320);
    assert_eq!(doc.settings.height, 240);
    assert_eq!(doc.settings.fps, 30);
    assert_eq!(doc.source_file, input);
    let sizes: Vec<u64> = doc.frames.iter().map(|f| f.size).collect();
    assert_eq!(sizes, vec![1000, 200, 250]);
    let iframes: Vec<u8> = doc.frames.iter().map(|f| f.iframe).collect();
    assert_eq!(iframes, vec![1, 0, 0]);
    let numbers: Vec<u64> = doc.frames.iter().map(|f| f.frame).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
    for frame in &doc.frames {
        assert_eq!(frame.pts, -1);
        assert_eq!(frame.proctime, frame.stoptime - frame.starttime);
    }
}

#[test]
fn frames_flow_from_file_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 5);
    let stats = dir.path().join("stats.json");
    let config = config(&[
        "-i",
        &input,
        "-w",
        &WIDTH.to_string(),
        "-h",
        &HEIGHT.to_string(),
        "-c",
        "avc",
        "--stats",
        stats.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(config.output, dir.path().join("input.h264"));

    let outcome = run_with(&config, |_, _, source| {
        Ok(Box::new(PassthroughSession {
            source,
            params: None,
            gop: 2,
        }) as Box<dyn EncodeSession>)
    })
    .unwrap();
    assert_eq!(outcome.frames, 5);

    let encoded = fs::read(&config.output).unwrap();
    assert_eq!(encoded.len(), 80);
    assert!(encoded[..16].iter().all(|&b| b == 0));
    assert!(encoded[64..].iter().all(|&b| b == 4));

    let doc: ReportDocument = fs::read_to_string(&stats).unwrap().parse().unwrap();
    let iframes: Vec<u8> = doc.frames.iter().map(|f| f.iframe).collect();
    assert_eq!(iframes, vec![1, 0, 1, 0, 1]);
    assert_eq!(doc.frames[3].pts, 9000);
}

#[test]
fn empty_input_gives_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 0);
    let stats = dir.path().join("stats.json");
    let config = config(&[
        "-i",
        &input,
        "-w",
        "32",
        "-h",
        "16",
        "--stats",
        stats.to_str().unwrap(),
    ])
    .unwrap();

    let outcome = run_with(&config, scripted(Vec::new())).unwrap();
    assert_eq!(outcome.frames, 0);

    let text = fs::read_to_string(&stats).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["framecount"], 0);
    assert_eq!(doc["frames"], serde_json::json!([]));
}

#[test]
fn unknown_codec_fails_before_any_file_is_touched() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 1);
    let stats = dir.path().join("stats.json");
    let err = config(&[
        "-i",
        &input,
        "-w",
        "32",
        "-h",
        "16",
        "-c",
        "foo",
        "--stats",
        stats.to_str().unwrap(),
    ])
    .unwrap_err();

    assert!(matches!(err, EncodeError::Config(_)));
    assert_eq!(err.exit_code(), libc::EINVAL);
    assert!(!stats.exists());
}

#[test]
fn missing_input_is_enoent() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.yuv");
    let config = config(&["-i", input.to_str().unwrap(), "-w", "32", "-h", "16"]).unwrap();

    let err = run_with(&config, scripted(Vec::new())).unwrap_err();
    assert!(matches!(err, EncodeError::Io { .. }));
    assert_eq!(err.exit_code(), libc::ENOENT);
}

#[test]
fn rejected_init_writes_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 1);
    let stats = dir.path().join("stats.json");
    let config = config(&[
        "-i",
        &input,
        "-w",
        "32",
        "-h",
        "16",
        "--stats",
        stats.to_str().unwrap(),
    ])
    .unwrap();

    let err = run_with(&config, |_, _, _| {
        let session = ScriptedSession::new(Vec::new()).reject_init("unsupported");
        Ok(Box::new(session) as Box<dyn EncodeSession>)
    })
    .unwrap_err();
    assert!(matches!(err, EncodeError::EncoderInit(_)));
    assert_eq!(err.exit_code(), libc::EIO);
    assert!(!stats.exists());
}

#[test]
fn runtime_failure_keeps_written_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 2);
    let stats = dir.path().join("stats.json");
    let config = config(&[
        "-i",
        &input,
        "-w",
        "32",
        "-h",
        "16",
        "--stats",
        stats.to_str().unwrap(),
    ])
    .unwrap();

    let err = run_with(
        &config,
        scripted(vec![ScriptStep::frame(64, true), ScriptStep::Status(-17)]),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::EncoderRuntime(_)));
    assert_eq!(err.exit_code(), libc::EIO);
    assert_eq!(fs::metadata(&config.output).unwrap().len(), 64);
    assert!(!stats.exists());
}

#[cfg(not(feature = "onevpl"))]
#[test]
fn hardware_session_needs_onevpl() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), 1);
    let config = config(&["-i", &input, "-w", "32", "-h", "16", "--use-hw"]).unwrap();

    let err = vplenc::run(&config).unwrap_err();
    assert!(matches!(err, EncodeError::EncoderInit(CodecError::NoImplementation(_))));
    assert_eq!(err.exit_code(), libc::EIO);
}
