//! Per-frame encode statistics and the JSON report writer.
//!
//! A [`Statistics`] value moves through three states:
//!
//! ```text
//! Empty --start()--> Accumulating --finalize()--> Finalized
//!   \______________________finalize()_______________/
//! ```
//!
//! Frames can only be recorded while accumulating, and the report can only
//! be serialized once finalized. Sequence numbers are assigned by the
//! accumulator in push order, so they are contiguous from zero and only
//! count frames that were actually recorded.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::report::{EncodingSettings, FrameEntry, ReportDocument};

/// Tool version written to every report.
pub const ENCAPP_VERSION: &str = "1.6";

/// Identifier written when none is configured.
pub const DEFAULT_ID: &str = "42";

/// Description written when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "onevpl encoder test";

/// Test name written when none is configured.
pub const DEFAULT_TEST: &str = "test encoder parameters";

/// Test definition reference written when none is configured.
pub const DEFAULT_TEST_DEFINITION: &str = "n/a";

const INDENT: &[u8] = b"    ";

/// Wall-clock time in milliseconds since the UNIX epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Errors raised by misuse of [`Statistics`] or while writing the report.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("frames can only be recorded between start and finalize")]
    NotAccumulating,

    #[error("statistics already started")]
    AlreadyStarted,

    #[error("statistics already finalized")]
    AlreadyFinalized,

    #[error("statistics not finalized")]
    NotFinalized,

    #[error("frame count mismatch: {counted} counted, {recorded} recorded")]
    FrameCountMismatch { counted: u64, recorded: u64 },

    #[error("stop time {stop} is before start time {start}")]
    InvalidTiming { start: i64, stop: i64 },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

/// Measurements for one encoded frame, before it is numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    pub is_key_frame: bool,
    pub byte_size: u64,
    /// `None` when the session reported no timestamp.
    pub presentation_timestamp: Option<i64>,
    /// Milliseconds since the UNIX epoch.
    pub encode_start_time: i64,
    /// Milliseconds since the UNIX epoch, not before `encode_start_time`.
    pub encode_stop_time: i64,
}

/// A recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    /// Zero-based position in encode order.
    pub sequence_number: u64,
    pub is_key_frame: bool,
    pub byte_size: u64,
    pub presentation_timestamp: Option<i64>,
    pub encode_start_time: i64,
    pub encode_stop_time: i64,
}

impl FrameRecord {
    /// Encode time of this frame in milliseconds.
    #[must_use]
    pub fn proctime(&self) -> i64 {
        self.encode_stop_time - self.encode_start_time
    }

    fn to_entry(self) -> FrameEntry {
        FrameEntry {
            frame: self.sequence_number,
            iframe: u8::from(self.is_key_frame),
            size: self.byte_size,
            pts: self.presentation_timestamp.unwrap_or(-1),
            proctime: self.proctime(),
            starttime: self.encode_start_time,
            stoptime: self.encode_stop_time,
        }
    }
}

/// Descriptive fields attached to a run when it is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    pub id: String,
    pub description: String,
    pub test: String,
    pub test_definition: String,
    pub date: String,
    pub encapp_version: String,
    pub encoded_file: String,
    pub source_file: String,
}

impl RunMetadata {
    /// Metadata for a run from `source_file` to `encoded_file`, dated today.
    #[must_use]
    pub fn new(source_file: impl Into<String>, encoded_file: impl Into<String>) -> Self {
        Self {
            id: DEFAULT_ID.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            test: DEFAULT_TEST.to_string(),
            test_definition: DEFAULT_TEST_DEFINITION.to_string(),
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            encapp_version: ENCAPP_VERSION.to_string(),
            encoded_file: encoded_file.into(),
            source_file: source_file.into(),
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn test(mut self, test: impl Into<String>) -> Self {
        self.test = test.into();
        self
    }

    #[must_use]
    pub fn test_definition(mut self, test_definition: impl Into<String>) -> Self {
        self.test_definition = test_definition.into();
        self
    }

    #[must_use]
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }
}

/// Lifecycle of a [`Statistics`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsState {
    Empty,
    Accumulating {
        started_at: i64,
    },
    Finalized {
        metadata: RunMetadata,
        proctime: i64,
        framecount: u64,
    },
}

/// Accumulates frame records for one run and writes the JSON report.
#[derive(Debug, Clone)]
pub struct Statistics {
    settings: EncodingSettings,
    frames: Vec<FrameRecord>,
    state: StatsState,
}

impl Statistics {
    /// Create empty statistics for a run with the given settings.
    #[must_use]
    pub fn new(settings: EncodingSettings) -> Self {
        Self {
            settings,
            frames: Vec::new(),
            state: StatsState::Empty,
        }
    }

    /// Start accumulating, using the current time as the run start.
    pub fn start(&mut self) -> Result<(), StatsError> {
        self.start_at(now_ms())
    }

    /// Start accumulating with an explicit run start in milliseconds.
    pub fn start_at(&mut self, started_at: i64) -> Result<(), StatsError> {
        match self.state {
            StatsState::Empty => {
                self.state = StatsState::Accumulating { started_at };
                Ok(())
            }
            StatsState::Accumulating { .. } => Err(StatsError::AlreadyStarted),
            StatsState::Finalized { .. } => Err(StatsError::AlreadyFinalized),
        }
    }

    /// Append a frame and return the sequence number assigned to it.
    pub fn record_frame(&mut self, sample: FrameSample) -> Result<u64, StatsError> {
        if !matches!(self.state, StatsState::Accumulating { .. }) {
            return Err(StatsError::NotAccumulating);
        }
        if sample.encode_stop_time < sample.encode_start_time {
            return Err(StatsError::InvalidTiming {
                start: sample.encode_start_time,
                stop: sample.encode_stop_time,
            });
        }

        let sequence_number = self.frames.len() as u64;
        self.frames.push(FrameRecord {
            sequence_number,
            is_key_frame: sample.is_key_frame,
            byte_size: sample.byte_size,
            presentation_timestamp: sample.presentation_timestamp,
            encode_start_time: sample.encode_start_time,
            encode_stop_time: sample.encode_stop_time,
        });
        Ok(sequence_number)
    }

    /// Close the run at the current time.
    ///
    /// `counted_frames` is the driver's own count of successful encodes and
    /// must agree with the number of recorded frames.
    pub fn finalize(&mut self, metadata: RunMetadata, counted_frames: u64) -> Result<(), StatsError> {
        self.finalize_at(metadata, counted_frames, now_ms())
    }

    /// Close the run with an explicit stop time in milliseconds.
    pub fn finalize_at(
        &mut self,
        metadata: RunMetadata,
        counted_frames: u64,
        stopped_at: i64,
    ) -> Result<(), StatsError> {
        let proctime = match self.state {
            StatsState::Finalized { .. } => return Err(StatsError::AlreadyFinalized),
            StatsState::Empty => 0,
            StatsState::Accumulating { started_at } if stopped_at < started_at => {
                return Err(StatsError::InvalidTiming {
                    start: started_at,
                    stop: stopped_at,
                })
            }
            StatsState::Accumulating { started_at } => stopped_at - started_at,
        };

        let recorded = self.frames.len() as u64;
        if counted_frames != recorded {
            return Err(StatsError::FrameCountMismatch {
                counted: counted_frames,
                recorded,
            });
        }

        tracing::debug!("Statistics finalized: {} frames in {} ms", recorded, proctime);
        self.state = StatsState::Finalized {
            metadata,
            proctime,
            framecount: recorded,
        };
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> &EncodingSettings {
        &self.settings
    }

    /// Recorded frames in encode order.
    #[must_use]
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    #[must_use]
    pub fn state(&self) -> &StatsState {
        &self.state
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self.state, StatsState::Finalized { .. })
    }

    /// Total processing time, once finalized.
    #[must_use]
    pub fn proctime(&self) -> Option<i64> {
        match self.state {
            StatsState::Finalized { proctime, .. } => Some(proctime),
            _ => None,
        }
    }

    /// Build the report document. Only valid once finalized.
    pub fn document(&self) -> Result<ReportDocument, StatsError> {
        let StatsState::Finalized {
            metadata,
            proctime,
            framecount,
        } = &self.state
        else {
            return Err(StatsError::NotFinalized);
        };

        Ok(ReportDocument {
            id: metadata.id.clone(),
            description: metadata.description.clone(),
            test: metadata.test.clone(),
            test_definition: metadata.test_definition.clone(),
            date: metadata.date.clone(),
            encapp_version: metadata.encapp_version.clone(),
            proctime: *proctime,
            framecount: *framecount,
            encoded_file: metadata.encoded_file.clone(),
            source_file: metadata.source_file.clone(),
            settings: self.settings.clone(),
            frames: self.frames.iter().map(|f| f.to_entry()).collect(),
        })
    }

    /// Write the report as 4-space indented JSON followed by a newline.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), StatsError> {
        let doc = self.document()?;
        let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(INDENT));
        doc.serialize(&mut ser)?;
        let mut writer = ser.into_inner();
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the report to a string.
    pub fn serialize(&self) -> Result<String, StatsError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| StatsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Write the report to `path`, replacing any existing file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), StatsError> {
        // No file is created when the report cannot be built.
        let doc = self.serialize()?;
        let mut file = BufWriter::new(File::create(path.as_ref())?);
        file.write_all(doc.as_bytes())?;
        file.flush()?;
        tracing::info!("Wrote statistics to {}", path.as_ref().display());
        Ok(())
    }
}
