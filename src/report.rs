//! JSON statistics report: document model, reading, and per-run summary.
//!
//! The document is what [`Statistics`](crate::statistics::Statistics)
//! writes. Field order here is the key order on disk.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Encoder settings recorded in the report, fixed before encoding starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Codec name as given on the command line.
    pub codec: String,
    /// Key frame distance, `-1` when unset.
    pub gop: i32,
    pub fps: u32,
    /// Requested bitrate descriptor, e.g. `"2500 kbps"`.
    pub bitrate: String,
    /// Measured mean bitrate descriptor, empty when not measured.
    pub mean_bitrate: String,
    pub width: u32,
    pub height: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self::new(String::new(), 0, 0, 0)
    }
}

impl EncodingSettings {
    /// Settings for `codec` at the given geometry, with no gop or bitrate.
    #[must_use]
    pub fn new(codec: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            codec: codec.into(),
            gop: -1,
            fps,
            bitrate: String::new(),
            mean_bitrate: String::new(),
            width,
            height,
        }
    }

    /// Set the key frame distance.
    #[must_use]
    pub fn gop(mut self, gop: u32) -> Self {
        self.gop = i32::try_from(gop).unwrap_or(i32::MAX);
        self
    }

    /// Set the requested bitrate descriptor.
    #[must_use]
    pub fn bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Set the mean bitrate descriptor.
    #[must_use]
    pub fn mean_bitrate(mut self, mean_bitrate: impl Into<String>) -> Self {
        self.mean_bitrate = mean_bitrate.into();
        self
    }
}

/// One entry of the `frames` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub frame: u64,
    /// 1 for intra frames, 0 otherwise.
    pub iframe: u8,
    pub size: u64,
    /// Presentation timestamp, `-1` when unknown.
    pub pts: i64,
    /// `stoptime - starttime` in milliseconds.
    pub proctime: i64,
    pub starttime: i64,
    pub stoptime: i64,
}

impl FrameEntry {
    #[must_use]
    pub fn is_key_frame(&self) -> bool {
        self.iframe != 0
    }
}

/// The full report as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: String,
    pub description: String,
    pub test: String,
    #[serde(rename = "testdefinition")]
    pub test_definition: String,
    pub date: String,
    pub encapp_version: String,
    /// Total processing time in milliseconds.
    pub proctime: i64,
    pub framecount: u64,
    #[serde(rename = "encodedfile")]
    pub encoded_file: String,
    #[serde(rename = "sourcefile")]
    pub source_file: String,
    /// Older reports carry no settings block.
    #[serde(default)]
    pub settings: EncodingSettings,
    pub frames: Vec<FrameEntry>,
}

impl ReportDocument {
    /// Parse a report from a reader.
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

impl FromStr for ReportDocument {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Aggregate figures for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub frame_count: u64,
    pub iframe_count: u64,
    pub total_bytes: u64,
    pub mean_size: f64,
    pub max_size: u64,
    /// Mean per-frame processing time in milliseconds.
    pub mean_proctime: f64,
    pub max_proctime: i64,
    /// `total_bytes * 8 * fps / frames / 1000`; `None` without frames or fps.
    pub effective_kbps: Option<f64>,
    /// Distances in frames between consecutive I-frames, in report order.
    pub iframe_intervals: Vec<u64>,
}

impl ReportSummary {
    /// Summarize a parsed report.
    #[must_use]
    pub fn from_document(doc: &ReportDocument) -> Self {
        let frames = &doc.frames;
        let frame_count = frames.len() as u64;
        let total_bytes: u64 = frames.iter().map(|f| f.size).sum();
        let max_size = frames.iter().map(|f| f.size).max().unwrap_or(0);
        let max_proctime = frames.iter().map(|f| f.proctime).max().unwrap_or(0);

        let (mean_size, mean_proctime) = if frames.is_empty() {
            (0.0, 0.0)
        } else {
            let n = frames.len() as f64;
            let proctime: i64 = frames.iter().map(|f| f.proctime).sum();
            (total_bytes as f64 / n, proctime as f64 / n)
        };

        let fps = doc.settings.fps;
        let effective_kbps = (frame_count > 0 && fps > 0).then(|| {
            total_bytes as f64 * 8.0 * f64::from(fps) / frame_count as f64 / 1000.0
        });

        let keys: Vec<u64> = frames
            .iter()
            .filter(|f| f.is_key_frame())
            .map(|f| f.frame)
            .collect();
        let iframe_intervals = keys.windows(2).map(|w| w[1].abs_diff(w[0])).collect();

        Self {
            frame_count,
            iframe_count: keys.len() as u64,
            total_bytes,
            mean_size,
            max_size,
            mean_proctime,
            max_proctime,
            effective_kbps,
            iframe_intervals,
        }
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames:          {}", self.frame_count)?;
        writeln!(f, "I-frames:        {}", self.iframe_count)?;
        writeln!(f, "Total bytes:     {}", self.total_bytes)?;
        writeln!(
            f,
            "Frame size:      mean {:.1}, max {}",
            self.mean_size, self.max_size
        )?;
        writeln!(
            f,
            "Proctime (ms):   mean {:.2}, max {}",
            self.mean_proctime, self.max_proctime
        )?;
        match self.effective_kbps {
            Some(kbps) => writeln!(f, "Bitrate:         {kbps:.1} kbps")?,
            None => writeln!(f, "Bitrate:         n/a")?,
        }
        if self.iframe_intervals.is_empty() {
            write!(f, "I-frame interval: n/a")
        } else {
            let intervals: Vec<String> =
                self.iframe_intervals.iter().map(u64::to_string).collect();
            write!(f, "I-frame interval: {}", intervals.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(frame: u64, key: bool, size: u64, start: i64, stop: i64) -> FrameEntry {
        FrameEntry {
            frame,
            iframe: u8::from(key),
            size,
            pts: -1,
            proctime: stop - start,
            starttime: start,
            stoptime: stop,
        }
    }

    fn document(frames: Vec<FrameEntry>) -> ReportDocument {
        ReportDocument {
            id: "42".into(),
            description: "test".into(),
            test: String::new(),
            test_definition: String::new(),
            date: "2026-01-01".into(),
            encapp_version: "1.6".into(),
            proctime: 100,
            framecount: frames.len() as u64,
            encoded_file: "out.hevc".into(),
            source_file: "in.yuv".into(),
            settings: EncodingSettings::new("hevc", 320, 240, 30),
            frames,
        }
    }

    #[test]
    fn test_summary_figures() {
        let doc = document(vec![
            entry(0, true, 1000, 0, 10),
            entry(1, false, 200, 10, 18),
            entry(2, false, 250, 18, 25),
            entry(3, true, 950, 25, 40),
        ]);
        let summary = ReportSummary::from_document(&doc);
        assert_eq!(summary.frame_count, 4);
        assert_eq!(summary.iframe_count, 2);
        assert_eq!(summary.total_bytes, 2400);
        assert_eq!(summary.max_size, 1000);
        assert!((summary.mean_size - 600.0).abs() < 1e-9);
        assert_eq!(summary.max_proctime, 15);
        assert!((summary.mean_proctime - 10.0).abs() < 1e-9);
        // 2400 bytes * 8 * 30 fps / 4 frames / 1000
        assert!((summary.effective_kbps.unwrap() - 144.0).abs() < 1e-9);
        assert_eq!(summary.iframe_intervals, vec![3]);
    }

    #[test]
    fn test_summary_of_empty_report() {
        let summary = ReportSummary::from_document(&document(Vec::new()));
        assert_eq!(summary.frame_count, 0);
        assert_eq!(summary.effective_kbps, None);
        assert!(summary.iframe_intervals.is_empty());
        assert!(summary.to_string().contains("n/a"));
    }

    #[test]
    fn test_parse_report_without_settings() {
        let json = r#"{
            "id": "42", "description": "onevpl encoder test", "test": "",
            "testdefinition": "", "date": "today", "encapp_version": "1.6",
            "proctime": 25, "framecount": 1, "encodedfile": "out.hevc",
            "sourcefile": "in.yuv",
            "frames": [ { "frame": 0, "iframe": 1, "size": 1000, "pts": -1,
                          "proctime": 10, "starttime": 0, "stoptime": 10 } ]
        }"#;
        let doc: ReportDocument = json.parse().unwrap();
        assert_eq!(doc.settings, EncodingSettings::default());
        assert_eq!(doc.settings.gop, -1);
        assert_eq!(doc.frames.len(), 1);
        assert!(doc.frames[0].is_key_frame());
        assert_eq!(ReportSummary::from_document(&doc).effective_kbps, None);
    }

    #[test]
    fn test_out_of_order_iframes() {
        let doc = document(vec![
            entry(5, true, 900, 0, 10),
            entry(2, true, 800, 10, 20),
            entry(9, true, 850, 20, 30),
        ]);
        let summary = ReportSummary::from_document(&doc);
        assert_eq!(summary.iframe_count, 3);
        assert_eq!(summary.iframe_intervals, vec![3, 7]);
    }

    #[test]
    fn test_gop_unset_is_negative() {
        assert_eq!(EncodingSettings::default().gop, -1);
        assert_eq!(EncodingSettings::new("avc", 16, 16, 30).gop, -1);
        assert_eq!(EncodingSettings::new("avc", 16, 16, 30).gop(60).gop, 60);
    }
}
