//! Raw video frames and the flat-file frame reader.

use std::io::{self, Read};

use crate::{CodecError, ColorFormat};

/// A raw video frame read from the input.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout of the frame data.
    pub fourcc: ColorFormat,
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Zero-based position of the frame in the input.
    pub index: u64,
}

impl VideoFrame {
    /// Create a new video frame.
    #[must_use]
    pub fn new(width: u32, height: u32, fourcc: ColorFormat, data: Vec<u8>, index: u64) -> Self {
        Self {
            width,
            height,
            fourcc,
            data,
            index,
        }
    }

    /// Convert an 8-bit 4:2:0 frame to planar I420.
    ///
    /// If the frame is already I420, returns a clone.
    pub fn to_i420(&self) -> Result<VideoFrame, CodecError> {
        let data = match self.fourcc {
            ColorFormat::I420 => return Ok(self.clone()),
            ColorFormat::Yv12 => yv12_to_i420(&self.data, self.width, self.height)?,
            ColorFormat::Nv12 => semiplanar_to_i420(&self.data, self.width, self.height, false)?,
            ColorFormat::Nv21 => semiplanar_to_i420(&self.data, self.width, self.height, true)?,
            other => {
                return Err(CodecError::unsupported_param(format!(
                    "conversion from {other} to i420 not implemented"
                )))
            }
        };
        Ok(VideoFrame::new(
            self.width,
            self.height,
            ColorFormat::I420,
            data,
            self.index,
        ))
    }
}

/// Calculate the size of one frame for the given dimensions and layout.
///
/// Subsampled chroma planes round odd dimensions up.
#[must_use]
pub fn expected_frame_size(width: u32, height: u32, format: ColorFormat) -> usize {
    let w = width as usize;
    let h = height as usize;
    let pixels = w * h;
    let half_w = w.div_ceil(2);
    let half_h = h.div_ceil(2);
    match format {
        ColorFormat::Nv12 | ColorFormat::Yv12 | ColorFormat::Nv21 | ColorFormat::I420 => {
            pixels + 2 * half_w * half_h
        }
        ColorFormat::P010 | ColorFormat::P016 | ColorFormat::I010 => {
            2 * (pixels + 2 * half_w * half_h)
        }
        ColorFormat::Nv16 | ColorFormat::I422 => pixels + 2 * half_w * h,
        ColorFormat::P210 | ColorFormat::I210 => 2 * (pixels + 2 * half_w * h),
        ColorFormat::Yuy2 | ColorFormat::Uyvy => half_w * 4 * h,
        ColorFormat::Y210 | ColorFormat::Y216 => half_w * 8 * h,
        ColorFormat::Y410
        | ColorFormat::Ayuv
        | ColorFormat::AyuvRgb4
        | ColorFormat::Bgra
        | ColorFormat::Bgr4
        | ColorFormat::A2Rgb10 => pixels * 4,
        ColorFormat::Y416 | ColorFormat::Argb16 | ColorFormat::Abgr16 => pixels * 8,
        ColorFormat::Rgb3 | ColorFormat::Rgbp | ColorFormat::Bgrp => pixels * 3,
        ColorFormat::Rgb565 | ColorFormat::R16 => pixels * 2,
        ColorFormat::P8 | ColorFormat::P8Texture => pixels,
    }
}

/// A source of raw frames consumed by an encode session.
pub trait FrameSource {
    /// Read the next frame, or `None` at end of input.
    fn read_frame(&mut self) -> io::Result<Option<VideoFrame>>;
}

/// Reads concatenated raw frames of a fixed size from a byte stream.
///
/// There are no frame boundary markers: the frame size is derived from the
/// layout and dimensions. A trailing partial frame is dropped with a warning.
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    fourcc: ColorFormat,
    frame_size: usize,
    frames_read: u64,
    finished: bool,
}

impl<R: Read> RawFrameReader<R> {
    /// Create a reader for frames of the given geometry.
    pub fn new(reader: R, width: u32, height: u32, fourcc: ColorFormat) -> Result<Self, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions { width, height });
        }
        Ok(Self {
            reader,
            width,
            height,
            fourcc,
            frame_size: expected_frame_size(width, height, fourcc),
            frames_read: 0,
            finished: false,
        })
    }

    /// Bytes per frame.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of complete frames returned so far.
    #[must_use]
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Fill `buf` as far as the stream allows, returning the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for RawFrameReader<R> {
    fn read_frame(&mut self) -> io::Result<Option<VideoFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.frame_size];
        let filled = self.fill(&mut data)?;
        if filled < self.frame_size {
            self.finished = true;
            if filled > 0 {
                tracing::warn!(
                    "Dropping trailing partial frame: {} of {} bytes",
                    filled,
                    self.frame_size
                );
            }
            return Ok(None);
        }

        let frame = VideoFrame::new(self.width, self.height, self.fourcc, data, self.frames_read);
        self.frames_read += 1;
        Ok(Some(frame))
    }
}

// ============================================================================
// Layout conversion functions
// ============================================================================

fn check_size(data: &[u8], width: u32, height: u32, name: &str) -> Result<(), CodecError> {
    let expected = expected_frame_size(width, height, ColorFormat::I420);
    if data.len() != expected {
        return Err(CodecError::unsupported_param(format!(
            "{} data size mismatch: expected {}, got {}",
            name,
            expected,
            data.len()
        )));
    }
    Ok(())
}

/// Convert YV12 (Y, V, U planes) to I420 (Y, U, V planes).
fn yv12_to_i420(yv12: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CodecError> {
    check_size(yv12, width, height, "YV12")?;
    let y_size = width as usize * height as usize;
    let uv_size = (yv12.len() - y_size) / 2;

    let mut i420 = Vec::with_capacity(yv12.len());
    i420.extend_from_slice(&yv12[..y_size]);
    i420.extend_from_slice(&yv12[y_size + uv_size..]); // U
    i420.extend_from_slice(&yv12[y_size..y_size + uv_size]); // V
    Ok(i420)
}

/// Convert NV12 (or NV21 when `swap_uv`) to I420 by de-interleaving chroma.
fn semiplanar_to_i420(
    data: &[u8],
    width: u32,
    height: u32,
    swap_uv: bool,
) -> Result<Vec<u8>, CodecError> {
    check_size(data, width, height, if swap_uv { "NV21" } else { "NV12" })?;
    let y_size = width as usize * height as usize;
    let uv_size = (data.len() - y_size) / 2;

    let mut i420 = vec![0u8; data.len()];
    i420[..y_size].copy_from_slice(&data[..y_size]);

    let interleaved = &data[y_size..];
    let (u_off, v_off) = if swap_uv { (1, 0) } else { (0, 1) };
    for i in 0..uv_size {
        i420[y_size + i] = interleaved[i * 2 + u_off];
        i420[y_size + uv_size + i] = interleaved[i * 2 + v_off];
    }

    Ok(i420)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_expected_frame_size() {
        assert_eq!(expected_frame_size(320, 240, ColorFormat::I420), 320 * 240 * 3 / 2);
        assert_eq!(expected_frame_size(320, 240, ColorFormat::Nv12), 320 * 240 * 3 / 2);
        assert_eq!(expected_frame_size(320, 240, ColorFormat::P010), 320 * 240 * 3);
        assert_eq!(expected_frame_size(320, 240, ColorFormat::Yuy2), 320 * 240 * 2);
        assert_eq!(expected_frame_size(320, 240, ColorFormat::Bgra), 320 * 240 * 4);
        assert_eq!(expected_frame_size(320, 240, ColorFormat::Y416), 320 * 240 * 8);
        // Odd dimensions round the chroma planes up.
        assert_eq!(expected_frame_size(3, 3, ColorFormat::I420), 9 + 2 * 4);
    }

    #[test]
    fn test_reader_splits_frames() {
        let frame_size = expected_frame_size(4, 4, ColorFormat::I420);
        let mut bytes = vec![1u8; frame_size];
        bytes.extend(vec![2u8; frame_size]);

        let mut reader = RawFrameReader::new(Cursor::new(bytes), 4, 4, ColorFormat::I420).unwrap();
        let first = reader.read_frame().unwrap().unwrap();
        let second = reader.read_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert!(first.data.iter().all(|&b| b == 1));
        assert!(second.data.iter().all(|&b| b == 2));
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 2);
    }

    #[test]
    fn test_reader_drops_partial_frame() {
        let frame_size = expected_frame_size(4, 4, ColorFormat::Nv12);
        let bytes = vec![0u8; frame_size + frame_size / 2];

        let mut reader = RawFrameReader::new(Cursor::new(bytes), 4, 4, ColorFormat::Nv12).unwrap();
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_none());
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 1);
    }

    #[test]
    fn test_reader_rejects_zero_dimensions() {
        let result = RawFrameReader::new(Cursor::new(Vec::new()), 0, 240, ColorFormat::I420);
        assert!(matches!(
            result,
            Err(CodecError::InvalidDimensions { width: 0, height: 240 })
        ));
    }

    #[test]
    fn test_nv12_to_i420() {
        // 4x4 frame: 16 luma bytes, then 4 interleaved UV pairs
        let mut nv12: Vec<u8> = vec![16; 16];
        nv12.extend([10, 20, 11, 21, 12, 22, 13, 23]);

        let frame = VideoFrame::new(4, 4, ColorFormat::Nv12, nv12, 0);
        let i420 = frame.to_i420().unwrap();
        assert_eq!(i420.fourcc, ColorFormat::I420);
        assert_eq!(&i420.data[..16], &[16u8; 16][..]);
        assert_eq!(&i420.data[16..20], &[10, 11, 12, 13]);
        assert_eq!(&i420.data[20..24], &[20, 21, 22, 23]);
    }

    #[test]
    fn test_nv21_and_yv12_to_i420() {
        let mut nv21: Vec<u8> = vec![0; 16];
        nv21.extend([20, 10, 21, 11, 22, 12, 23, 13]);
        let i420 = VideoFrame::new(4, 4, ColorFormat::Nv21, nv21, 0).to_i420().unwrap();
        assert_eq!(&i420.data[16..20], &[10, 11, 12, 13]);
        assert_eq!(&i420.data[20..24], &[20, 21, 22, 23]);

        let mut yv12: Vec<u8> = vec![0; 16];
        yv12.extend([20, 21, 22, 23, 10, 11, 12, 13]);
        let i420 = VideoFrame::new(4, 4, ColorFormat::Yv12, yv12, 0).to_i420().unwrap();
        assert_eq!(&i420.data[16..20], &[10, 11, 12, 13]);
        assert_eq!(&i420.data[20..24], &[20, 21, 22, 23]);
    }

    #[test]
    fn test_to_i420_rejects_other_layouts() {
        let frame = VideoFrame::new(2, 2, ColorFormat::Bgra, vec![0; 16], 0);
        assert!(frame.to_i420().is_err());
    }
}
