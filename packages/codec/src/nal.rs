//! Picture type detection from Annex B elementary streams.
//!
//! Sessions that hand back raw payloads without a picture type get one from
//! the NAL unit headers instead. Only AVC and HEVC carry Annex B start codes;
//! other codecs report an empty [`FrameType`].

use crate::{Codec, FrameType};

const AVC_NAL_SLICE: u8 = 1;
const AVC_NAL_IDR: u8 = 5;

const HEVC_NAL_IRAP_FIRST: u8 = 16;
const HEVC_NAL_IRAP_LAST: u8 = 23;
const HEVC_NAL_IDR_W_RADL: u8 = 19;
const HEVC_NAL_IDR_N_LP: u8 = 20;

/// Iterate over the first header byte of every NAL unit in `data`.
fn nal_headers(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        while i + 3 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
                i += 3;
                return Some(data[i]);
            }
            i += 1;
        }
        None
    })
}

/// Picture type of one encoded access unit.
#[must_use]
pub fn frame_type(codec: Codec, data: &[u8]) -> FrameType {
    match codec {
        Codec::Avc => avc_frame_type(data),
        Codec::Hevc => hevc_frame_type(data),
        _ => FrameType::empty(),
    }
}

fn avc_frame_type(data: &[u8]) -> FrameType {
    let mut frame_type = FrameType::empty();
    for header in nal_headers(data) {
        let nal_ref_idc = (header >> 5) & 0x3;
        match header & 0x1f {
            AVC_NAL_IDR => frame_type |= FrameType::I | FrameType::IDR | FrameType::REF,
            AVC_NAL_SLICE => {
                frame_type |= FrameType::P;
                if nal_ref_idc != 0 {
                    frame_type |= FrameType::REF;
                }
            }
            _ => {}
        }
    }
    frame_type
}

fn hevc_frame_type(data: &[u8]) -> FrameType {
    let mut frame_type = FrameType::empty();
    for header in nal_headers(data) {
        let nal_type = (header >> 1) & 0x3f;
        match nal_type {
            HEVC_NAL_IDR_W_RADL | HEVC_NAL_IDR_N_LP => {
                frame_type |= FrameType::I | FrameType::IDR | FrameType::REF;
            }
            HEVC_NAL_IRAP_FIRST..=HEVC_NAL_IRAP_LAST => {
                frame_type |= FrameType::I | FrameType::REF;
            }
            0..=9 => frame_type |= FrameType::P,
            _ => {}
        }
    }
    frame_type
}
