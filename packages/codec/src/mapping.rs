//! Name → enum lookup tables for command-line format options.
//!
//! The tables are built once on first use and never change afterwards.
//! Keys are lowercase; lookups trim surrounding whitespace but do not fold
//! case, so `"HEVC"` is rejected like any other unknown name. A rejected
//! name's error lists the accepted ones in sorted order.

use std::collections::HashMap;
use std::str::FromStr;

use lazy_static::lazy_static;

use crate::{ChromaFormat, Codec, CodecError, ColorFormat, RateControlMode};

lazy_static! {
    static ref CODEC_FORMATS: HashMap<&'static str, Codec> =
        Codec::ALL.iter().map(|c| (c.name(), *c)).collect();

    static ref CHROMA_FORMATS: HashMap<&'static str, ChromaFormat> =
        ChromaFormat::ALL.iter().map(|c| (c.name(), *c)).collect();

    static ref COLOR_FORMATS: HashMap<&'static str, ColorFormat> = {
        let mut table: HashMap<_, _> =
            ColorFormat::ALL.iter().map(|c| (c.name(), *c)).collect();
        // Historical misspelling still found in scripts.
        table.insert("rgb465", ColorFormat::Rgb565);
        table
    };

    static ref RATE_CONTROL_METHODS: HashMap<&'static str, RateControlMode> =
        RateControlMode::ALL.iter().map(|m| (m.name(), *m)).collect();
}

fn lookup<T: Copy>(
    table: &HashMap<&'static str, T>,
    kind: &'static str,
    name: &str,
) -> Result<T, CodecError> {
    table
        .get(name.trim())
        .copied()
        .ok_or_else(|| CodecError::unknown_format(kind, name, sorted_keys(table)))
}

/// Look up a codec by name (`"avc"`, `"hevc"`, ...).
pub fn lookup_codec(name: &str) -> Result<Codec, CodecError> {
    lookup(&CODEC_FORMATS, "codec", name)
}

/// Look up a chroma subsampling by name (`"yuv420"`, ...).
pub fn lookup_chroma_format(name: &str) -> Result<ChromaFormat, CodecError> {
    lookup(&CHROMA_FORMATS, "chroma", name)
}

/// Look up an input pixel layout by name (`"nv12"`, `"i420"`, ...).
pub fn lookup_color_format(name: &str) -> Result<ColorFormat, CodecError> {
    lookup(&COLOR_FORMATS, "color", name)
}

/// Look up a rate control method by name (`"cqp"`, `"vbr"`, ...).
pub fn lookup_rate_control(name: &str) -> Result<RateControlMode, CodecError> {
    lookup(&RATE_CONTROL_METHODS, "rate control", name)
}

fn sorted_keys<T>(table: &HashMap<&'static str, T>) -> Vec<&'static str> {
    let mut names: Vec<_> = table.keys().copied().collect();
    names.sort_unstable();
    names
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_codec(s)
    }
}

impl FromStr for ChromaFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_chroma_format(s)
    }
}

impl FromStr for ColorFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_color_format(s)
    }
}

impl FromStr for RateControlMode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_rate_control(s)
    }
}
