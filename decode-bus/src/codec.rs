use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Video codec announced by the display protocol for a stream.
///
/// The numeric values are the protocol's codec type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    Mjpeg,
    Vp8,
    H264,
    Vp9,
    H265,
    #[serde(skip)]
    Unknown(u8),
}

/// What the pipeline builder needs to know about a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecSpec {
    /// Media type declared on the source stage.
    pub caps: &'static str,
    /// Name of the decoder stage.
    pub decoder: &'static str,
}

impl CodecId {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => CodecId::Mjpeg,
            2 => CodecId::Vp8,
            3 => CodecId::H264,
            4 => CodecId::Vp9,
            5 => CodecId::H265,
            other => CodecId::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            CodecId::Mjpeg => 1,
            CodecId::Vp8 => 2,
            CodecId::H264 => 3,
            CodecId::Vp9 => 4,
            CodecId::H265 => 5,
            CodecId::Unknown(raw) => *raw,
        }
    }

    /// Returns `None` for codecs this bridge cannot decode.
    pub fn spec(&self) -> Option<CodecSpec> {
        match self {
            CodecId::Mjpeg => Some(CodecSpec {
                caps: "image/jpeg",
                decoder: "mjpeg",
            }),
            CodecId::Vp8 => Some(CodecSpec {
                caps: "video/x-vp8",
                decoder: "vp8",
            }),
            CodecId::H264 => Some(CodecSpec {
                caps: "video/x-h264,stream-format=byte-stream",
                decoder: "h264",
            }),
            _ => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.spec().is_some()
    }
}

impl Display for CodecId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecId::Mjpeg => write!(f, "mjpeg"),
            CodecId::Vp8 => write!(f, "vp8"),
            CodecId::H264 => write!(f, "h264"),
            CodecId::Vp9 => write!(f, "vp9"),
            CodecId::H265 => write!(f, "h265"),
            CodecId::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}

impl From<u8> for CodecId {
    fn from(raw: u8) -> Self {
        Self::from_raw(raw)
    }
}
