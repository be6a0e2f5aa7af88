use std::fmt::{Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layout handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit packed, blue-green-red-padding byte order.
    #[default]
    #[serde(rename = "BGRx")]
    Bgrx,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgrx => 4,
        }
    }

    /// Media type declared on the sink stage.
    pub fn caps(&self) -> &'static str {
        match self {
            PixelFormat::Bgrx => "video/x-raw,format=BGRx",
        }
    }

    #[cfg(feature = "ffmpeg")]
    pub fn to_ffmpeg(&self) -> ffmpeg_next::format::Pixel {
        match self {
            PixelFormat::Bgrx => ffmpeg_next::format::Pixel::BGRZ,
        }
    }
}

/// One unit of sink output with its negotiated format.
#[derive(Debug)]
pub struct Sample {
    buffer: Option<Bytes>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Sample {
    pub fn new(buffer: Bytes, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            buffer: Some(buffer),
            width,
            height,
            format,
        }
    }

    /// A sample whose caps were negotiated but whose memory is not readable.
    pub fn unmapped(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            buffer: None,
            width,
            height,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn map_readable(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Consumes the sample, handing its memory over without copying.
    pub fn into_frame(self) -> Option<DecodedFrame> {
        let Sample {
            buffer,
            width,
            height,
            format,
        } = self;
        buffer.map(|data| DecodedFrame {
            data,
            width,
            height,
            format,
        })
    }
}

/// A decoded frame ready for the renderer.
#[derive(Debug)]
pub struct DecodedFrame {
    data: Bytes,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl DecodedFrame {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

impl Display for DecodedFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "DecodedFrame data_len: {}, width: {}, height: {}, format: {:?}",
            self.data.len(),
            self.width,
            self.height,
            self.format
        )
    }
}
