//! Decode bridge between a display protocol and a renderer.
//!
//! Compressed frames are pushed one at a time into a four stage pipeline
//! (source, decoder, normalizer, sink) and decoded BGRx frames are pulled
//! back out. The multimedia engine doing the work sits behind
//! [`engine::Engine`]; the `ffmpeg` feature provides an implementation on
//! top of `ffmpeg-next`.

/// Initializes the multimedia engine. Safe to call more than once; the
/// engine is never de-initialized because other streams may share it.
pub fn init() -> anyhow::Result<()> {
    #[cfg(feature = "ffmpeg")]
    {
        static INIT: std::sync::OnceLock<Result<(), String>> = std::sync::OnceLock::new();
        INIT.get_or_init(|| ffmpeg_next::init().map_err(|e| e.to_string()))
            .clone()
            .map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    }
    Ok(())
}

pub mod builder;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod frame;
pub mod packet;
pub mod pipeline;
pub mod stream;

#[cfg(feature = "ffmpeg")]
pub mod decoder;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "ffmpeg")]
pub mod scaler;

#[cfg(test)]
pub(crate) mod mock;

pub use codec::CodecId;
pub use config::DecoderConfig;
pub use error::DecodeError;
pub use frame::{DecodedFrame, PixelFormat};
pub use packet::CompressedFrame;
pub use stream::{FrameSource, StreamDecoder};
