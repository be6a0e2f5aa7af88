use thiserror::Error;

use crate::codec::CodecId;
use crate::engine::FlowReturn;

/// Errors produced while building pipelines or exchanging frames.
///
/// None of them is fatal to a stream: construction errors leave the stream
/// without decode capability, per-frame errors drop that frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(CodecId),

    #[error("pipeline construction failed: {reason}")]
    ConstructionFailed { reason: String },

    #[error("source refused buffer: {0:?}")]
    PushFailed(FlowReturn),

    #[error("decoded sample size {actual:?} differs from stream size {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("drain did not reach end-of-stream after {attempts} attempts")]
    DrainTimeout { attempts: u32 },

    #[error("no decoded sample available")]
    NoSample,

    #[error("unable to map sample memory")]
    MapFailed,
}

impl DecodeError {
    pub fn construction(err: impl std::fmt::Display) -> Self {
        DecodeError::ConstructionFailed {
            reason: format!("{:#}", err),
        }
    }

    /// Per-frame errors only drop the frame they were raised for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DecodeError::PushFailed(_)
                | DecodeError::DimensionMismatch { .. }
                | DecodeError::NoSample
                | DecodeError::MapFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
