use std::time::Duration;

use crate::{
    engine::{FlowReturn, PullResult},
    error::{DecodeError, Result},
    frame::DecodedFrame,
    packet::CompressedFrame,
    pipeline::DecodePipeline,
};

/// Counters kept across frame exchanges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub pushed: u64,
    pub decoded: u64,
    pub dropped: u64,
    pub rebuilds: u64,
}

/// Feeds one compressed frame in and takes at most one decoded frame out.
///
/// Owns the current decoded frame; callers only ever borrow it, and the
/// borrow ends at the next exchange.
pub struct FrameExchange {
    current: Option<DecodedFrame>,
    pull_timeout: Option<Duration>,
    stats: DecodeStats,
}

impl FrameExchange {
    pub fn new(pull_timeout: Option<Duration>) -> Self {
        Self {
            current: None,
            pull_timeout,
            stats: DecodeStats::default(),
        }
    }

    pub fn current(&self) -> Option<&DecodedFrame> {
        self.current.as_ref()
    }

    /// Drops the current decoded frame, if any.
    pub fn release(&mut self) {
        self.current = None;
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DecodeStats {
        &mut self.stats
    }

    pub fn push_and_pull(
        &mut self,
        pipeline: &mut DecodePipeline,
        frame: &CompressedFrame,
        expected: (u32, u32),
    ) -> Option<&DecodedFrame> {
        self.release();

        if frame.is_empty() {
            log::debug!("got an empty frame buffer");
            return None;
        }

        match self.exchange(pipeline, frame, expected) {
            Ok(decoded) => {
                self.stats.decoded += 1;
                self.current = Some(decoded);
                self.current.as_ref()
            }
            Err(DecodeError::NoSample) => {
                log::debug!("unable to pull sample");
                None
            }
            Err(e) => {
                self.stats.dropped += 1;
                log::warn!("dropping frame of size {}: {}", frame.len(), e);
                None
            }
        }
    }

    fn exchange(
        &mut self,
        pipeline: &mut DecodePipeline,
        frame: &CompressedFrame,
        expected: (u32, u32),
    ) -> Result<DecodedFrame> {
        match pipeline.push(frame.retain()) {
            FlowReturn::Ok => self.stats.pushed += 1,
            flow => return Err(DecodeError::PushFailed(flow)),
        }

        let sample = match pipeline.pull(self.pull_timeout) {
            PullResult::Sample(sample) => sample,
            PullResult::Eos | PullResult::Timeout => return Err(DecodeError::NoSample),
        };

        let actual = (sample.width(), sample.height());
        if actual != expected {
            return Err(DecodeError::DimensionMismatch { expected, actual });
        }

        sample.into_frame().ok_or(DecodeError::MapFailed)
    }
}

impl Default for FrameExchange {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[path = "exchange_test.rs"]
mod exchange_test;
