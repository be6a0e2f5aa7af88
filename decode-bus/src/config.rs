use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame::PixelFormat;

/// Tunables for one stream decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Pulls attempted while draining before a codec change gives up.
    pub drain_attempts: u32,
    /// Wait per drain pull, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Wait for a decoded sample after each push. `None` blocks until the
    /// sink produces a sample or reaches end-of-stream.
    pub pull_timeout_ms: Option<u64>,
    pub output_format: PixelFormat,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            drain_attempts: 8,
            drain_timeout_ms: 250,
            pull_timeout_ms: Some(1000),
            output_format: PixelFormat::Bgrx,
        }
    }
}

impl DecoderConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn pull_timeout(&self) -> Option<Duration> {
        self.pull_timeout_ms.map(Duration::from_millis)
    }
}
