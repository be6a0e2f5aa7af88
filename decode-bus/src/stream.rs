use std::sync::Arc;

use crate::{
    builder::PipelineBuilder,
    codec::CodecId,
    config::DecoderConfig,
    engine::Engine,
    exchange::{DecodeStats, FrameExchange},
    frame::DecodedFrame,
    packet::CompressedFrame,
    pipeline::DecodePipeline,
};

/// What the protocol layer knows about the stream being decoded.
pub trait FrameSource {
    /// The compressed frame carried by the message being handled.
    fn current_frame(&self) -> CompressedFrame;

    fn codec(&self) -> CodecId;

    /// Stream size announced out of band, `(width, height)`.
    fn dimensions(&self) -> (u32, u32);
}

enum DecoderState {
    Uninitialized,
    Active(DecodePipeline),
    /// The previous pipeline is being drained for a rebuild.
    Draining,
    /// The last build for this codec failed; no frames surface until the
    /// codec changes again.
    Disabled(CodecId),
}

/// Owns the decode pipeline of one display stream.
///
/// Every operation takes `&mut self`, so construction, teardown, codec
/// changes and frame exchanges are serialized by construction. Share it
/// across threads behind a `Mutex`.
pub struct StreamDecoder {
    builder: PipelineBuilder,
    state: DecoderState,
    exchange: FrameExchange,
}

impl StreamDecoder {
    pub fn new(engine: Arc<dyn Engine>, config: DecoderConfig) -> Self {
        let exchange = FrameExchange::new(config.pull_timeout());
        Self {
            builder: PipelineBuilder::new(engine, config),
            state: DecoderState::Uninitialized,
            exchange,
        }
    }

    /// Stream start. A failed build leaves the stream running without
    /// decoding rather than failing it.
    pub fn init_decoder(&mut self, codec: CodecId) {
        if matches!(self.state, DecoderState::Uninitialized) {
            self.state = self.build(codec, None);
        } else {
            self.change_codec(codec);
        }
    }

    /// Drains the current pipeline and rebuilds it for `codec`.
    pub fn change_codec(&mut self, codec: CodecId) {
        self.exchange.release();
        let existing = match std::mem::replace(&mut self.state, DecoderState::Draining) {
            DecoderState::Active(pipeline) if pipeline.codec() == codec => {
                self.state = DecoderState::Active(pipeline);
                return;
            }
            DecoderState::Active(pipeline) => Some(pipeline),
            DecoderState::Uninitialized => {
                log::warn!("codec change to {} before stream start", codec);
                self.state = DecoderState::Uninitialized;
                return;
            }
            DecoderState::Draining | DecoderState::Disabled(_) => None,
        };

        let rebuilding = existing.is_some();
        self.state = self.build(codec, existing);
        if rebuilding && self.is_active() {
            self.exchange.stats_mut().rebuilds += 1;
        }
    }

    fn build(&self, codec: CodecId, existing: Option<DecodePipeline>) -> DecoderState {
        match self.builder.build(codec, existing) {
            Ok(pipeline) => DecoderState::Active(pipeline),
            Err(e) => {
                log::error!("no {} decoder for this stream: {}", codec, e);
                DecoderState::Disabled(codec)
            }
        }
    }

    /// Decodes the protocol layer's current frame. Returns whether a new
    /// decoded frame is available from [`Self::current_decoded_frame`].
    pub fn submit_frame(&mut self, source: &dyn FrameSource) -> bool {
        let codec = source.codec();
        let announced = match &self.state {
            DecoderState::Active(pipeline) => pipeline.codec() != codec,
            DecoderState::Disabled(disabled) => *disabled != codec,
            DecoderState::Uninitialized | DecoderState::Draining => false,
        };
        if announced {
            self.change_codec(codec);
        }

        let DecoderState::Active(pipeline) = &mut self.state else {
            self.exchange.release();
            return false;
        };
        let frame = source.current_frame();
        self.exchange
            .push_and_pull(pipeline, &frame, source.dimensions())
            .is_some()
    }

    /// The last decoded frame; invalidated by the next `submit_frame`.
    pub fn current_decoded_frame(&self) -> Option<&DecodedFrame> {
        self.exchange.current()
    }

    /// Stream stop. Safe to call any number of times.
    pub fn cleanup_decoder(&mut self) {
        self.exchange.release();
        match std::mem::replace(&mut self.state, DecoderState::Uninitialized) {
            DecoderState::Active(pipeline) => {
                pipeline.teardown();
                let stats = self.exchange.stats();
                log::info!(
                    "stream decoder stopped: pushed {}, decoded {}, dropped {}, rebuilds {}",
                    stats.pushed,
                    stats.decoded,
                    stats.dropped,
                    stats.rebuilds
                );
            }
            DecoderState::Uninitialized => {}
            DecoderState::Draining | DecoderState::Disabled(_) => {
                log::debug!("stream decoder stopped without a pipeline");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DecoderState::Active(_))
    }

    /// Codec of the running pipeline.
    pub fn codec(&self) -> Option<CodecId> {
        match &self.state {
            DecoderState::Active(pipeline) => Some(pipeline.codec()),
            _ => None,
        }
    }

    pub fn pipeline(&self) -> Option<&DecodePipeline> {
        match &self.state {
            DecoderState::Active(pipeline) => Some(pipeline),
            _ => None,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        *self.exchange.stats()
    }
}

impl Drop for StreamDecoder {
    fn drop(&mut self) {
        self.cleanup_decoder();
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
