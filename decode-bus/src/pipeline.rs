use std::time::Duration;

use crate::{
    codec::CodecId,
    engine::{EnginePipeline, FlowReturn, PullResult, RunState, StageId},
    error::{DecodeError, Result},
    packet::CompressedFrame,
};

/// Upper bound on samples thrown away by one drain.
pub const MAX_DRAIN_SAMPLES: usize = 1024;

/// Handles of the four stages, addressed by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub source: StageId,
    pub decoder: StageId,
    pub normalizer: StageId,
    pub sink: StageId,
}

impl Stages {
    pub fn all(&self) -> [StageId; 4] {
        [self.source, self.decoder, self.normalizer, self.sink]
    }
}

/// A linked, running decode pipeline for one codec.
pub struct DecodePipeline {
    codec: CodecId,
    inner: Box<dyn EnginePipeline>,
    stages: Stages,
}

impl DecodePipeline {
    pub(crate) fn new(codec: CodecId, inner: Box<dyn EnginePipeline>, stages: Stages) -> Self {
        Self {
            codec,
            inner,
            stages,
        }
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    pub fn state(&self) -> RunState {
        self.inner.state()
    }

    pub fn stages(&self) -> &Stages {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.inner.stage_count()
    }

    pub(crate) fn push(&mut self, frame: CompressedFrame) -> FlowReturn {
        self.inner.push(self.stages.source, frame)
    }

    pub(crate) fn pull(&mut self, timeout: Option<Duration>) -> PullResult {
        self.inner.pull(self.stages.sink, timeout)
    }

    /// Flushes everything in flight: end-of-stream goes into the decoder and
    /// the sink is pulled until it reports end-of-stream. Only pulls that
    /// time out count against `attempts`; samples still coming out of the
    /// decoder are discarded, up to [`MAX_DRAIN_SAMPLES`].
    pub fn drain(&mut self, attempts: u32, timeout: Duration) -> Result<()> {
        self.inner
            .send_eos(self.stages.decoder)
            .map_err(DecodeError::construction)?;

        let mut discarded = 0usize;
        let mut timeouts = 0u32;
        while timeouts < attempts {
            match self.inner.pull(self.stages.sink, Some(timeout)) {
                PullResult::Sample(_) => {
                    discarded += 1;
                    if discarded >= MAX_DRAIN_SAMPLES {
                        log::warn!(
                            "{} pipeline still emitting after {} samples, giving up drain",
                            self.codec,
                            discarded
                        );
                        break;
                    }
                }
                PullResult::Eos => {
                    log::debug!(
                        "{} pipeline drained, {} samples discarded",
                        self.codec,
                        discarded
                    );
                    return Ok(());
                }
                PullResult::Timeout => timeouts += 1,
            }
        }
        Err(DecodeError::DrainTimeout { attempts })
    }

    /// Stops the pipeline and removes every stage, keeping the container so
    /// it can be reassembled for another codec.
    pub(crate) fn strip(mut self) -> Result<Box<dyn EnginePipeline>> {
        self.inner
            .set_state(RunState::Ready)
            .map_err(DecodeError::construction)?;
        for stage in self.stages.all() {
            self.inner
                .remove_stage(stage)
                .map_err(DecodeError::construction)?;
        }
        Ok(self.inner)
    }

    /// Forces the pipeline to NULL and releases all stages and the container.
    pub fn teardown(mut self) {
        if let Err(e) = self.inner.set_state(RunState::Null) {
            log::warn!("{} pipeline: set NULL failed: {:#}", self.codec, e);
        }
        for stage in self.stages.all() {
            if let Err(e) = self.inner.remove_stage(stage) {
                log::warn!("{} pipeline: remove stage failed: {:#}", self.codec, e);
            }
        }
        log::info!("{} pipeline torn down", self.codec);
    }
}
