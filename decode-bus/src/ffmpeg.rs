//! Engine implementation on `ffmpeg-next`.
//!
//! Source and sink are bounded channels; decoder and normalizer run on a
//! worker thread between them while the pipeline is PLAYING. A full channel
//! blocks the producer, so at most `max_buffers` decoded samples wait in the
//! sink and one compressed buffer waits in the source.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

use crate::{
    decoder::{Decoder, DecoderTask, POLL_INTERVAL, SinkItem, SourceItem},
    engine::{
        Engine, EnginePipeline, FlowReturn, PullResult, RunState, StageArena, StageId, StageRole,
        StageSpec, check_chain,
    },
    frame::PixelFormat,
    packet::CompressedFrame,
};

pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> anyhow::Result<Self> {
        crate::init()?;
        Ok(Self)
    }
}

impl Engine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn create_pipeline(&self) -> anyhow::Result<Box<dyn EnginePipeline>> {
        Ok(Box::new(FfmpegPipeline::new()))
    }
}

enum FfmpegStage {
    Source {
        caps: &'static str,
        tx: Sender<SourceItem>,
        rx: Receiver<SourceItem>,
    },
    Decoder {
        name: &'static str,
    },
    Normalizer {
        format: PixelFormat,
    },
    Sink {
        tx: Sender<SinkItem>,
        rx: Receiver<SinkItem>,
    },
}

impl FfmpegStage {
    fn role(&self) -> StageRole {
        match self {
            FfmpegStage::Source { .. } => StageRole::Source,
            FfmpegStage::Decoder { .. } => StageRole::Decoder,
            FfmpegStage::Normalizer { .. } => StageRole::Normalizer,
            FfmpegStage::Sink { .. } => StageRole::Sink,
        }
    }

    /// Throws away anything left over from a previous run.
    fn flush(&self) {
        match self {
            FfmpegStage::Source { rx, .. } => while rx.try_recv().is_ok() {},
            FfmpegStage::Sink { rx, .. } => while rx.try_recv().is_ok() {},
            _ => {}
        }
    }
}

pub struct FfmpegPipeline {
    stages: StageArena<FfmpegStage>,
    chain: Option<[StageId; 4]>,
    state: RunState,
    task: Option<DecoderTask>,
}

impl FfmpegPipeline {
    pub fn new() -> Self {
        Self {
            stages: StageArena::new(),
            chain: None,
            state: RunState::Null,
            task: None,
        }
    }

    fn start(&mut self) -> anyhow::Result<()> {
        let [source, decoder, normalizer, sink] = self
            .chain
            .ok_or_else(|| anyhow::anyhow!("pipeline is not linked"))?;

        let (input, caps) = match self.stages.get(source) {
            Some(FfmpegStage::Source { rx, caps, .. }) => (rx.clone(), *caps),
            _ => anyhow::bail!("source stage missing"),
        };
        let name = match self.stages.get(decoder) {
            Some(FfmpegStage::Decoder { name }) => *name,
            _ => anyhow::bail!("decoder stage missing"),
        };
        let format = match self.stages.get(normalizer) {
            Some(FfmpegStage::Normalizer { format }) => *format,
            _ => anyhow::bail!("normalizer stage missing"),
        };
        let output = match self.stages.get(sink) {
            Some(FfmpegStage::Sink { tx, .. }) => tx.clone(),
            _ => anyhow::bail!("sink stage missing"),
        };

        let decoder = Decoder::new(name)?;
        self.task = Some(DecoderTask::start(decoder, format, input, output)?);
        log::debug!("ffmpeg pipeline started: {} ! {}", caps, name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.stop();
        }
    }

    fn worker_done(&self) -> bool {
        self.task.as_ref().is_none_or(DecoderTask::is_finished)
    }

    fn send_source(&self, tx: &Sender<SourceItem>, mut item: SourceItem) -> FlowReturn {
        loop {
            match tx.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return FlowReturn::Ok,
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.worker_done() {
                        return FlowReturn::Eos;
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return FlowReturn::Error,
            }
        }
    }
}

impl Default for FfmpegPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePipeline for FfmpegPipeline {
    fn add_stage(&mut self, spec: StageSpec) -> anyhow::Result<StageId> {
        let stage = match spec {
            StageSpec::Source { caps } => {
                let (tx, rx) = bounded(1);
                FfmpegStage::Source { caps, tx, rx }
            }
            StageSpec::Decoder { name } => {
                if ffmpeg_next::decoder::find_by_name(name).is_none() {
                    anyhow::bail!("no such decoder: {}", name);
                }
                FfmpegStage::Decoder { name }
            }
            StageSpec::Normalizer { format } => FfmpegStage::Normalizer { format },
            StageSpec::Sink { max_buffers, .. } => {
                let (tx, rx) = bounded(max_buffers.max(1));
                FfmpegStage::Sink { tx, rx }
            }
        };
        Ok(self.stages.insert(stage))
    }

    fn remove_stage(&mut self, stage: StageId) -> anyhow::Result<()> {
        if self.state == RunState::Playing {
            anyhow::bail!("cannot remove a stage while playing");
        }
        self.stages
            .remove(stage)
            .ok_or_else(|| anyhow::anyhow!("unknown stage {:?}", stage))?;
        if self.chain.is_some_and(|chain| chain.contains(&stage)) {
            self.chain = None;
        }
        Ok(())
    }

    fn link(&mut self, chain: &[StageId]) -> anyhow::Result<()> {
        let roles = chain
            .iter()
            .map(|id| {
                self.stages
                    .get(*id)
                    .map(FfmpegStage::role)
                    .ok_or_else(|| anyhow::anyhow!("unknown stage {:?}", id))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        check_chain(&roles)?;
        self.chain = Some([chain[0], chain[1], chain[2], chain[3]]);
        Ok(())
    }

    fn set_state(&mut self, state: RunState) -> anyhow::Result<()> {
        if state == self.state {
            return Ok(());
        }
        if state == RunState::Playing {
            self.start()?;
        } else {
            self.stop();
            if state <= RunState::Ready {
                if let Some(chain) = self.chain {
                    for id in chain {
                        if let Some(stage) = self.stages.get(id) {
                            stage.flush();
                        }
                    }
                }
            }
        }
        self.state = state;
        Ok(())
    }

    fn state(&self) -> RunState {
        self.state
    }

    fn push(&mut self, source: StageId, frame: CompressedFrame) -> FlowReturn {
        let tx = match self.stages.get(source) {
            Some(FfmpegStage::Source { tx, .. }) => tx.clone(),
            _ => return FlowReturn::NotLinked,
        };
        if self.state != RunState::Playing {
            return FlowReturn::Flushing;
        }
        self.send_source(&tx, SourceItem::Buffer(frame))
    }

    fn send_eos(&mut self, stage: StageId) -> anyhow::Result<()> {
        let role = self
            .stages
            .get(stage)
            .map(FfmpegStage::role)
            .ok_or_else(|| anyhow::anyhow!("unknown stage {:?}", stage))?;
        if !matches!(role, StageRole::Source | StageRole::Decoder) {
            anyhow::bail!("end-of-stream can only enter at the decoder input");
        }
        if self.state != RunState::Playing {
            anyhow::bail!("pipeline is not playing");
        }
        let tx = match self.chain.and_then(|chain| self.stages.get(chain[0])) {
            Some(FfmpegStage::Source { tx, .. }) => tx.clone(),
            _ => anyhow::bail!("pipeline is not linked"),
        };
        match self.send_source(&tx, SourceItem::Eos) {
            FlowReturn::Ok | FlowReturn::Eos => Ok(()),
            flow => anyhow::bail!("end-of-stream refused: {:?}", flow),
        }
    }

    fn pull(&mut self, sink: StageId, timeout: Option<Duration>) -> PullResult {
        let rx = match self.stages.get(sink) {
            Some(FfmpegStage::Sink { rx, .. }) => rx.clone(),
            _ => return PullResult::Eos,
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let wait = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            match rx.recv_timeout(wait) {
                Ok(SinkItem::Sample(sample)) => return PullResult::Sample(sample),
                Ok(SinkItem::Eos) => return PullResult::Eos,
                Err(RecvTimeoutError::Timeout) => {
                    if self.worker_done() && rx.is_empty() {
                        return PullResult::Eos;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return PullResult::Timeout;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return PullResult::Eos,
            }
        }
    }

    fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Drop for FfmpegPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "ffmpeg_test.rs"]
mod ffmpeg_test;
