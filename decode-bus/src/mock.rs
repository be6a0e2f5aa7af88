//! Scriptable in-process engine for tests.
//!
//! "Decoding" copies the pushed bytes into a sample of the configured size,
//! so tests can follow individual frames through the pipeline.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;

use crate::{
    engine::{
        Engine, EnginePipeline, FlowReturn, PullResult, RunState, StageArena, StageId, StageRole,
        StageSpec, check_chain,
    },
    frame::{PixelFormat, Sample},
    packet::CompressedFrame,
};

#[derive(Debug, Clone)]
pub(crate) struct MockControl {
    pub fail_stage: Option<StageRole>,
    pub fail_link: bool,
    pub fail_playing: bool,
    pub reject_push: bool,
    /// Frames the decoder holds before emitting the first sample.
    pub latency: usize,
    /// Ignore end-of-stream so drains never complete.
    pub stall_drain: bool,
    pub output_size: (u32, u32),
    pub unmapped: bool,
}

impl Default for MockControl {
    fn default() -> Self {
        Self {
            fail_stage: None,
            fail_link: false,
            fail_playing: false,
            reject_push: false,
            latency: 0,
            stall_drain: false,
            output_size: (640, 480),
            unmapped: false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockLedger {
    pub pipelines_created: usize,
    pub live_pipelines: usize,
    pub stages_created: usize,
    pub live_stages: usize,
    /// `(pipeline id, payload)` for every accepted push.
    pub pushes: Vec<(usize, Vec<u8>)>,
    pub eos_sent: usize,
    /// `max_buffers` of every sink stage created.
    pub sink_buffers: Vec<usize>,
}

#[derive(Default)]
struct MockShared {
    control: MockControl,
    ledger: MockLedger,
}

#[derive(Clone, Default)]
pub(crate) struct MockEngine {
    shared: Arc<Mutex<MockShared>>,
    live_samples: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&self, f: impl FnOnce(&mut MockControl)) {
        f(&mut self.lock().control);
    }

    pub fn ledger<R>(&self, f: impl FnOnce(&MockLedger) -> R) -> R {
        f(&self.lock().ledger)
    }

    /// Sample buffers not yet released by anyone.
    pub fn live_samples(&self) -> usize {
        self.live_samples.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockShared> {
        self.shared.lock().unwrap()
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create_pipeline(&self) -> anyhow::Result<Box<dyn EnginePipeline>> {
        let id = {
            let mut shared = self.lock();
            shared.ledger.pipelines_created += 1;
            shared.ledger.live_pipelines += 1;
            shared.ledger.pipelines_created
        };
        Ok(Box::new(MockPipeline {
            id,
            engine: self.clone(),
            stages: StageArena::new(),
            linked: false,
            state: RunState::Null,
            held: VecDeque::new(),
            queue: VecDeque::new(),
            eos: false,
        }))
    }
}

struct Tracked {
    data: Vec<u8>,
    live: Arc<AtomicUsize>,
}

impl AsRef<[u8]> for Tracked {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockPipeline {
    id: usize,
    engine: MockEngine,
    stages: StageArena<StageRole>,
    linked: bool,
    state: RunState,
    held: VecDeque<Sample>,
    queue: VecDeque<Sample>,
    eos: bool,
}

impl MockPipeline {
    fn decode(&self, frame: &CompressedFrame, control: &MockControl) -> Sample {
        let (width, height) = control.output_size;
        if control.unmapped {
            return Sample::unmapped(width, height, PixelFormat::Bgrx);
        }
        self.engine.live_samples.fetch_add(1, Ordering::SeqCst);
        let buffer = Bytes::from_owner(Tracked {
            data: frame.as_slice().to_vec(),
            live: Arc::clone(&self.engine.live_samples),
        });
        Sample::new(buffer, width, height, PixelFormat::Bgrx)
    }

    fn flush(&mut self) {
        self.held.clear();
        self.queue.clear();
        self.eos = false;
    }
}

impl EnginePipeline for MockPipeline {
    fn add_stage(&mut self, spec: StageSpec) -> anyhow::Result<StageId> {
        let role = spec.role();
        let mut shared = self.engine.lock();
        if shared.control.fail_stage == Some(role) {
            anyhow::bail!("no such element for {}", role);
        }
        if let StageSpec::Sink { max_buffers, .. } = spec {
            shared.ledger.sink_buffers.push(max_buffers);
        }
        shared.ledger.stages_created += 1;
        shared.ledger.live_stages += 1;
        Ok(self.stages.insert(role))
    }

    fn remove_stage(&mut self, stage: StageId) -> anyhow::Result<()> {
        if self.state == RunState::Playing {
            anyhow::bail!("cannot remove a stage while playing");
        }
        self.stages
            .remove(stage)
            .ok_or_else(|| anyhow::anyhow!("unknown stage {:?}", stage))?;
        self.linked = false;
        self.engine.lock().ledger.live_stages -= 1;
        Ok(())
    }

    fn link(&mut self, chain: &[StageId]) -> anyhow::Result<()> {
        if self.engine.lock().control.fail_link {
            anyhow::bail!("could not link");
        }
        let roles = chain
            .iter()
            .map(|id| {
                self.stages
                    .get(*id)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("unknown stage {:?}", id))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        check_chain(&roles)?;
        self.linked = true;
        Ok(())
    }

    fn set_state(&mut self, state: RunState) -> anyhow::Result<()> {
        if state == RunState::Playing {
            if !self.linked {
                anyhow::bail!("pipeline is not linked");
            }
            if self.engine.lock().control.fail_playing {
                anyhow::bail!("state change failure");
            }
        } else {
            self.flush();
        }
        self.state = state;
        Ok(())
    }

    fn state(&self) -> RunState {
        self.state
    }

    fn push(&mut self, source: StageId, frame: CompressedFrame) -> FlowReturn {
        if self.stages.get(source) != Some(&StageRole::Source) {
            return FlowReturn::NotLinked;
        }
        if self.state != RunState::Playing {
            return FlowReturn::Flushing;
        }
        if self.eos {
            return FlowReturn::Eos;
        }
        let control = self.engine.lock().control.clone();
        if control.reject_push {
            return FlowReturn::Error;
        }
        let sample = self.decode(&frame, &control);
        self.engine
            .lock()
            .ledger
            .pushes
            .push((self.id, frame.as_slice().to_vec()));
        self.held.push_back(sample);
        while self.held.len() > control.latency {
            if let Some(sample) = self.held.pop_front() {
                self.queue.push_back(sample);
            }
        }
        FlowReturn::Ok
    }

    fn send_eos(&mut self, stage: StageId) -> anyhow::Result<()> {
        if !self.stages.contains(stage) {
            anyhow::bail!("unknown stage {:?}", stage);
        }
        let mut shared = self.engine.lock();
        shared.ledger.eos_sent += 1;
        if !shared.control.stall_drain {
            self.queue.extend(self.held.drain(..));
            self.eos = true;
        }
        Ok(())
    }

    fn pull(&mut self, sink: StageId, _timeout: Option<Duration>) -> PullResult {
        if self.stages.get(sink) != Some(&StageRole::Sink) {
            return PullResult::Eos;
        }
        match self.queue.pop_front() {
            Some(sample) => PullResult::Sample(sample),
            None if self.eos => PullResult::Eos,
            None => PullResult::Timeout,
        }
    }

    fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.flush();
        let mut shared = self.engine.lock();
        shared.ledger.live_stages -= self.stages.len();
        shared.ledger.live_pipelines -= 1;
    }
}
