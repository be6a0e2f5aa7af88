//! The seam between the decode bridge and the multimedia engine.
//!
//! An engine only has to create stages by role, link them, drive the run
//! state and move buffers in and samples out. Everything that decides
//! *which* stages to create and *when* lives on this side of the seam.

use std::{
    fmt::{Display, Formatter},
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use crate::{frame::PixelFormat, frame::Sample, packet::CompressedFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    Source,
    Decoder,
    Normalizer,
    Sink,
}

impl StageRole {
    /// The only link order a decode pipeline accepts.
    pub const CHAIN: [StageRole; 4] = [
        StageRole::Source,
        StageRole::Decoder,
        StageRole::Normalizer,
        StageRole::Sink,
    ];
}

impl Display for StageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageRole::Source => "source",
            StageRole::Decoder => "decoder",
            StageRole::Normalizer => "normalizer",
            StageRole::Sink => "sink",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    /// Accepts pushed compressed bytes tagged with `caps`.
    Source { caps: &'static str },
    Decoder { name: &'static str },
    /// Converts whatever the decoder emits to `format`.
    Normalizer { format: PixelFormat },
    /// Holds at most `max_buffers` samples; upstream blocks when full.
    Sink {
        format: PixelFormat,
        max_buffers: usize,
    },
}

impl StageSpec {
    pub fn role(&self) -> StageRole {
        match self {
            StageSpec::Source { .. } => StageRole::Source,
            StageSpec::Decoder { .. } => StageRole::Decoder,
            StageSpec::Normalizer { .. } => StageRole::Normalizer,
            StageSpec::Sink { .. } => StageRole::Sink,
        }
    }
}

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

/// Weak handle addressing a stage inside a pipeline container.
///
/// Generations are unique per process, so a handle to a removed stage never
/// resolves to a stage created later, in this container or any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId {
    slot: u32,
    generation: u32,
}

impl StageId {
    pub fn slot(&self) -> usize {
        self.slot as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Outcome of pushing a buffer into a source stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowReturn {
    Ok,
    /// Pipeline is not running.
    Flushing,
    Eos,
    NotLinked,
    Error,
}

#[derive(Debug)]
pub enum PullResult {
    Sample(Sample),
    Eos,
    Timeout,
}

pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates an empty pipeline container in the NULL state.
    fn create_pipeline(&self) -> anyhow::Result<Box<dyn EnginePipeline>>;
}

pub trait EnginePipeline: Send {
    fn add_stage(&mut self, spec: StageSpec) -> anyhow::Result<StageId>;

    /// Only valid while the pipeline is not PLAYING.
    fn remove_stage(&mut self, stage: StageId) -> anyhow::Result<()>;

    fn link(&mut self, chain: &[StageId]) -> anyhow::Result<()>;

    fn set_state(&mut self, state: RunState) -> anyhow::Result<()>;

    fn state(&self) -> RunState;

    /// Pushes a buffer into `source`. May block while downstream is full.
    fn push(&mut self, source: StageId, frame: CompressedFrame) -> FlowReturn;

    /// Sends end-of-stream into the input of `stage`.
    fn send_eos(&mut self, stage: StageId) -> anyhow::Result<()>;

    /// Waits up to `timeout` (forever for `None`) for the next sample.
    fn pull(&mut self, sink: StageId, timeout: Option<Duration>) -> PullResult;

    fn stage_count(&self) -> usize;
}

/// Slot storage for stages, shared by engine implementations.
pub struct StageArena<T> {
    slots: Vec<Option<(u32, T)>>,
    len: usize,
}

impl<T> StageArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, stage: T) -> StageId {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some((generation, stage));
                free
            }
            None => {
                self.slots.push(Some((generation, stage)));
                self.slots.len() - 1
            }
        };
        self.len += 1;
        StageId {
            slot: slot as u32,
            generation,
        }
    }

    pub fn get(&self, id: StageId) -> Option<&T> {
        match self.slots.get(id.slot()) {
            Some(Some((generation, stage))) if *generation == id.generation => Some(stage),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: StageId) -> Option<&mut T> {
        match self.slots.get_mut(id.slot()) {
            Some(Some((generation, stage))) if *generation == id.generation => Some(stage),
            _ => None,
        }
    }

    pub fn remove(&mut self, id: StageId) -> Option<T> {
        let slot = self.slots.get_mut(id.slot())?;
        if !matches!(*slot, Some((generation, _)) if generation == id.generation) {
            return None;
        }
        self.len -= 1;
        slot.take().map(|(_, stage)| stage)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for StageArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that `roles` is exactly source → decoder → normalizer → sink.
pub fn check_chain(roles: &[StageRole]) -> anyhow::Result<()> {
    if roles != StageRole::CHAIN {
        anyhow::bail!("invalid stage chain: {:?}", roles);
    }
    Ok(())
}
