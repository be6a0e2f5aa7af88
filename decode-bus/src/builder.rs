use std::sync::Arc;

use crate::{
    codec::{CodecId, CodecSpec},
    config::DecoderConfig,
    engine::{Engine, EnginePipeline, RunState, StageId, StageSpec},
    error::{DecodeError, Result},
    pipeline::{DecodePipeline, Stages},
};

/// The sink holds exactly one decoded frame; the decoder blocks behind it.
const SINK_MAX_BUFFERS: usize = 1;

/// Assembles decode pipelines for a codec on a given engine.
pub struct PipelineBuilder {
    engine: Arc<dyn Engine>,
    config: DecoderConfig,
}

impl PipelineBuilder {
    pub fn new(engine: Arc<dyn Engine>, config: DecoderConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Builds a PLAYING pipeline for `codec`.
    ///
    /// An `existing` pipeline for another codec is drained and stripped and
    /// its container reused. One for the same codec is handed back as is.
    /// On any failure nothing built here survives and `existing` is gone.
    pub fn build(
        &self,
        codec: CodecId,
        existing: Option<DecodePipeline>,
    ) -> Result<DecodePipeline> {
        let Some(spec) = codec.spec() else {
            log::warn!("unknown codec type {}", codec);
            if let Some(pipeline) = existing {
                pipeline.teardown();
            }
            return Err(DecodeError::UnsupportedCodec(codec));
        };

        let container = match existing {
            Some(pipeline) if pipeline.codec() == codec => {
                log::warn!("{} pipeline already active, not rebuilding", codec);
                return Ok(pipeline);
            }
            Some(mut pipeline) => {
                log::info!("codec change {} -> {}, draining", pipeline.codec(), codec);
                if let Err(e) = pipeline.drain(
                    self.config.drain_attempts,
                    self.config.drain_timeout(),
                ) {
                    pipeline.teardown();
                    return Err(e);
                }
                pipeline.strip()?
            }
            None => self
                .engine
                .create_pipeline()
                .map_err(DecodeError::construction)?,
        };

        self.assemble(codec, spec, container)
    }

    fn assemble(
        &self,
        codec: CodecId,
        spec: CodecSpec,
        mut container: Box<dyn EnginePipeline>,
    ) -> Result<DecodePipeline> {
        let mut created = Vec::with_capacity(4);
        let stages = match self.add_stages(container.as_mut(), spec, &mut created) {
            Ok(stages) => stages,
            Err(e) => {
                Self::rollback(container, &created);
                return Err(DecodeError::construction(e));
            }
        };

        if let Err(e) = container.set_state(RunState::Playing) {
            log::debug!("unable to set the {} pipeline to the playing state", codec);
            Self::rollback(container, &created);
            return Err(DecodeError::construction(
                e.context("pipeline did not reach PLAYING"),
            ));
        }

        log::info!(
            "{} pipeline playing on {}: {} ! {} ! normalize ! {}",
            codec,
            self.engine.name(),
            spec.caps,
            spec.decoder,
            self.config.output_format.caps()
        );
        Ok(DecodePipeline::new(codec, container, stages))
    }

    fn add_stages(
        &self,
        container: &mut dyn EnginePipeline,
        spec: CodecSpec,
        created: &mut Vec<StageId>,
    ) -> anyhow::Result<Stages> {
        let format = self.config.output_format;
        let specs = [
            StageSpec::Source { caps: spec.caps },
            StageSpec::Decoder { name: spec.decoder },
            StageSpec::Normalizer { format },
            StageSpec::Sink {
                format,
                max_buffers: SINK_MAX_BUFFERS,
            },
        ];
        for stage in specs {
            let role = stage.role();
            let id = container
                .add_stage(stage)
                .map_err(|e| e.context(format!("create {} stage", role)))?;
            created.push(id);
        }

        container
            .link(created.as_slice())
            .map_err(|e| e.context("link stages"))?;

        Ok(Stages {
            source: created[0],
            decoder: created[1],
            normalizer: created[2],
            sink: created[3],
        })
    }

    fn rollback(mut container: Box<dyn EnginePipeline>, created: &[StageId]) {
        if let Err(e) = container.set_state(RunState::Null) {
            log::warn!("rollback: set NULL failed: {:#}", e);
        }
        for stage in created.iter().rev() {
            if let Err(e) = container.remove_stage(*stage) {
                log::warn!("rollback: remove stage failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
