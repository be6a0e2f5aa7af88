// ============================================================================
// Pipeline Builder Tests
// ============================================================================

use std::sync::Arc;

use super::PipelineBuilder;
use crate::{
    codec::CodecId,
    config::DecoderConfig,
    engine::{RunState, StageRole},
    error::DecodeError,
    mock::MockEngine,
    packet::CompressedFrame,
    pipeline::MAX_DRAIN_SAMPLES,
};

fn builder(engine: &MockEngine) -> PipelineBuilder {
    PipelineBuilder::new(Arc::new(engine.clone()), DecoderConfig::default())
}

#[test]
fn test_build_supported_codecs() {
    for codec in [CodecId::Mjpeg, CodecId::Vp8, CodecId::H264] {
        let engine = MockEngine::new();
        let pipeline = builder(&engine).build(codec, None).unwrap();

        assert_eq!(pipeline.codec(), codec);
        assert_eq!(pipeline.state(), RunState::Playing);
        assert_eq!(pipeline.stage_count(), 4);
        let stages = pipeline.stages().all();
        for (i, a) in stages.iter().enumerate() {
            for b in &stages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(engine.ledger(|l| l.live_stages), 4);

        pipeline.teardown();
        assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
    }
}

#[test]
fn test_build_unsupported_creates_nothing() {
    for codec in [CodecId::Vp9, CodecId::H265, CodecId::Unknown(42)] {
        let engine = MockEngine::new();
        match builder(&engine).build(codec, None) {
            Err(DecodeError::UnsupportedCodec(c)) => assert_eq!(c, codec),
            other => panic!("expected UnsupportedCodec, got {:?}", other.err()),
        }
        assert_eq!(
            engine.ledger(|l| (l.pipelines_created, l.stages_created)),
            (0, 0)
        );
    }
}

#[test]
fn test_stage_creation_failure_rolls_back() {
    for role in StageRole::CHAIN {
        let engine = MockEngine::new();
        engine.configure(|c| c.fail_stage = Some(role));

        let err = builder(&engine).build(CodecId::H264, None).err().unwrap();
        match err {
            DecodeError::ConstructionFailed { reason } => {
                assert!(reason.contains(&role.to_string()), "reason: {}", reason)
            }
            other => panic!("expected ConstructionFailed, got {:?}", other),
        }
        assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
    }
}

#[test]
fn test_link_failure_rolls_back() {
    let engine = MockEngine::new();
    engine.configure(|c| c.fail_link = true);

    let err = builder(&engine).build(CodecId::Vp8, None).err().unwrap();
    assert!(matches!(err, DecodeError::ConstructionFailed { .. }));
    assert_eq!(engine.ledger(|l| l.stages_created), 4);
    assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
}

#[test]
fn test_playing_failure_rolls_back() {
    let engine = MockEngine::new();
    engine.configure(|c| c.fail_playing = true);

    let err = builder(&engine).build(CodecId::Mjpeg, None).err().unwrap();
    match err {
        DecodeError::ConstructionFailed { reason } => assert!(reason.contains("PLAYING")),
        other => panic!("expected ConstructionFailed, got {:?}", other),
    }
    assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
}

#[test]
fn test_rebuild_reuses_container_with_new_stages() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let first = builder.build(CodecId::Mjpeg, None).unwrap();
    let old_stages = first.stages().all();

    let second = builder.build(CodecId::H264, Some(first)).unwrap();
    assert_eq!(second.codec(), CodecId::H264);
    assert_eq!(second.state(), RunState::Playing);
    assert_eq!(second.stage_count(), 4);
    for stage in second.stages().all() {
        assert!(!old_stages.contains(&stage));
    }
    assert_eq!(engine.ledger(|l| (l.pipelines_created, l.eos_sent)), (1, 1));
    assert_eq!(engine.ledger(|l| l.live_stages), 4);
}

#[test]
fn test_same_codec_returns_existing() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let first = builder.build(CodecId::Vp8, None).unwrap();
    let stages = *first.stages();

    let again = builder.build(CodecId::Vp8, Some(first)).unwrap();
    assert_eq!(*again.stages(), stages);
    assert_eq!(engine.ledger(|l| (l.stages_created, l.eos_sent)), (4, 0));
}

#[test]
fn test_stalled_drain_tears_down_existing() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let first = builder.build(CodecId::Vp8, None).unwrap();
    engine.configure(|c| c.stall_drain = true);

    match builder.build(CodecId::H264, Some(first)) {
        Err(DecodeError::DrainTimeout { attempts }) => {
            assert_eq!(attempts, DecoderConfig::default().drain_attempts)
        }
        other => panic!("expected DrainTimeout, got {:?}", other.err()),
    }
    assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
}

#[test]
fn test_unsupported_codec_change_releases_existing() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let first = builder.build(CodecId::H264, None).unwrap();

    let err = builder.build(CodecId::Vp9, Some(first)).err().unwrap();
    assert!(matches!(err, DecodeError::UnsupportedCodec(CodecId::Vp9)));
    assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
}

#[test]
fn test_drain_with_deep_decoder_queue_completes() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let mut first = builder.build(CodecId::H264, None).unwrap();
    let queued = DecoderConfig::default().drain_attempts as usize + 2;
    engine.configure(|c| c.latency = queued);
    for _ in 0..queued {
        first.push(CompressedFrame::from_static(b"h264"));
    }

    let second = builder.build(CodecId::Vp8, Some(first)).unwrap();
    assert_eq!(second.codec(), CodecId::Vp8);
    assert_eq!(second.state(), RunState::Playing);
    assert_eq!(engine.ledger(|l| (l.pipelines_created, l.eos_sent)), (1, 1));
    assert_eq!(engine.live_samples(), 0);
}

#[test]
fn test_runaway_drain_is_bounded() {
    let engine = MockEngine::new();
    let builder = builder(&engine);
    let mut first = builder.build(CodecId::H264, None).unwrap();
    engine.configure(|c| c.latency = MAX_DRAIN_SAMPLES + 1);
    for _ in 0..=MAX_DRAIN_SAMPLES {
        first.push(CompressedFrame::from_static(b"h264"));
    }

    let err = builder.build(CodecId::Vp8, Some(first)).err().unwrap();
    assert!(matches!(err, DecodeError::DrainTimeout { .. }));
    assert_eq!(engine.ledger(|l| (l.live_stages, l.live_pipelines)), (0, 0));
}

#[test]
fn test_sink_holds_one_buffer() {
    let engine = MockEngine::new();
    let config: DecoderConfig = serde_json::from_str(r#"{"sink_max_buffers": 4}"#).unwrap();
    let builder = PipelineBuilder::new(Arc::new(engine.clone()), config);

    let first = builder.build(CodecId::Mjpeg, None).unwrap();
    let _second = builder.build(CodecId::H264, Some(first)).unwrap();
    assert_eq!(engine.ledger(|l| l.sink_buffers.clone()), vec![1, 1]);
}
