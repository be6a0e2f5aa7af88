use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use decode_bus::{
    CodecId, CompressedFrame, DecodedFrame, FrameSource, StreamDecoder, engine::Engine,
    exchange::DecodeStats,
};
use tokio_util::sync::CancellationToken;

use crate::config::ReplayConfig;

/// Plays the role of the protocol layer for frames read from disk.
struct DiskSource {
    frame: CompressedFrame,
    codec: CodecId,
    size: (u32, u32),
}

impl FrameSource for DiskSource {
    fn current_frame(&self) -> CompressedFrame {
        self.frame.clone()
    }

    fn codec(&self) -> CodecId {
        self.codec
    }

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }
}

pub(crate) fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("read frames dir {}: {}", dir.display(), e))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(feature = "ffmpeg")]
pub(crate) fn engine() -> anyhow::Result<Arc<dyn Engine>> {
    Ok(Arc::new(decode_bus::ffmpeg::FfmpegEngine::new()?))
}

#[cfg(not(feature = "ffmpeg"))]
pub(crate) fn engine() -> anyhow::Result<Arc<dyn Engine>> {
    anyhow::bail!("built without a decode engine, rebuild with --features ffmpeg")
}

/// Runs every frame of the configured directory through a stream decoder.
pub(crate) fn replay(
    config: &ReplayConfig,
    engine: Arc<dyn Engine>,
    cancel: CancellationToken,
) -> anyhow::Result<DecodeStats> {
    let files = list_frames(&config.frames_dir)?;
    log::info!(
        "replaying {} {} frames from {} on {}",
        files.len(),
        config.codec,
        config.frames_dir.display(),
        engine.name()
    );

    let mut stream = StreamDecoder::new(engine, config.decoder.clone());
    stream.init_decoder(config.codec);

    let mut source = DiskSource {
        frame: CompressedFrame::default(),
        codec: config.codec,
        size: (config.width, config.height),
    };
    for path in &files {
        if cancel.is_cancelled() {
            log::info!("replay cancelled");
            break;
        }
        source.frame = CompressedFrame::from(std::fs::read(path)?);
        if stream.submit_frame(&source) {
            if let Some(frame) = stream.current_decoded_frame() {
                log::debug!("{}: {}", path.display(), frame);
            }
        } else {
            log::debug!("{}: no frame", path.display());
        }
    }

    if let Some(path) = &config.snapshot {
        match stream.current_decoded_frame() {
            Some(frame) => write_snapshot(path, frame)?,
            None => log::warn!("no decoded frame to snapshot"),
        }
    }

    stream.cleanup_decoder();
    Ok(stream.stats())
}

fn write_snapshot(path: &Path, frame: &DecodedFrame) -> anyhow::Result<()> {
    let width = u16::try_from(frame.width())?;
    let height = u16::try_from(frame.height())?;
    let encoder = jpeg_encoder::Encoder::new_file(path, 90)?;
    encoder.encode(frame.data(), width, height, jpeg_encoder::ColorType::Bgra)?;
    log::info!("snapshot written to {}", path.display());
    Ok(())
}
