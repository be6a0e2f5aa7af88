use std::path::{Path, PathBuf};

use decode_bus::{CodecId, DecoderConfig};
use serde::Deserialize;

/// Replay run, loaded from the JSON file given on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Directory holding one compressed frame per file, replayed in name order.
    pub frames_dir: PathBuf,
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    /// Where to write the last decoded frame as JPEG.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

impl ReplayConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {}", path.display(), e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if config.width == 0 || config.height == 0 {
            anyhow::bail!("invalid video size {}x{}", config.width, config.height);
        }
        Ok(config)
    }
}
