use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

mod config;
mod replay;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .filter_module("decode_bus", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: display-decode <replay.json>"))?;
    let config = config::ReplayConfig::load(&path)?;
    let engine = replay::engine()?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let mut handle =
        tokio::task::spawn_blocking(move || replay::replay(&config, engine, cancel_clone));

    let stats = loop {
        tokio::select! {
            result = &mut handle => {
                break result??;
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("ctrl+c received");
                cancel.cancel();
            },
        }
    };

    log::info!(
        "replay done: pushed {}, decoded {}, dropped {}, rebuilds {}",
        stats.pushed,
        stats.decoded,
        stats.dropped,
        stats.rebuilds
    );
    Ok(())
}
