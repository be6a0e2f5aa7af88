use std::{thread::JoinHandle, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tokio_util::sync::CancellationToken;

use crate::{frame::PixelFormat, packet::CompressedFrame, scaler::Scaler};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) enum SourceItem {
    Buffer(CompressedFrame),
    Eos,
}

pub(crate) enum SinkItem {
    Sample(crate::frame::Sample),
    Eos,
}

/// The decoder stage: an ffmpeg video decoder opened by name.
pub struct Decoder {
    name: &'static str,
    inner: ffmpeg_next::codec::decoder::Video,
}

impl Decoder {
    pub fn new(name: &'static str) -> anyhow::Result<Self> {
        let codec = ffmpeg_next::decoder::find_by_name(name)
            .ok_or_else(|| anyhow::anyhow!("no decoder named {}", name))?;
        let inner = ffmpeg_next::codec::Context::new_with_codec(codec)
            .decoder()
            .open_as(codec)?
            .video()?;
        Ok(Self { name, inner })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn send_packet(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let packet = ffmpeg_next::Packet::copy(data);
        self.inner.send_packet(&packet)?;
        Ok(())
    }

    pub fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    pub fn receive_frame(&mut self) -> anyhow::Result<Option<ffmpeg_next::frame::Video>> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Worker thread running decoder and normalizer between the source and
/// sink channels while the pipeline is PLAYING.
pub struct DecoderTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DecoderTask {
    pub(crate) fn start(
        decoder: Decoder,
        format: PixelFormat,
        input: Receiver<SourceItem>,
        output: Sender<SinkItem>,
    ) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = std::thread::Builder::new()
            .name(format!("decode-{}", decoder.name()))
            .spawn(move || {
                Self::decoder_loop(decoder, Scaler::new(format), cancel_clone, input, output)
            })?;
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("decoder worker panicked");
            }
        }
    }

    fn decoder_loop(
        mut decoder: Decoder,
        mut scaler: Scaler,
        cancel: CancellationToken,
        input: Receiver<SourceItem>,
        output: Sender<SinkItem>,
    ) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let item = match input.recv_timeout(POLL_INTERVAL) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let eos = match item {
                SourceItem::Buffer(frame) => {
                    let sent = decoder.send_packet(frame.as_slice());
                    drop(frame);
                    if let Err(e) = sent {
                        log::error!("{} send packet error: {}", decoder.name(), e);
                        continue;
                    }
                    false
                }
                SourceItem::Eos => {
                    if let Err(e) = decoder.send_eof() {
                        log::error!("{} send eof error: {}", decoder.name(), e);
                    }
                    true
                }
            };

            loop {
                match decoder.receive_frame() {
                    Ok(Some(frame)) => match scaler.run(&frame) {
                        Ok(sample) => {
                            if !Self::forward(&output, SinkItem::Sample(sample), &cancel) {
                                return;
                            }
                        }
                        Err(e) => log::warn!("normalize error: {:#}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("{} receive frame error: {}", decoder.name(), e);
                        break;
                    }
                }
            }

            if eos {
                Self::forward(&output, SinkItem::Eos, &cancel);
                break;
            }
        }
        log::debug!("{} worker exiting", decoder.name());
    }

    /// Blocks while the sink is full, giving up on cancellation.
    fn forward(output: &Sender<SinkItem>, mut item: SinkItem, cancel: &CancellationToken) -> bool {
        loop {
            match output.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

impl Drop for DecoderTask {
    fn drop(&mut self) {
        self.stop();
    }
}
