use bytes::Bytes;
use ffmpeg_next::{
    format::Pixel,
    frame::Video,
    software::scaling::{Context, Flags},
};

use crate::frame::{PixelFormat, Sample};

/// The normalizer stage: converts decoder output to the renderer's format.
///
/// The scaling context is rebuilt whenever the decoded layout changes.
pub struct Scaler {
    format: PixelFormat,
    input: Option<(Pixel, u32, u32)>,
    context: Option<Context>,
}

impl Scaler {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            input: None,
            context: None,
        }
    }

    pub fn run(&mut self, frame: &Video) -> anyhow::Result<Sample> {
        let (width, height) = (frame.width(), frame.height());
        let key = (frame.format(), width, height);
        if self.input != Some(key) || self.context.is_none() {
            let context = Context::get(
                key.0,
                width,
                height,
                self.format.to_ffmpeg(),
                width,
                height,
                Flags::BILINEAR,
            )
            .map_err(|e| anyhow::anyhow!("scaler for {:?} {}x{}: {}", key.0, width, height, e))?;
            log::debug!("normalizing {:?} {}x{} to {:?}", key.0, width, height, self.format);
            self.context = Some(context);
            self.input = Some(key);
        }
        let Some(context) = self.context.as_mut() else {
            anyhow::bail!("scaler not initialized");
        };

        let mut out = Video::empty();
        context.run(frame, &mut out)?;

        let row = width as usize * self.format.bytes_per_pixel();
        let stride = out.stride(0);
        let plane = out.data(0);
        let mut data = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            data.extend_from_slice(&plane[start..start + row]);
        }
        Ok(Sample::new(Bytes::from(data), width, height, self.format))
    }
}
