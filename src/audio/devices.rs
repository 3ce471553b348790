//! Output device acquisition.
//! Picks the default host output device at startup and wires a
//! [`Transmitter`] into its stream callback.

use anyhow::{Context, Result};
use cpal::{
    traits::{DeviceTrait, HostTrait},
    Device, Stream, SupportedStreamConfig,
};

use crate::keyer::Transmitter;

/// The output device and stream config chosen at startup.
pub struct Output {
    pub device: Device,
    pub config: SupportedStreamConfig,
}

/// Acquire the default output device.
pub fn default_output() -> Result<Output> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no output device available")?;
    let config = device
        .default_output_config()
        .context("no supported output config")?;

    log::info!(
        "output hooked into `{}` ({})",
        device.name().unwrap_or_else(|_| "unknown".into()),
        config.sample_rate().0
    );

    Ok(Output { device, config })
}

impl Output {
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    /// Build the output stream around the transmitter. The callback fills
    /// a mono block and copies it across every channel of each frame.
    pub fn build_stream(&self, mut transmitter: Transmitter) -> Result<Stream> {
        let channels = self.config.channels() as usize;
        let mut mono = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config.clone().into(),
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if mono.len() < frames {
                        mono.resize(frames, 0.0);
                    }

                    transmitter.fill(&mut mono[..frames]);
                    for (frame, sample) in data.chunks_mut(channels).zip(&mono) {
                        frame.fill(*sample);
                    }
                },
                |err| log::error!("output stream error: {err}"),
                None,
            )
            .context("error building output stream")?;

        Ok(stream)
    }
}
