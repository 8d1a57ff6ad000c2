/*
 *  audio.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Audio decode primitive and playback excerpts
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::{FetchError, TensorError};
use crate::tensor::{FeatureMetadata, TensorView};

/// De-interleaved PCM, one shared buffer per channel.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub channels: Vec<Arc<[f32]>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    /// Rank-1 tensor over one channel, one step per sample.
    ///
    /// Shares the channel buffer, so slicing the tensor never copies audio.
    pub fn channel_tensor(&self, channel: usize) -> Result<TensorView, TensorError> {
        let samples = self.channels.get(channel).ok_or(TensorError::IndexOutOfRange {
            axis: 0,
            index: channel,
            bound: self.channels.len(),
        })?;
        let interval = 1.0 / self.sample_rate as f64;
        Ok(TensorView::new(Arc::clone(samples), vec![samples.len()], interval, interval)?
            .with_metadata(FeatureMetadata { max_value: 1.0, min_value: Some(-1.0) }))
    }
}

/// `decode(bytes) -> channel samples, sample rate`
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, FetchError>;
}

/// WAV decoder normalising integer PCM to [-1.0, 1.0].
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, FetchError> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channel_count = spec.channels as usize;
        if channel_count == 0 {
            return Err(FetchError::Audio("WAV has 0 channels".to_string()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Int => {
                let scale = match spec.bits_per_sample {
                    8 => 1.0 / 128.0,
                    16 => 1.0 / 32768.0,
                    24 => 1.0 / 8388608.0,
                    32 => 1.0 / 2147483648.0,
                    bits => return Err(FetchError::Audio(format!("unsupported bit depth {bits}"))),
                };
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        };

        let frames = interleaved.len() / channel_count;
        let channels = (0..channel_count)
            .map(|ch| {
                interleaved
                    .iter()
                    .skip(ch)
                    .step_by(channel_count)
                    .take(frames)
                    .copied()
                    .collect::<Vec<f32>>()
                    .into()
            })
            .collect();

        log::debug!(
            "decoded {} frames x {} channels @ {} Hz",
            frames,
            channel_count,
            spec.sample_rate
        );
        Ok(DecodedAudio { channels, sample_rate: spec.sample_rate })
    }
}

/// Write a rank-1 audio tensor (usually a time slice) as 32-bit float WAV.
pub fn write_excerpt(tensor: &TensorView, path: &Path) -> Result<(), FetchError> {
    if tensor.rank() != 1 {
        return Err(FetchError::Audio(format!("cannot write rank {} tensor as audio", tensor.rank())));
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate: (1.0 / tensor.sample_interval()).round() as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in tensor.as_slice() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
