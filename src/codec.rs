/*
 *  codec.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Feature blob wire format: u32 LE metadata length, JSON metadata,
 *  then row-major little-endian f32 samples
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

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::tensor::{FeatureMetadata, TensorView};

const LENGTH_PREFIX: usize = 4;
const FLOAT32: &str = "float32";

/// Fixed-point time units accepted in the `unit` tag of a time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Millis,
    Micros,
    Nanos,
    Picos,
    Femtos,
}

impl TimeUnit {
    pub fn parse(tag: &str) -> Result<Self, DecodeError> {
        Ok(match tag {
            "D" => TimeUnit::Days,
            "h" => TimeUnit::Hours,
            "m" => TimeUnit::Minutes,
            "s" => TimeUnit::Seconds,
            "ms" => TimeUnit::Millis,
            "us" | "μs" => TimeUnit::Micros,
            "ns" => TimeUnit::Nanos,
            "ps" => TimeUnit::Picos,
            "fs" => TimeUnit::Femtos,
            other => return Err(DecodeError::UnknownTimeUnit(other.to_string())),
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TimeUnit::Days => "D",
            TimeUnit::Hours => "h",
            TimeUnit::Minutes => "m",
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
            TimeUnit::Picos => "ps",
            TimeUnit::Femtos => "fs",
        }
    }

    /// Seconds per unit
    pub fn scale(&self) -> f64 {
        match self {
            TimeUnit::Days => 86_400.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Millis => 1e-3,
            TimeUnit::Micros => 1e-6,
            TimeUnit::Nanos => 1e-9,
            TimeUnit::Picos => 1e-12,
            TimeUnit::Femtos => 1e-15,
        }
    }
}

/// How `encode` writes the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEncoding {
    /// `frequency_seconds` / `duration_seconds` floats
    Seconds,
    /// base64 i64 counts of the given unit
    FixedPoint(TimeUnit),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    dtype: Option<String>,
    #[serde(default)]
    shape: Option<Vec<u64>>,
    #[serde(default)]
    max_value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_value: Option<f32>,
    #[serde(default)]
    dimensions: Option<Vec<WireDimension>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireDimension {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, alias = "sample_frequency_seconds", skip_serializing_if = "Option::is_none")]
    frequency_seconds: Option<f64>,
    #[serde(default, alias = "sample_duration_seconds", skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
}

/// Decode a feature blob into a tensor carrying its normalisation metadata.
pub fn decode(bytes: &[u8]) -> Result<TensorView, DecodeError> {
    let prefix: [u8; LENGTH_PREFIX] = bytes
        .get(..LENGTH_PREFIX)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated { needed: LENGTH_PREFIX, available: bytes.len() })?;
    let json_len = u32::from_le_bytes(prefix) as usize;
    let json_end = LENGTH_PREFIX
        .checked_add(json_len)
        .filter(|end| *end <= bytes.len())
        .ok_or(DecodeError::Truncated {
            needed: LENGTH_PREFIX.saturating_add(json_len),
            available: bytes.len(),
        })?;

    let text = std::str::from_utf8(&bytes[LENGTH_PREFIX..json_end])
        .map_err(|_| DecodeError::MetadataUtf8)?;
    let meta: WireMetadata =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    if let Some(dtype) = meta.dtype.as_deref() {
        if dtype != FLOAT32 {
            return Err(DecodeError::UnsupportedDtype(dtype.to_string()));
        }
    }
    let shape = meta.shape.ok_or(DecodeError::MissingField("shape"))?;
    if shape.is_empty() || shape.iter().any(|&d| d == 0) {
        return Err(DecodeError::InvalidField {
            field: "shape",
            reason: format!("{shape:?} must be non-empty positive integers"),
        });
    }
    let max_value = meta.max_value.ok_or(DecodeError::MissingField("max_value"))?;
    let time_axis = meta
        .dimensions
        .as_ref()
        .and_then(|dims| dims.first())
        .ok_or(DecodeError::MissingField("dimensions"))?;
    let (interval, window) = time_axis.timing()?;

    let dimensions: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let expected = dimensions
        .iter()
        .try_fold(4usize, |acc, &d| acc.checked_mul(d))
        .ok_or(DecodeError::InvalidField { field: "shape", reason: "too large".to_string() })?;
    let payload = &bytes[json_end..];
    if payload.len() != expected {
        return Err(DecodeError::PayloadLength { expected, actual: payload.len() });
    }

    let samples: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let tensor = TensorView::new(samples, dimensions, interval, window)?
        .with_metadata(FeatureMetadata { max_value, min_value: meta.min_value });
    log::debug!(
        "decoded feature blob shape {:?}, interval {}s, max {}",
        tensor.dimensions(),
        interval,
        max_value
    );
    Ok(tensor)
}

/// Encode a tensor in the same wire layout `decode` reads.
pub fn encode(tensor: &TensorView, timing: TimeEncoding) -> Vec<u8> {
    let time_axis = match timing {
        TimeEncoding::Seconds => WireDimension {
            kind: Some("time".to_string()),
            frequency_seconds: Some(tensor.sample_interval()),
            duration_seconds: Some(tensor.sample_window()),
            ..Default::default()
        },
        TimeEncoding::FixedPoint(unit) => WireDimension {
            kind: Some("time".to_string()),
            frequency: Some(encode_fixed(tensor.sample_interval(), unit)),
            duration: Some(encode_fixed(tensor.sample_window(), unit)),
            unit: Some(unit.tag().to_string()),
            ..Default::default()
        },
    };
    let mut dimensions = vec![time_axis];
    dimensions.extend((1..tensor.rank()).map(|_| WireDimension {
        kind: Some("identity".to_string()),
        ..Default::default()
    }));

    let meta = WireMetadata {
        dtype: Some(FLOAT32.to_string()),
        shape: Some(tensor.dimensions().iter().map(|&d| d as u64).collect()),
        max_value: Some(tensor.metadata().max_value),
        min_value: tensor.metadata().min_value,
        dimensions: Some(dimensions),
    };
    // WireMetadata has only plain fields, serialisation cannot fail
    let json = serde_json::to_vec(&meta).unwrap_or_default();

    let samples = tensor.as_slice();
    let mut out = Vec::with_capacity(LENGTH_PREFIX + json.len() + samples.len() * 4);
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&json);
    for v in samples {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

impl WireDimension {
    /// (seconds per step, seconds per window) for the time axis
    fn timing(&self) -> Result<(f64, f64), DecodeError> {
        if let Some(interval) = self.frequency_seconds {
            let window = self
                .duration_seconds
                .ok_or(DecodeError::MissingField("dimensions[0].duration_seconds"))?;
            return Ok((interval, window));
        }
        match (&self.frequency, &self.duration) {
            (Some(freq), Some(dur)) => {
                let unit = TimeUnit::parse(
                    self.unit.as_deref().ok_or(DecodeError::MissingField("dimensions[0].unit"))?,
                )?;
                Ok((decode_fixed(freq, unit)?, decode_fixed(dur, unit)?))
            }
            (Some(_), None) => Err(DecodeError::MissingField("dimensions[0].duration")),
            _ => Err(DecodeError::MissingField("dimensions[0].frequency_seconds")),
        }
    }
}

fn decode_fixed(encoded: &str, unit: TimeUnit) -> Result<f64, DecodeError> {
    let raw = STANDARD.decode(encoded)?;
    let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| DecodeError::InvalidField {
        field: "dimensions[0]",
        reason: format!("fixed-point time must be 8 bytes, got {}", raw.len()),
    })?;
    Ok(i64::from_le_bytes(bytes) as f64 * unit.scale())
}

fn encode_fixed(seconds: f64, unit: TimeUnit) -> String {
    let count = (seconds / unit.scale()).round() as i64;
    STANDARD.encode(count.to_le_bytes())
}
