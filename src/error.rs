/*
 *  error.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for tensors, blob decoding, fetching and rendering
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

use std::sync::Arc;
use thiserror::Error;

/// Errors raised by [`crate::tensor::TensorView`] construction and access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    /// product(dimensions) does not match the storage length
    #[error("shape {dimensions:?} describes {expected} elements but storage holds {actual}")]
    ShapeMismatch {
        dimensions: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} out of range for axis {axis} (length {bound})")]
    IndexOutOfRange { axis: usize, index: usize, bound: usize },

    #[error("expected {expected} indices for a rank {expected} tensor, got {actual}")]
    IndexArity { expected: usize, actual: usize },

    /// seconds-per-step must be finite and positive
    #[error("invalid sample interval {0}")]
    InvalidTiming(f64),
}

/// Errors raised while decoding a feature blob.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("blob truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("metadata is not valid UTF-8")]
    MetadataUtf8,

    #[error("metadata is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("metadata missing required field '{0}'")]
    MissingField(&'static str),

    #[error("metadata field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unsupported element type '{0}' (only float32)")]
    UnsupportedDtype(String),

    #[error("unknown time unit '{0}'")]
    UnknownTimeUnit(String),

    #[error("bad base64 time value: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload holds {actual} bytes, shape needs {expected}")]
    PayloadLength { expected: usize, actual: usize },

    #[error(transparent)]
    Shape(#[from] TensorError),
}

/// Errors raised while fetching and decoding a sound's feature data.
///
/// Cloneable so that a single failure can be handed to every waiter
/// on a shared cache slot.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("feature blob decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("audio decode failed: {0}")]
    Audio(String),

    #[error("sound {0} has no audio url")]
    MissingAudioUrl(String),

    #[error("no '{feature}' data for sound {sound_id}")]
    MissingFeature { sound_id: String, feature: String },

    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// the load task ended without publishing a result
    #[error("load abandoned before completing")]
    Abandoned,
}

impl FetchError {
    pub fn network(url: &str, err: reqwest::Error) -> Self {
        FetchError::Network {
            url: url.to_string(),
            source: Arc::new(err),
        }
    }
}

impl From<hound::Error> for FetchError {
    fn from(err: hound::Error) -> Self {
        FetchError::Audio(err.to_string())
    }
}

/// Errors raised by a single render call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// Only 1-D (waveform) and 2-D (heatmap) projections exist
    #[error("rank {0} tensors cannot be rendered (max 2)")]
    UnsupportedRank(usize),

    #[error("render target is no longer attached")]
    Detached,

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_is_shareable() {
        let err = FetchError::MissingAudioUrl("/sounds/abc".to_string());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert!(copy.to_string().contains("/sounds/abc"));
    }

    #[test]
    fn test_decode_error_wraps_shape() {
        let err: DecodeError = TensorError::ShapeMismatch {
            dimensions: vec![2, 2],
            expected: 4,
            actual: 3,
        }
        .into();
        assert!(matches!(err, DecodeError::Shape(_)));
        assert!(err.to_string().contains("storage holds 3"));
    }
}
