/*
 *  tensor.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared-storage, time-sliceable N-dimensional view over f32 samples
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

use crate::error::TensorError;

// intentional nudge before flooring seconds / interval, so that
// 1.0 / 0.01 lands on step 100 rather than 99
const INDEX_EPSILON: f64 = 1e-9;

/// Normalisation payload attached at decode time and carried by every slice.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMetadata {
    /// Largest magnitude in the source buffer, maps raw values into [0, 1]
    pub max_value: f32,
    pub min_value: Option<f32>,
}

impl Default for FeatureMetadata {
    fn default() -> Self {
        Self { max_value: 1.0, min_value: None }
    }
}

/// Strided view over a flat, shared `f32` buffer.
///
/// Axis 0 is time. Slicing along it never copies: every view derived from
/// the same source keeps a reference to the same storage and only narrows
/// the `[offset, offset + len)` window.
#[derive(Debug, Clone)]
pub struct TensorView {
    storage: Arc<[f32]>,
    offset: usize,
    len: usize,
    dimensions: Vec<usize>,
    strides: Vec<usize>,
    sample_interval: f64,
    sample_window: f64,
    metadata: Arc<FeatureMetadata>,
}

impl TensorView {
    /// Wrap `storage` as an array of shape `dimensions`.
    ///
    /// `sample_interval` is seconds per time step, `sample_window` the
    /// seconds spanned by each step.
    pub fn new(
        storage: impl Into<Arc<[f32]>>,
        dimensions: Vec<usize>,
        sample_interval: f64,
        sample_window: f64,
    ) -> Result<Self, TensorError> {
        let storage = storage.into();
        let expected: usize = dimensions.iter().product();
        if dimensions.is_empty() || expected != storage.len() {
            return Err(TensorError::ShapeMismatch {
                expected: if dimensions.is_empty() { 0 } else { expected },
                actual: storage.len(),
                dimensions,
            });
        }
        if !(sample_interval.is_finite() && sample_interval > 0.0) {
            return Err(TensorError::InvalidTiming(sample_interval));
        }
        let len = storage.len();
        Ok(Self {
            strides: strides_for(&dimensions),
            storage,
            offset: 0,
            len,
            dimensions,
            sample_interval,
            sample_window,
            metadata: Arc::new(FeatureMetadata::default()),
        })
    }

    pub fn with_metadata(mut self, metadata: FeatureMetadata) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Length of the time axis
    pub fn len(&self) -> usize {
        self.dimensions[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.sample_interval * self.len() as f64
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Strides of the outer `rank - 1` axes; the innermost axis is contiguous.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    pub fn sample_window(&self) -> f64 {
        self.sample_window
    }

    pub fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    /// Number of scalars in one time step
    pub fn element_stride(&self) -> usize {
        self.dimensions[1..].iter().product()
    }

    /// The samples this view covers, in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.storage[self.offset..self.offset + self.len]
    }

    /// Wall-clock start of this view relative to the source buffer.
    pub fn offset_seconds(&self) -> f64 {
        match self.element_stride() {
            0 => 0.0,
            stride => (self.offset / stride) as f64 * self.sample_interval,
        }
    }

    /// True when both views read the same backing buffer.
    pub fn shares_storage_with(&self, other: &TensorView) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Random access with one index per axis, bounds checked.
    pub fn item(&self, indices: &[usize]) -> Result<f32, TensorError> {
        if indices.len() != self.rank() {
            return Err(TensorError::IndexArity {
                expected: self.rank(),
                actual: indices.len(),
            });
        }
        let mut flat = 0;
        for (axis, (&index, &bound)) in indices.iter().zip(&self.dimensions).enumerate() {
            if index >= bound {
                return Err(TensorError::IndexOutOfRange { axis, index, bound });
            }
            flat += index * self.strides.get(axis).copied().unwrap_or(1);
        }
        Ok(self.storage[self.offset + flat])
    }

    /// Zero-copy view over time steps `[start, end)`.
    ///
    /// `None` bounds default to the full range. The end is clamped to the
    /// buffer, and a start past the end yields an empty time axis.
    pub fn slice(&self, start: Option<usize>, end: Option<usize>) -> TensorView {
        let stride = self.element_stride();
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(self.len());

        let (start_offset, end_offset, steps) = if stride == 0 {
            let end = end.min(self.len());
            (0, 0, end.saturating_sub(start))
        } else {
            let end_offset = end.saturating_mul(stride).min(self.len);
            let start_offset = start.saturating_mul(stride).min(end_offset);
            (start_offset, end_offset, (end_offset - start_offset) / stride)
        };

        let mut dimensions = self.dimensions.clone();
        dimensions[0] = steps;
        TensorView {
            storage: Arc::clone(&self.storage),
            offset: self.offset + start_offset,
            len: end_offset - start_offset,
            dimensions,
            strides: self.strides.clone(),
            sample_interval: self.sample_interval,
            sample_window: self.sample_window,
            metadata: Arc::clone(&self.metadata),
        }
    }

    /// Zero-copy view covering `duration_seconds` from `start_seconds`.
    pub fn time_slice(&self, start_seconds: f64, duration_seconds: f64) -> TensorView {
        let start = self.steps_for(start_seconds);
        let steps = self.steps_for(duration_seconds);
        self.slice(Some(start), Some(start.saturating_add(steps)))
    }

    fn steps_for(&self, seconds: f64) -> usize {
        let steps = (seconds / self.sample_interval + INDEX_EPSILON).floor();
        // float casts saturate, so an unbounded duration reaches the end
        if steps > 0.0 { steps as usize } else { 0 }
    }
}

/// stride of axis k = product(dimensions[k+1..]) for the outer rank-1 axes
fn strides_for(dimensions: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dimensions.len().saturating_sub(1)];
    let mut acc = 1;
    for axis in (0..strides.len()).rev() {
        acc *= dimensions[axis + 1];
        strides[axis] = acc;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|v| v as f32).collect()
    }

    #[test]
    fn test_construction_reports_shape() {
        let t = TensorView::new(ramp(12), vec![4, 3], 0.5, 0.5).unwrap();
        assert_eq!(t.rank(), 2);
        assert_eq!(t.len(), 4);
        assert_eq!(t.strides(), &[3]);
        assert_relative_eq!(t.duration_seconds(), 2.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = TensorView::new(ramp(11), vec![4, 3], 0.5, 0.5).unwrap_err();
        assert_eq!(
            err,
            TensorError::ShapeMismatch { dimensions: vec![4, 3], expected: 12, actual: 11 }
        );
        assert!(TensorView::new(ramp(0), vec![], 0.5, 0.5).is_err());
    }

    #[test]
    fn test_invalid_interval() {
        assert!(matches!(
            TensorView::new(ramp(4), vec![4], 0.0, 0.0),
            Err(TensorError::InvalidTiming(_))
        ));
    }

    #[test]
    fn test_strides_rank3() {
        let t = TensorView::new(ramp(24), vec![2, 3, 4], 1.0, 1.0).unwrap();
        assert_eq!(t.strides(), &[12, 4]);
        assert_eq!(t.item(&[1, 2, 3]).unwrap(), 23.0);
    }

    #[test]
    fn test_item_rank2() {
        let t = TensorView::new(ramp(12), vec![4, 3], 1.0, 1.0).unwrap();
        assert_eq!(t.item(&[1, 2]).unwrap(), 5.0);
        assert_eq!(
            t.item(&[4, 0]).unwrap_err(),
            TensorError::IndexOutOfRange { axis: 0, index: 4, bound: 4 }
        );
        assert_eq!(
            t.item(&[0, 3]).unwrap_err(),
            TensorError::IndexOutOfRange { axis: 1, index: 3, bound: 3 }
        );
        assert!(matches!(t.item(&[1]), Err(TensorError::IndexArity { .. })));
    }

    #[test]
    fn test_slice_aliases_storage() {
        let t = TensorView::new(ramp(12), vec![4, 3], 1.0, 1.0).unwrap();
        let s = t.slice(Some(1), Some(3));
        assert_eq!(s.dimensions(), &[2, 3]);
        assert!(s.shares_storage_with(&t));
        assert_eq!(s.as_slice(), &t.as_slice()[3..9]);
        assert_eq!(s.as_slice().as_ptr(), t.as_slice()[3..].as_ptr());
        assert_eq!(s.item(&[0, 0]).unwrap(), 3.0);
        assert_relative_eq!(s.offset_seconds(), 1.0);
    }

    #[test]
    fn test_slice_defaults_and_clamping() {
        let t = TensorView::new(ramp(12), vec![4, 3], 1.0, 1.0).unwrap();
        assert_eq!(t.slice(None, None).dimensions(), &[4, 3]);
        assert_eq!(t.slice(Some(2), None).len(), 2);
        assert_eq!(t.slice(Some(1), Some(100)).len(), 3);

        let empty = t.slice(Some(3), Some(1));
        assert!(empty.is_empty());
        assert!(empty.as_slice().is_empty());

        let past = t.slice(Some(10), Some(20));
        assert!(past.is_empty());
    }

    #[test]
    fn test_nested_slice_keeps_metadata() {
        let t = TensorView::new(ramp(100), vec![100], 0.1, 0.1)
            .unwrap()
            .with_metadata(FeatureMetadata { max_value: 99.0, min_value: Some(0.0) });
        let s = t.slice(Some(10), Some(60)).slice(Some(5), Some(10));
        assert_eq!(s.as_slice(), &[15.0, 16.0, 17.0, 18.0, 19.0]);
        assert_eq!(s.metadata().max_value, 99.0);
        assert_relative_eq!(s.offset_seconds(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_time_slice() {
        let t = TensorView::new(ramp(1000), vec![1000], 0.01, 0.01).unwrap();
        let s = t.time_slice(1.0, 0.5);
        assert_eq!(s.len(), 50);
        assert_eq!(s.as_slice()[0], 100.0);
        assert!(t.time_slice(-3.0, 0.05).as_slice().starts_with(&[0.0, 1.0]));
        assert_eq!(t.time_slice(9.9, 5.0).len(), 10);
    }
}
