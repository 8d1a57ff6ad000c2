/*
 *  viewport.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Zoom and pan state for a horizontally scrolling feature view
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

use crate::tensor::TensorView;

pub const MIN_ZOOM: u32 = 1;
pub const MAX_ZOOM: u32 = 20;

/// Maps a fixed-width container onto a timeline `zoom` times wider.
///
/// The container scrolls horizontally over an element of
/// `container_width * zoom` pixels. `pan_offset` is the fraction of that
/// element scrolled past the left edge and survives zoom changes, so the
/// same part of the timeline stays in view.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: u32,
    container_width: u32,
    container_height: u32,
    scroll_left: f64,
    pan_offset: f64,
}

impl Viewport {
    pub fn new(container_width: u32, container_height: u32) -> Self {
        Self {
            zoom: MIN_ZOOM,
            container_width,
            container_height,
            scroll_left: 0.0,
            pan_offset: 0.0,
        }
    }

    pub fn zoom(&self) -> u32 { self.zoom }
    pub fn container_width(&self) -> u32 { self.container_width }
    pub fn container_height(&self) -> u32 { self.container_height }
    pub fn scroll_left(&self) -> f64 { self.scroll_left }
    pub fn pan_offset(&self) -> f64 { self.pan_offset }

    pub fn element_width(&self) -> u32 {
        self.container_width.saturating_mul(self.zoom)
    }

    fn max_scroll(&self) -> f64 {
        self.element_width().saturating_sub(self.container_width) as f64
    }

    /// Settle scroll and pan before a redraw.
    ///
    /// With `preserve_offset` the pixel scroll is recomputed from the pan
    /// fraction (zoom, resize); otherwise the pan fraction is read back from
    /// wherever the user scrolled to.
    pub fn layout(&mut self, preserve_offset: bool) {
        let element_width = self.element_width() as f64;
        if preserve_offset {
            self.scroll_left = (self.pan_offset * element_width).clamp(0.0, self.max_scroll());
        } else if element_width > 0.0 {
            self.pan_offset = (self.scroll_left / element_width).clamp(0.0, 1.0);
        }
    }

    /// Returns false when `zoom` (after clamping to 1..=20) is unchanged.
    pub fn set_zoom(&mut self, zoom: u32) -> bool {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if zoom == self.zoom {
            return false;
        }
        self.zoom = zoom;
        self.layout(true);
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom.saturating_add(1))
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom.saturating_sub(1))
    }

    /// Record the host's scroll position without settling the layout.
    pub fn set_scroll_left(&mut self, scroll_pixels: f64) {
        self.scroll_left = if scroll_pixels.is_finite() {
            scroll_pixels.clamp(0.0, self.max_scroll())
        } else {
            0.0
        };
    }

    /// Record a new container size without settling the layout.
    pub fn set_container_size(&mut self, width: u32, height: u32) {
        self.container_width = width;
        self.container_height = height;
    }

    /// User pan: the pan fraction follows the scroll position.
    pub fn on_scroll(&mut self, scroll_pixels: f64) {
        self.set_scroll_left(scroll_pixels);
        self.layout(false);
    }

    /// Container resize: the scroll position follows the pan fraction.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.set_container_size(width, height);
        self.layout(true);
    }

    pub fn set_pan_offset(&mut self, pan_offset: f64) {
        self.pan_offset = if pan_offset.is_finite() { pan_offset.clamp(0.0, 1.0) } else { 0.0 };
        self.layout(true);
    }

    /// Absolute sound time under element pixel `pixel_x`.
    pub fn pixel_to_time_seconds(&self, pixel_x: f64, tensor: &TensorView) -> f64 {
        let element_width = self.element_width() as f64;
        if element_width <= 0.0 {
            return tensor.offset_seconds();
        }
        tensor.offset_seconds() + (pixel_x / element_width) * tensor.duration_seconds()
    }

    /// Absolute (start, end) seconds currently inside the container.
    pub fn visible_time_range(&self, tensor: &TensorView) -> (f64, f64) {
        let start = self.pixel_to_time_seconds(self.scroll_left, tensor);
        let end = self.pixel_to_time_seconds(self.scroll_left + self.container_width as f64, tensor);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tensor() -> TensorView {
        TensorView::new(vec![0.0; 1000], vec![1000], 0.01, 0.01).unwrap()
    }

    #[test]
    fn test_element_width_tracks_zoom() {
        let mut v = Viewport::new(200, 50);
        assert_eq!(v.element_width(), 200);
        assert!(v.set_zoom(3));
        assert_eq!(v.element_width(), 600);
        assert!(!v.set_zoom(3));
        assert!(v.set_zoom(99));
        assert_eq!(v.zoom(), MAX_ZOOM);
        assert!(v.set_zoom(0));
        assert_eq!(v.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_zoom_buttons_clamp() {
        let mut v = Viewport::new(100, 10);
        assert!(!v.zoom_out());
        for _ in 0..30 {
            v.zoom_in();
        }
        assert_eq!(v.zoom(), 20);
        assert!(v.zoom_out());
        assert_eq!(v.zoom(), 19);
    }

    #[test]
    fn test_zoom_round_trip_preserves_pan() {
        let mut v = Viewport::new(400, 100);
        v.set_pan_offset(0.3);
        v.set_zoom(4);
        assert_relative_eq!(v.scroll_left(), 480.0);
        v.set_zoom(1);
        assert_relative_eq!(v.pan_offset(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_scroll_updates_pan_without_repositioning() {
        let mut v = Viewport::new(100, 10);
        v.set_zoom(5);
        v.on_scroll(250.0);
        assert_relative_eq!(v.scroll_left(), 250.0);
        assert_relative_eq!(v.pan_offset(), 0.5);
        v.on_scroll(10_000.0);
        assert_relative_eq!(v.scroll_left(), 400.0);
    }

    #[test]
    fn test_resize_repositions_scroll() {
        let mut v = Viewport::new(100, 10);
        v.set_zoom(4);
        v.on_scroll(100.0);
        assert_relative_eq!(v.pan_offset(), 0.25);
        v.on_resize(200, 20);
        assert_eq!(v.element_width(), 800);
        assert_relative_eq!(v.scroll_left(), 200.0);
        assert_relative_eq!(v.pan_offset(), 0.25);
    }

    #[test]
    fn test_pixel_time_mapping() {
        let t = tensor().time_slice(2.0, 4.0);
        let mut v = Viewport::new(400, 10);
        assert_relative_eq!(v.pixel_to_time_seconds(0.0, &t), 2.0, epsilon = 1e-9);
        assert_relative_eq!(v.pixel_to_time_seconds(200.0, &t), 4.0, epsilon = 1e-9);
        v.set_zoom(2);
        assert_relative_eq!(v.pixel_to_time_seconds(200.0, &t), 3.0, epsilon = 1e-9);
        v.on_scroll(400.0);
        let (start, end) = v.visible_time_range(&t);
        assert_relative_eq!(start, 4.0, epsilon = 1e-9);
        assert_relative_eq!(end, 6.0, epsilon = 1e-9);
    }
}
