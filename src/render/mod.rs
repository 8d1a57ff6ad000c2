/*
 *  render/mod.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Rank dispatch from a feature slice to pixels
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

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::tensor::TensorView;
use crate::viewport::Viewport;

pub mod canvas;
mod heatmap;
pub mod shade;
pub mod surface;
mod waveform;

pub use canvas::Canvas;
pub use shade::Shade;
pub use surface::{PixelSurface, VarFrameBuf};

/// Pixel format of an owned canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDepth {
    /// 1 bit, thresholded at 50%
    Mono,
    /// 16 levels
    Gray4,
    /// 256 levels
    Gray8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Waveform,
    Heatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub projection: Projection,
    pub width: u32,
    pub height: u32,
    pub columns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderer {
    /// 1.0 is white
    pub background: f32,
    /// darkness of a zero-amplitude waveform bar
    pub bar_base_opacity: f32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self { background: 1.0, bar_base_opacity: 0.25 }
    }
}

impl Renderer {
    /// Size the surface to the zoomed element and draw the visible window.
    ///
    /// Rank and attachment are checked before the surface is touched, so an
    /// unsupported tensor leaves the previous frame intact.
    pub fn render<S: PixelSurface>(
        &self,
        tensor: &TensorView,
        viewport: &Viewport,
        surface: &mut S,
    ) -> Result<RenderSummary, RenderError> {
        let projection = match tensor.rank() {
            1 => Projection::Waveform,
            2 => Projection::Heatmap,
            rank => return Err(RenderError::UnsupportedRank(rank)),
        };
        if !surface.is_attached() {
            return Err(RenderError::Detached);
        }

        let (width, height) = (viewport.element_width(), viewport.container_height());
        surface.resize(width, height);
        surface.clear(S::Color::from_intensity(self.background));

        let columns = match projection {
            Projection::Waveform => waveform::draw(tensor, viewport, surface, self.bar_base_opacity),
            Projection::Heatmap => heatmap::draw(tensor, viewport, surface)?,
        };
        debug!(
            "{:?} {}x{} zoom {} scroll {:.1}: {} columns",
            projection,
            width,
            height,
            viewport.zoom(),
            viewport.scroll_left(),
            columns
        );
        Ok(RenderSummary { projection, width, height, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::{Gray8, GrayColor};

    /// Counts writes so rejection paths can be shown to leave pixels alone.
    struct Recording {
        inner: VarFrameBuf<Gray8>,
        writes: usize,
        attached: bool,
    }

    impl PixelSurface for Recording {
        type Color = Gray8;
        fn resize(&mut self, w: u32, h: u32) { self.writes += 1; PixelSurface::resize(&mut self.inner, w, h) }
        fn dimensions(&self) -> (u32, u32) { self.inner.dimensions() }
        fn clear(&mut self, c: Gray8) { self.writes += 1; PixelSurface::clear(&mut self.inner, c) }
        fn set_pixel(&mut self, x: u32, y: u32, c: Gray8) { self.writes += 1; self.inner.set_pixel(x, y, c) }
        fn is_attached(&self) -> bool { self.attached }
    }

    fn recording() -> Recording {
        Recording { inner: VarFrameBuf::new(3, 3, Gray8::new(9)), writes: 0, attached: true }
    }

    #[test]
    fn test_rank3_is_rejected_without_writes() {
        let t = TensorView::new(vec![0.0; 8], vec![2, 2, 2], 1.0, 1.0).unwrap();
        let mut s = recording();
        let err = Renderer::default().render(&t, &Viewport::new(10, 10), &mut s).unwrap_err();
        assert_eq!(err, RenderError::UnsupportedRank(3));
        assert_eq!(s.writes, 0);
        assert_eq!(s.inner.pixel(0, 0), Some(Gray8::new(9)));
    }

    #[test]
    fn test_detached_surface_is_rejected() {
        let t = TensorView::new(vec![0.0; 4], vec![4], 1.0, 1.0).unwrap();
        let mut s = recording();
        s.attached = false;
        let err = Renderer::default().render(&t, &Viewport::new(10, 10), &mut s).unwrap_err();
        assert_eq!(err, RenderError::Detached);
        assert_eq!(s.writes, 0);
    }

    #[test]
    fn test_surface_takes_element_size() {
        let t = TensorView::new(vec![0.0; 20], vec![10, 2], 0.1, 0.1).unwrap();
        let mut v = Viewport::new(50, 8);
        v.set_zoom(3);
        let mut fb = VarFrameBuf::new(1, 1, Gray8::BLACK);
        let summary = Renderer::default().render(&t, &v, &mut fb).unwrap();
        assert_eq!(summary.projection, Projection::Heatmap);
        assert_eq!((summary.width, summary.height), (150, 8));
        assert_eq!(fb.dimensions(), (150, 8));
        // columns outside the visible window keep the background
        assert_eq!(fb.pixel(149, 0), Some(Gray8::WHITE));
        assert_eq!(summary.columns, 50);
    }
}
