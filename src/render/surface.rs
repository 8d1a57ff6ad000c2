/*
 *  render/surface.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Pixel surfaces and a runtime-sized framebuffer for embedded-graphics
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

use super::shade::Shade;

/// Where the renderers put pixels.
///
/// Coordinates are element pixels, origin top-left. Writes outside the
/// current size are dropped.
pub trait PixelSurface {
    type Color: Shade;

    fn resize(&mut self, width: u32, height: u32);
    fn dimensions(&self) -> (u32, u32);
    fn clear(&mut self, color: Self::Color);
    fn set_pixel(&mut self, x: u32, y: u32, color: Self::Color);

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Self::Color) {
        for py in y..y.saturating_add(height) {
            for px in x..x.saturating_add(width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// One row of pixels starting at (x, y).
    fn blit_row(&mut self, x: u32, y: u32, pixels: &[Self::Color]) {
        for (i, &color) in pixels.iter().enumerate() {
            self.set_pixel(x.saturating_add(i as u32), y, color);
        }
    }

    /// False once the host has torn the surface down.
    fn is_attached(&self) -> bool { true }
}

/// A runtime-sized framebuffer for embedded-graphics.
#[derive(Debug, Clone)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
    fill: C,
}

impl<C: PixelColor> VarFrameBuf<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h, fill }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    pub fn as_slice(&self) -> &[C] { &self.buf }

    pub fn pixel(&self, x: u32, y: u32) -> Option<C> {
        self.idx(Point::new(x as i32, y as i32)).map(|i| self.buf[i])
    }

    /// Contents are discarded; the new area is filled with the initial color.
    pub fn reshape(&mut self, width: u32, height: u32) {
        let (w, h) = (width as usize, height as usize);
        if (w, h) == (self.w, self.h) {
            return;
        }
        self.w = w;
        self.h = h;
        self.buf.clear();
        self.buf.resize(w * h, self.fill);
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut it = colors.into_iter();
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let Some(c) = it.next() else { return Ok(()) };
                if let Some(i) = self.idx(area.top_left + Point::new(col, row)) {
                    self.buf[i] = c;
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        let Some(bottom_right) = clipped.bottom_right() else { return Ok(()) };
        let (x0, x1) = (clipped.top_left.x as usize, bottom_right.x as usize);
        for y in clipped.top_left.y as usize..=bottom_right.y as usize {
            let base = y * self.w;
            self.buf[base + x0..=base + x1].fill(color);
        }
        Ok(())
    }
}

impl<C: Shade> PixelSurface for VarFrameBuf<C> {
    type Color = C;

    fn resize(&mut self, width: u32, height: u32) {
        self.reshape(width, height);
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.w as u32, self.h as u32)
    }

    fn clear(&mut self, color: C) {
        self.buf.fill(color);
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: C) {
        if let Some(i) = self.idx(Point::new(x as i32, y as i32)) {
            self.buf[i] = color;
        }
    }

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: C) {
        let rect = Rectangle::new(Point::new(x as i32, y as i32), Size::new(width, height));
        // drawing into a framebuffer cannot fail
        let Ok(()) = rect.into_styled(PrimitiveStyle::with_fill(color)).draw(self);
    }

    fn blit_row(&mut self, x: u32, y: u32, pixels: &[C]) {
        let area = Rectangle::new(Point::new(x as i32, y as i32), Size::new(pixels.len() as u32, 1));
        let Ok(()) = self.fill_contiguous(&area, pixels.iter().copied());
    }
}
