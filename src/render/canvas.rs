/*
 *  render/canvas.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Owned canvas with enum dispatch over color depth
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

use embedded_graphics::pixelcolor::{BinaryColor, Gray4, Gray8, GrayColor};

use super::shade::Shade;
use super::surface::VarFrameBuf;
use super::{ColorDepth, RenderSummary, Renderer};
use crate::error::RenderError;
use crate::tensor::TensorView;
use crate::viewport::Viewport;

/// Framebuffer whose pixel type is picked at runtime from config.
#[derive(Debug, Clone)]
pub enum Canvas {
    Mono(VarFrameBuf<BinaryColor>),
    Gray4(VarFrameBuf<Gray4>),
    Gray8(VarFrameBuf<Gray8>),
}

impl Canvas {
    pub fn new(depth: ColorDepth, width: u32, height: u32) -> Self {
        match depth {
            ColorDepth::Mono => Canvas::Mono(VarFrameBuf::new(width, height, BinaryColor::On)),
            ColorDepth::Gray4 => Canvas::Gray4(VarFrameBuf::new(width, height, Gray4::WHITE)),
            ColorDepth::Gray8 => Canvas::Gray8(VarFrameBuf::new(width, height, Gray8::WHITE)),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Canvas::Mono(fb) => (fb.width() as u32, fb.height() as u32),
            Canvas::Gray4(fb) => (fb.width() as u32, fb.height() as u32),
            Canvas::Gray8(fb) => (fb.width() as u32, fb.height() as u32),
        }
    }

    pub fn render(
        &mut self,
        renderer: &Renderer,
        tensor: &TensorView,
        viewport: &Viewport,
    ) -> Result<RenderSummary, RenderError> {
        match self {
            Canvas::Mono(fb) => renderer.render(tensor, viewport, fb),
            Canvas::Gray4(fb) => renderer.render(tensor, viewport, fb),
            Canvas::Gray8(fb) => renderer.render(tensor, viewport, fb),
        }
    }

    /// Binary PGM (P5), 8 bits per pixel regardless of depth.
    pub fn to_pgm(&self) -> Vec<u8> {
        let (width, height) = self.dimensions();
        let mut out = format!("P5\n{width} {height}\n255\n").into_bytes();
        out.reserve((width * height) as usize);
        match self {
            Canvas::Mono(fb) => out.extend(fb.as_slice().iter().map(|&px| px.luma8())),
            Canvas::Gray4(fb) => out.extend(fb.as_slice().iter().map(|&px| px.luma8())),
            Canvas::Gray8(fb) => out.extend(fb.as_slice().iter().map(|&px| px.luma8())),
        }
        out
    }
}
