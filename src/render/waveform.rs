/*
 *  render/waveform.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Rank-1 projection: centred amplitude bars
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

use super::shade::Shade;
use super::surface::PixelSurface;
use crate::tensor::TensorView;
use crate::viewport::Viewport;

/// Draw the visible window of a rank-1 tensor. Returns columns drawn.
///
/// Sample `len * pan + i * stride` lands at container column `i`, where
/// stride is samples per element pixel. Columns advance by at least one
/// pixel, wider when there are fewer samples than pixels. Bar height and
/// darkness both follow the absolute sample value.
pub(crate) fn draw<S: PixelSurface>(
    tensor: &TensorView,
    viewport: &Viewport,
    surface: &mut S,
    base_opacity: f32,
) -> u32 {
    let samples = tensor.as_slice();
    let len = samples.len();
    let element_width = viewport.element_width() as f64;
    if len == 0 || element_width == 0.0 {
        return 0;
    }

    let stride = len as f64 / element_width;
    let increment = (1.0 / stride).max(1.0);
    let bar_width = increment.ceil() as u32;
    let height = viewport.container_height() as f64;
    let container_width = viewport.container_width() as f64;
    let first = len as f64 * viewport.pan_offset();
    let origin = viewport.scroll_left();

    let mut columns = 0;
    let mut i = 0.0;
    while i < container_width {
        let index = (first + i * stride).round() as usize;
        if index >= len {
            break;
        }
        let magnitude = samples[index].abs();
        if magnitude.is_finite() {
            let size = (magnitude as f64 * height).min(height);
            let bar_height = size.round() as u32;
            if bar_height > 0 {
                let opacity = (base_opacity + magnitude).min(1.0);
                let x = (origin + i).floor() as u32;
                let y = ((height - size) / 2.0).floor() as u32;
                surface.fill_rect(x, y, bar_width, bar_height, S::Color::from_intensity(1.0 - opacity));
            }
        }
        columns += 1;
        i += increment;
    }
    columns
}
