/*
 *  render/heatmap.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Rank-2 projection: time by feature grayscale map
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
use crate::error::TensorError;
use crate::tensor::TensorView;
use crate::viewport::Viewport;

/// Paint the visible columns of a (time, feature) tensor. Returns columns drawn.
///
/// Feature index 0 is the bottom row. Values are divided by the blob's
/// `max_value` and clamped, so anything at or above max is white.
pub(crate) fn draw<S: PixelSurface>(
    tensor: &TensorView,
    viewport: &Viewport,
    surface: &mut S,
) -> Result<u32, TensorError> {
    let dims = tensor.dimensions();
    let (frames, bins) = (dims[0], dims[1]);
    let element_width = viewport.element_width();
    let height = viewport.container_height();
    if frames == 0 || bins == 0 || element_width == 0 || height == 0 {
        return Ok(0);
    }

    let x0 = (viewport.scroll_left().max(0.0).floor() as u32).min(element_width);
    let x1 = x0.saturating_add(viewport.container_width()).min(element_width);
    let time_ratio = frames as f64 / element_width as f64;
    let feature_ratio = bins as f64 / height as f64;
    let max = tensor.metadata().max_value;
    let scale = if max.is_finite() && max > 0.0 { 1.0 / max } else { 1.0 };

    let mut row: Vec<S::Color> = Vec::with_capacity((x1 - x0) as usize);
    for y in 0..height {
        let band = ((y as f64 * feature_ratio).floor() as usize).min(bins - 1);
        let feature_index = bins - 1 - band;
        row.clear();
        for x in x0..x1 {
            let time_index = ((x as f64 * time_ratio).floor() as usize).min(frames - 1);
            let value = tensor.item(&[time_index, feature_index])? * scale;
            row.push(S::Color::from_intensity(value));
        }
        surface.blit_row(x0, y, &row);
    }
    Ok(x1 - x0)
}
