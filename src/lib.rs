/*
 *  lib.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Feature tensors, blob codec, shared resource cache and the scrollable
 *  waveform / heatmap view built on them
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

pub mod api;
pub mod audio;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod render;
pub mod session;
pub mod tensor;
pub mod viewport;
pub mod visibility;

pub use cache::{Feature, FeatureSlice, ResourceCache, ResourceKey};
pub use error::{DecodeError, FetchError, RenderError, TensorError};
pub use render::{Canvas, ColorDepth, PixelSurface, Renderer};
pub use session::{FeatureView, PlaybackRequest, SliceRequest, ViewState};
pub use tensor::{FeatureMetadata, TensorView};
pub use viewport::Viewport;
