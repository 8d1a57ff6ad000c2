/*
 *  render/shade.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Intensity to pixel color mapping per color depth
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

use embedded_graphics::pixelcolor::{BinaryColor, Gray4, Gray8, GrayColor, PixelColor};

/// A grayscale pixel color that can be built from a normalised intensity.
///
/// Intensity 0.0 is black and 1.0 is white. Out of range values clamp and
/// NaN maps to black.
pub trait Shade: PixelColor {
    fn from_intensity(intensity: f32) -> Self;

    /// Luminance expanded to 0-255
    fn luma8(self) -> u8;
}

#[inline]
fn normalise(intensity: f32) -> f32 {
    if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) }
}

impl Shade for BinaryColor {
    fn from_intensity(intensity: f32) -> Self {
        // threshold at 50%
        if normalise(intensity) >= 0.5 { BinaryColor::On } else { BinaryColor::Off }
    }

    fn luma8(self) -> u8 {
        if self.is_on() { 255 } else { 0 }
    }
}

impl Shade for Gray4 {
    fn from_intensity(intensity: f32) -> Self {
        Gray4::new((normalise(intensity) * 15.0).round() as u8)
    }

    fn luma8(self) -> u8 {
        self.luma() * 17
    }
}

impl Shade for Gray8 {
    fn from_intensity(intensity: f32) -> Self {
        Gray8::new((normalise(intensity) * 255.0).round() as u8)
    }

    fn luma8(self) -> u8 {
        self.luma()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_threshold() {
        assert_eq!(BinaryColor::from_intensity(0.25), BinaryColor::Off);
        assert_eq!(BinaryColor::from_intensity(0.75), BinaryColor::On);
        assert_eq!(BinaryColor::On.luma8(), 255);
    }

    #[test]
    fn test_gray_levels() {
        assert_eq!(Gray8::from_intensity(0.5), Gray8::new(128));
        assert_eq!(Gray8::from_intensity(2.0), Gray8::new(255));
        assert_eq!(Gray8::from_intensity(-1.0), Gray8::new(0));
        assert_eq!(Gray8::from_intensity(f32::NAN), Gray8::new(0));
        assert_eq!(Gray4::from_intensity(1.0), Gray4::new(15));
        assert_eq!(Gray4::new(15).luma8(), 255);
        assert_eq!(Gray4::from_intensity(0.5).luma(), 8);
    }
}
