/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Canonical pixel formats understood by the host and the codecs
//!
//! A pixel format tags bit depth, channel order and palette semantics of a
//! pixel buffer. The string form returned by [`PixelFormat::as_str`] is the
//! canonical identifier used in manifests, logs and serialized metadata.

use crate::errors::MarlinError;

/// A closed enumeration of pixel formats.
///
/// Every variant except [`PixelFormat::Source`] has a well defined number
/// of bits per pixel. Indexed variants require a palette to be interpreted.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PixelFormat {
    /// Whatever pixel format the file holds, resolved by the codec
    #[default]
    Source,
    /// 1 bit per pixel, palette indexed
    Bpp1Indexed,
    /// 2 bits per pixel, palette indexed
    Bpp2Indexed,
    /// 4 bits per pixel, palette indexed
    Bpp4Indexed,
    /// 8 bits per pixel, palette indexed
    Bpp8Indexed,
    /// 8 bit grayscale
    Bpp8Gray,
    /// 16 bit grayscale
    Bpp16Gray,
    /// 8 bit interleaved RGB
    Bpp24Rgb,
    /// 8 bit interleaved BGR
    Bpp24Bgr,
    /// 8 bit interleaved RGB with alpha
    Bpp32Rgba,
    /// 8 bit interleaved BGR with alpha
    Bpp32Bgra,
    /// 8 bit interleaved YUV with alpha
    Bpp32Yuva
}

impl PixelFormat {
    /// Number of bits one pixel occupies.
    ///
    /// [`PixelFormat::Source`] has no defined width and returns 0.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Source => 0,
            PixelFormat::Bpp1Indexed => 1,
            PixelFormat::Bpp2Indexed => 2,
            PixelFormat::Bpp4Indexed => 4,
            PixelFormat::Bpp8Indexed | PixelFormat::Bpp8Gray => 8,
            PixelFormat::Bpp16Gray => 16,
            PixelFormat::Bpp24Rgb | PixelFormat::Bpp24Bgr => 24,
            PixelFormat::Bpp32Rgba | PixelFormat::Bpp32Bgra | PixelFormat::Bpp32Yuva => 32
        }
    }

    /// Return true if pixels in this format are palette indices.
    pub const fn is_indexed(self) -> bool {
        matches!(
            self,
            PixelFormat::Bpp1Indexed
                | PixelFormat::Bpp2Indexed
                | PixelFormat::Bpp4Indexed
                | PixelFormat::Bpp8Indexed
        )
    }

    /// The canonical identifier of this format.
    pub const fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Source => "SOURCE",
            PixelFormat::Bpp1Indexed => "BPP1_INDEXED",
            PixelFormat::Bpp2Indexed => "BPP2_INDEXED",
            PixelFormat::Bpp4Indexed => "BPP4_INDEXED",
            PixelFormat::Bpp8Indexed => "BPP8_INDEXED",
            PixelFormat::Bpp8Gray => "BPP8_GRAYSCALE",
            PixelFormat::Bpp16Gray => "BPP16_GRAYSCALE",
            PixelFormat::Bpp24Rgb => "BPP24_RGB",
            PixelFormat::Bpp24Bgr => "BPP24_BGR",
            PixelFormat::Bpp32Rgba => "BPP32_RGBA",
            PixelFormat::Bpp32Bgra => "BPP32_BGRA",
            PixelFormat::Bpp32Yuva => "BPP32_YUVA"
        }
    }

    /// Parse a canonical identifier back into a pixel format.
    pub fn from_str(value: &str) -> Result<PixelFormat, MarlinError> {
        let fmt = match value {
            "SOURCE" => PixelFormat::Source,
            "BPP1_INDEXED" => PixelFormat::Bpp1Indexed,
            "BPP2_INDEXED" => PixelFormat::Bpp2Indexed,
            "BPP4_INDEXED" => PixelFormat::Bpp4Indexed,
            "BPP8_INDEXED" => PixelFormat::Bpp8Indexed,
            "BPP8_GRAYSCALE" => PixelFormat::Bpp8Gray,
            "BPP16_GRAYSCALE" => PixelFormat::Bpp16Gray,
            "BPP24_RGB" => PixelFormat::Bpp24Rgb,
            "BPP24_BGR" => PixelFormat::Bpp24Bgr,
            "BPP32_RGBA" => PixelFormat::Bpp32Rgba,
            "BPP32_BGRA" => PixelFormat::Bpp32Bgra,
            "BPP32_YUVA" => PixelFormat::Bpp32Yuva,
            _ => return Err(MarlinError::InvalidArgument("unknown pixel format string"))
        };
        Ok(fmt)
    }

    /// All variants, in declaration order.
    pub const fn all() -> &'static [PixelFormat] {
        &[
            PixelFormat::Source,
            PixelFormat::Bpp1Indexed,
            PixelFormat::Bpp2Indexed,
            PixelFormat::Bpp4Indexed,
            PixelFormat::Bpp8Indexed,
            PixelFormat::Bpp8Gray,
            PixelFormat::Bpp16Gray,
            PixelFormat::Bpp24Rgb,
            PixelFormat::Bpp24Bgr,
            PixelFormat::Bpp32Rgba,
            PixelFormat::Bpp32Bgra,
            PixelFormat::Bpp32Yuva
        ]
    }
}

/// Minimum number of bytes one row of pixels occupies.
///
/// Computed as `ceil(width * bits_per_pixel / 8)`. Codecs are free to pad
/// rows beyond this, the image records the actual stride in
/// `bytes_per_line`.
pub fn min_bytes_per_line(width: u32, format: PixelFormat) -> Result<u32, MarlinError> {
    let bits = u64::from(width) * u64::from(format.bits_per_pixel());
    let bytes = (bits + 7) / 8;

    u32::try_from(bytes).map_err(|_| MarlinError::IncorrectImageDimensions)
}
