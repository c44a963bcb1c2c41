/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Color palettes for indexed pixel formats

use log::error;

use crate::errors::MarlinError;
use crate::pixel_format::PixelFormat;

/// A color table backing an indexed image.
///
/// Palette entries are constrained to byte aligned formats, currently
/// [`PixelFormat::Bpp24Rgb`] and [`PixelFormat::Bpp32Rgba`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Palette {
    pixel_format: PixelFormat,
    data:         Vec<u8>,
    color_count:  usize
}

impl Palette {
    /// Create a palette from a contiguous color table.
    ///
    /// `data` must hold exactly `color_count` entries in `pixel_format`.
    pub fn new(
        pixel_format: PixelFormat, data: Vec<u8>, color_count: usize
    ) -> Result<Palette, MarlinError> {
        let entry_size = match pixel_format {
            PixelFormat::Bpp24Rgb => 3,
            PixelFormat::Bpp32Rgba => 4,
            _ => return Err(MarlinError::UnsupportedPixelFormat(pixel_format))
        };
        if color_count == 0 || data.len() != entry_size * color_count {
            return Err(MarlinError::InvalidArgument(
                "palette data does not match its color count"
            ));
        }
        Ok(Palette {
            pixel_format,
            data,
            color_count
        })
    }

    pub const fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub const fn color_count(&self) -> usize {
        self.color_count
    }

    /// The raw color table.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Look up an entry and expand it to an RGBA quadruple.
    ///
    /// Entries without an alpha component expand with an opaque alpha.
    /// Out of range indices indicate corrupt pixel data and fail with
    /// [`MarlinError::BrokenImage`].
    pub fn rgba32(&self, index: usize) -> Result<[u8; 4], MarlinError> {
        if index >= self.color_count {
            error!(
                "Palette index {index} is out of range [0; {})",
                self.color_count
            );
            return Err(MarlinError::BrokenImage(format!(
                "palette index {index} out of range"
            )));
        }

        match self.pixel_format {
            PixelFormat::Bpp24Rgb => {
                let entry = &self.data[index * 3..index * 3 + 3];
                Ok([entry[0], entry[1], entry[2], 255])
            }
            PixelFormat::Bpp32Rgba => {
                let entry = &self.data[index * 4..index * 4 + 4];
                Ok([entry[0], entry[1], entry[2], entry[3]])
            }
            // new() rejects everything else
            _ => unreachable!()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_palette_lookup_gets_opaque_alpha() {
        let palette =
            Palette::new(PixelFormat::Bpp24Rgb, vec![1, 2, 3, 4, 5, 6], 2).unwrap();

        assert_eq!(palette.rgba32(0).unwrap(), [1, 2, 3, 255]);
        assert_eq!(palette.rgba32(1).unwrap(), [4, 5, 6, 255]);
    }

    #[test]
    fn out_of_range_index_is_broken_image() {
        let palette = Palette::new(PixelFormat::Bpp24Rgb, vec![0; 3], 1).unwrap();

        assert!(matches!(
            palette.rgba32(1),
            Err(MarlinError::BrokenImage(_))
        ));
    }

    #[test]
    fn indexed_entry_format_is_rejected() {
        assert!(Palette::new(PixelFormat::Bpp8Indexed, vec![0; 8], 8).is_err());
    }
}
