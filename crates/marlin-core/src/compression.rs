/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Compression kinds and source-image vocabulary
//!
//! These types describe the on-disk form of an image. They travel in the
//! source-image descriptor that codecs fill during loading and in the save
//! options that callers hand to encoders.

use crate::errors::MarlinError;

/// Compression applied to pixel data inside a file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Compression {
    /// Compression could not be determined
    Unknown,
    /// Pixels are stored verbatim
    None,
    /// Run length encoding
    Rle,
    /// Lempel-Ziv-Welch
    Lzw,
    /// DEFLATE/zlib streams
    Deflate,
    /// JPEG entropy coding
    Jpeg,
    /// VP8/VP8L streams
    Webp
}

impl Compression {
    /// The canonical identifier of this compression kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Compression::Unknown => "UNKNOWN",
            Compression::None => "NONE",
            Compression::Rle => "RLE",
            Compression::Lzw => "LZW",
            Compression::Deflate => "DEFLATE",
            Compression::Jpeg => "JPEG",
            Compression::Webp => "WEBP"
        }
    }

    /// Parse a canonical identifier back into a compression kind.
    pub fn from_str(value: &str) -> Result<Compression, MarlinError> {
        let c = match value {
            "UNKNOWN" => Compression::Unknown,
            "NONE" => Compression::None,
            "RLE" => Compression::Rle,
            "LZW" => Compression::Lzw,
            "DEFLATE" => Compression::Deflate,
            "JPEG" => Compression::Jpeg,
            "WEBP" => Compression::Webp,
            _ => return Err(MarlinError::InvalidArgument("unknown compression string"))
        };
        Ok(c)
    }
}

/// Chroma subsampling of the source image, when the source is YUV coded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ChromaSubsampling {
    Unknown,
    Css410,
    Css411,
    Css420,
    Css422,
    Css444
}

/// Properties of the on-disk image that are lost during decoding.
///
/// Kept as a group of booleans, each with a canonical string identifier.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceProperties {
    /// Rows are stored bottom-up in the file
    pub flipped_vertically: bool,
    /// Pixels are stored in multiple progressive passes
    pub interlaced:         bool
}

impl SourceProperties {
    /// Canonical identifiers of the properties that are set, in
    /// declaration order.
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.flipped_vertically {
            out.push("FLIPPED-VERTICALLY");
        }
        if self.interlaced {
            out.push("INTERLACED");
        }
        out
    }

    /// Set a property by its canonical identifier.
    pub fn set_from_str(&mut self, value: &str) -> Result<(), MarlinError> {
        match value {
            "FLIPPED-VERTICALLY" => self.flipped_vertically = true,
            "INTERLACED" => self.interlaced = true,
            _ => return Err(MarlinError::InvalidArgument("unknown image property string"))
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_strings_round_trip() {
        for c in [
            Compression::Unknown,
            Compression::None,
            Compression::Rle,
            Compression::Lzw,
            Compression::Deflate,
            Compression::Jpeg,
            Compression::Webp
        ] {
            assert_eq!(Compression::from_str(c.as_str()).unwrap(), c);
        }
    }

    #[test]
    fn properties_string_mapping() {
        let mut props = SourceProperties::default();
        props.set_from_str("FLIPPED-VERTICALLY").unwrap();
        assert!(props.flipped_vertically);
        assert_eq!(props.to_strings(), vec!["FLIPPED-VERTICALLY"]);
        assert!(props.set_from_str("SHINY").is_err());
    }
}
