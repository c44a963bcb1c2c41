/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image metadata records
//!
//! Metadata travels with an image from the codec that produced it to the
//! codec that stores it. Entries keep the order the codec emitted them in,
//! some formats are sensitive to it.

use marlin_core::compression::{ChromaSubsampling, Compression, SourceProperties};
use marlin_core::errors::MarlinError;
use marlin_core::pixel_format::PixelFormat;

/// One textual metadata entry, e.g. a comment or an author tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetaEntry {
    key:   String,
    value: String
}

impl MetaEntry {
    /// Create an entry. Both the key and the value must be non-empty.
    pub fn new<K: Into<String>, V: Into<String>>(
        key: K, value: V
    ) -> Result<MetaEntry, MarlinError> {
        let key = key.into();
        let value = value.into();

        if key.is_empty() || value.is_empty() {
            return Err(MarlinError::InvalidArgument(
                "metadata keys and values must be non-empty"
            ));
        }
        Ok(MetaEntry { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Physical resolution of an image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Resolution {
    pub x:    f64,
    pub y:    f64,
    pub unit: ResolutionUnit
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResolutionUnit {
    Unknown,
    Inch,
    Centimeter
}

/// Read-only description of the on-disk form of a loaded image.
///
/// Decoding normalizes pixels into one of the canonical formats; this
/// record preserves what the file actually held.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceImage {
    /// Pixel format the file stores, may be one decoding cannot emit
    pub pixel_format:       PixelFormat,
    /// Chroma subsampling for YUV coded sources
    pub chroma_subsampling: ChromaSubsampling,
    /// Compression applied to the pixel data
    pub compression:        Compression,
    /// Properties lost during decoding
    pub properties:         SourceProperties
}

impl Default for SourceImage {
    fn default() -> Self {
        SourceImage {
            pixel_format:       PixelFormat::Source,
            chroma_subsampling: ChromaSubsampling::Unknown,
            compression:        Compression::Unknown,
            properties:         SourceProperties::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_meta_strings_are_rejected() {
        assert!(MetaEntry::new("", "value").is_err());
        assert!(MetaEntry::new("Comment", "").is_err());
        assert!(MetaEntry::new("Comment", "hello").is_ok());
    }
}
