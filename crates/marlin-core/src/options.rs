/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Load and save options handed to codecs
//!
//! Options are snapshotted by the codec at `init` time, changing them
//! afterwards has no effect on a running operation.

use std::collections::BTreeMap;

use crate::compression::Compression;

/// Switches for the optional data a codec fetches or stores.
///
/// Fetching metadata, ICC profiles and source descriptors costs time and
/// memory, so each is opt-in per operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IoOptions {
    /// Fetch or store textual metadata entries
    pub meta_data:    bool,
    /// Fetch or store the ICC profile
    pub iccp:         bool,
    /// Fill the source image descriptor during loading
    pub source_image: bool
}

impl Default for IoOptions {
    fn default() -> Self {
        IoOptions {
            meta_data:    true,
            iccp:         true,
            source_image: false
        }
    }
}

/// Options consulted by codecs while loading.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    io_options: IoOptions,
    max_width:  u32,
    max_height: u32,
    tuning:     BTreeMap<String, String>
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            io_options: IoOptions::default(),
            max_width:  1 << 14,
            max_height: 1 << 14,
            tuning:     BTreeMap::new()
        }
    }
}

impl LoadOptions {
    pub fn new() -> LoadOptions {
        LoadOptions::default()
    }

    pub const fn io_options(&self) -> IoOptions {
        self.io_options
    }

    pub fn set_io_options(mut self, io_options: IoOptions) -> Self {
        self.io_options = io_options;
        self
    }

    /// Widest image a codec will agree to decode.
    ///
    /// Dimensions beyond the limits fail early with
    /// `MarlinError::IncorrectImageDimensions` instead of attempting a
    /// huge allocation.
    pub const fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn set_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    /// Tallest image a codec will agree to decode.
    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn set_max_height(mut self, height: u32) -> Self {
        self.max_height = height;
        self
    }

    /// Free-form codec specific knobs, e.g. `("gif.strict", "1")`.
    ///
    /// Codecs ignore keys they do not understand.
    pub const fn tuning(&self) -> &BTreeMap<String, String> {
        &self.tuning
    }

    pub fn set_tuning<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tuning.insert(key.into(), value.into());
        self
    }
}

/// Options consulted by codecs while saving.
#[derive(Clone, Debug)]
pub struct SaveOptions {
    io_options:        IoOptions,
    compression:       Compression,
    compression_level: f32,
    tuning:            BTreeMap<String, String>
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            io_options:        IoOptions::default(),
            compression:       Compression::Unknown,
            compression_level: 0.0,
            tuning:            BTreeMap::new()
        }
    }
}

impl SaveOptions {
    pub fn new() -> SaveOptions {
        SaveOptions::default()
    }

    pub const fn io_options(&self) -> IoOptions {
        self.io_options
    }

    pub fn set_io_options(mut self, io_options: IoOptions) -> Self {
        self.io_options = io_options;
        self
    }

    /// The requested compression.
    ///
    /// [`Compression::Unknown`] asks the codec for its default. Codecs
    /// reject kinds they cannot produce with
    /// `MarlinError::UnsupportedCompression`.
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    pub fn set_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Codec specific compression level, clamped by the codec.
    pub const fn compression_level(&self) -> f32 {
        self.compression_level
    }

    pub fn set_compression_level(mut self, level: f32) -> Self {
        self.compression_level = level;
        self
    }

    pub const fn tuning(&self) -> &BTreeMap<String, String> {
        &self.tuning
    }

    pub fn set_tuning<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tuning.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_chain() {
        let options = LoadOptions::new()
            .set_io_options(IoOptions {
                meta_data:    false,
                iccp:         false,
                source_image: true
            })
            .set_tuning("gif.strict", "1");

        assert!(!options.io_options().meta_data);
        assert!(options.io_options().source_image);
        assert_eq!(
            options.tuning().get("gif.strict").map(String::as_str),
            Some("1")
        );
    }
}
