/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The codec ABI
//!
//! Every codec binds to the host through a [`CodecLayout`]: a small table
//! of entry points pinned to one layout version per release. The two init
//! entry points return opaque per-operation state objects; the remaining
//! operations live on those states.
//!
//! The host guarantees codecs the following:
//!
//! - the stream passed to an init entry point is the stream the state
//!   sees until `finish`, and nobody else touches it in between;
//! - one state never serves two images at once;
//! - the image passed to `load_frame` is the one the state returned from
//!   `seek_next_frame`, with a zeroed pixel buffer of the advertised
//!   geometry.
//!
//! A codec in turn must not close the stream; its lifetime belongs to the
//! caller.

use marlin_core::errors::MarlinError;
use marlin_core::io::IoStream;
use marlin_core::options::{LoadOptions, SaveOptions};

use crate::image::Image;

/// The codec layout version this host binds to.
///
/// A codec built against any other layout is rejected during binding
/// with [`MarlinError::UnsupportedCodecLayout`].
pub const CODEC_LAYOUT_VERSION: u32 = 8;

/// Per-operation state of a running load.
///
/// Created by [`CodecLayout::load_init`], driven by the load driver and
/// finished exactly once.
pub trait CodecLoadState {
    /// Seek to the next frame and describe it.
    ///
    /// Returns an image *skeleton*: geometry, a pixel format as close to
    /// the source as the canonical set allows, metadata and the ICC
    /// profile (first frame only) when the load options ask for them,
    /// and the source descriptor. Pixels MUST NOT be allocated here.
    ///
    /// Fails with [`MarlinError::NoMoreFrames`] past the last frame.
    fn seek_next_frame(&mut self) -> Result<Image, MarlinError>;

    /// Decode the current frame into `image.pixels`.
    ///
    /// The buffer is pre-allocated and zeroed by the driver. Pixels are
    /// produced in scan-line order with the origin at the top left;
    /// interlaced sources are resolved internally before returning.
    fn load_frame(&mut self, image: &mut Image) -> Result<(), MarlinError>;

    /// Stop decoding and release codec resources.
    ///
    /// Must not close the I/O stream.
    fn finish(&mut self) -> Result<(), MarlinError>;
}

/// Per-operation state of a running save.
pub trait CodecSaveState {
    /// Write container headers or seek so the next frame can be written.
    fn seek_next_frame(&mut self, image: &Image) -> Result<(), MarlinError>;

    /// Encode `image` pixels and metadata into the stream.
    fn save_frame(&mut self, image: &Image) -> Result<(), MarlinError>;

    /// Finalize the container and release codec resources.
    ///
    /// Must not close the I/O stream.
    fn finish(&mut self) -> Result<(), MarlinError>;
}

/// Entry point allocating load state over a stream.
pub type LoadInitFn = for<'io> fn(
    &'io mut dyn IoStream,
    &LoadOptions
) -> Result<Box<dyn CodecLoadState + 'io>, MarlinError>;

/// Entry point allocating save state over a stream.
pub type SaveInitFn = for<'io> fn(
    &'io mut dyn IoStream,
    &SaveOptions
) -> Result<Box<dyn CodecSaveState + 'io>, MarlinError>;

/// The versioned entry point table a codec module exports.
///
/// Entry points a codec does not provide are `None`; binding an
/// operation to a missing entry point fails with
/// [`MarlinError::MissingEntryPoint`].
pub struct CodecLayout {
    /// Declared layout version, must equal [`CODEC_LAYOUT_VERSION`]
    pub layout:    u32,
    pub load_init: Option<LoadInitFn>,
    pub save_init: Option<SaveInitFn>
}
