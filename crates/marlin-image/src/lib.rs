/*
 * Copyright (c) 2024.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A pluggable image codec host
//!
//! This crate discovers image codecs, indexes them by extension, MIME
//! type and magic number, and drives them through a small versioned ABI
//! to load and save frames, including animated sequences.
//!
//! ## Features
//! Built-in codecs can be included or excluded at will.
//!
//!| Feature  | Load | Save |
//!|----------|------|------|
//!| bmp      | yes  | yes  |
//!| gif      | yes  | -    |
//!| ppm      | yes  | yes  |
//!
//! External codecs join the registry through manifest files discovered
//! in the directories described by [`context::init_with_flags`].
//!
//! # High level api
//! Load images using image `open`
//!
//!```no_run
//! use marlin_core::errors::MarlinError;
//! use marlin_image::image::Image;
//!
//! let image = Image::open("file.gif")?;
//!
//!# Ok::<(),MarlinError>(())
//! ```
//! Or if the image is in memory load it via
//! [`Image::read`](crate::image::Image::read)
//!
//!```no_run
//! use marlin_core::errors::MarlinError;
//! use marlin_core::options::LoadOptions;
//! use marlin_image::image::Image;
//! let mem_src = [0;100];
//! let image = Image::read(&mem_src, &LoadOptions::default())?;
//! # Ok::<(),MarlinError>(())
//! ```
//! Save files via [`Image::save`](crate::image::Image::save), which
//! uses the file extension to pick a codec, or
//! [`Image::write_to_vec`](crate::image::Image::write_to_vec) to encode
//! into memory.
//!
//! Animated files produce one image per frame, see
//! [`Image::open_all_frames`](crate::image::Image::open_all_frames);
//! frame delays are carried on each frame and the compositing of
//! partial frames onto the canvas already happened inside the codec.
//!
//! # Lower level api
//! One [`driver::LoadDriver`] or [`driver::SaveDriver`] runs one
//! operation over one [I/O stream](marlin_core::io::IoStream), stepping
//! the codec through its entry points and guaranteeing cleanup on every
//! path. [`registry`] exposes codec lookup, [`context`] the per-thread
//! lifecycle.

pub mod codec;
pub mod codecs;
pub mod compositor;
pub mod context;
pub mod driver;
pub mod image;
pub mod manifest;
pub mod metadata;
pub mod registry;

pub use marlin_core::errors::MarlinError;
