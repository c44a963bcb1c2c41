/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Built-in codecs and the one-call load/save entry points
//!
//! The codecs compiled into the host are listed here; each can be
//! switched off through its cargo feature. External codecs join the
//! registry through manifest discovery instead, see the
//! [`context`](crate::context) module.
//!
//! This module also carries the convenience operations most callers
//! want: open a file, probe a file, save an image, without driving the
//! codec state machine by hand.

use std::path::Path;
use std::rc::Rc;

use marlin_core::errors::MarlinError;
use marlin_core::io::{FileReader, FileWriter, IoStream, MemoryGrowWriter, MemoryReader};
use marlin_core::options::{LoadOptions, SaveOptions};

use crate::codec::CodecLayout;
use crate::driver::{LoadDriver, SaveDriver};
use crate::image::Image;
use crate::registry::{self, CodecDescriptor};

pub mod bmp;
pub mod gif;
pub mod ppm;

/// Entry point tables of the compiled-in codecs, by codec name.
pub(crate) fn builtin_layout(name: &str) -> Option<&'static CodecLayout> {
    match name {
        #[cfg(feature = "bmp")]
        "bmp" => Some(&bmp::LAYOUT),
        #[cfg(feature = "gif")]
        "gif" => Some(&gif::LAYOUT),
        #[cfg(feature = "ppm")]
        "ppm" => Some(&ppm::LAYOUT),
        _ => None
    }
}

/// Descriptors of the compiled-in codecs, in registration order.
pub(crate) fn builtin_descriptors() -> Vec<CodecDescriptor> {
    let mut descriptors = Vec::new();

    #[cfg(feature = "bmp")]
    descriptors.push(CodecDescriptor::new(bmp::manifest(), None));
    #[cfg(feature = "gif")]
    descriptors.push(CodecDescriptor::new(gif::manifest(), None));
    #[cfg(feature = "ppm")]
    descriptors.push(CodecDescriptor::new(ppm::manifest(), None));

    descriptors
}

/// Read the first frame's header from a file without decoding pixels.
///
/// The codec is picked by magic number, falling back to the file
/// extension. Returns the skeleton image and the codec that produced
/// it, so a caller can inspect what a load would yield.
pub fn probe_file<P: AsRef<Path>>(
    path: P
) -> Result<(Image, Rc<CodecDescriptor>), MarlinError> {
    let descriptor = registry::codec_by_path_with_magic(path.as_ref())?;
    let mut io = FileReader::open(path.as_ref())?;

    let driver = LoadDriver::start(&mut io, Rc::clone(&descriptor), &LoadOptions::default())?;
    Ok((driver.probe()?, descriptor))
}

/// Read the first frame's header from a memory buffer, picking the
/// codec by magic number.
pub fn probe_memory(data: &[u8]) -> Result<(Image, Rc<CodecDescriptor>), MarlinError> {
    let descriptor = registry::codec_by_magic_from_memory(data)?;
    let mut io = MemoryReader::new(data);

    let driver = LoadDriver::start(&mut io, Rc::clone(&descriptor), &LoadOptions::default())?;
    Ok((driver.probe()?, descriptor))
}

/// Load every frame the stream holds with an explicit codec choice.
pub fn load_all_frames(
    io: &mut dyn IoStream, descriptor: Rc<CodecDescriptor>, options: &LoadOptions
) -> Result<Vec<Image>, MarlinError> {
    let mut driver = LoadDriver::start(io, descriptor, options)?;
    let mut frames = Vec::new();

    while let Some(frame) = driver.next_frame()? {
        frames.push(frame);
    }
    Ok(frames)
}

fn load_single(
    io: &mut dyn IoStream, descriptor: Rc<CodecDescriptor>, options: &LoadOptions
) -> Result<Image, MarlinError> {
    let mut driver = LoadDriver::start(io, descriptor, options)?;

    let image = driver
        .next_frame()?
        .ok_or_else(|| MarlinError::BrokenImage("stream holds no frames".into()))?;

    driver.stop()?;
    Ok(image)
}

// one-call loading and saving
impl Image {
    /// Load the first frame of a file.
    ///
    /// The codec is picked by the file extension, matching how the file
    /// would be saved; see [`probe_file`] when the extension cannot be
    /// trusted.
    ///
    /// # Example
    /// ```no_run
    /// use marlin_image::image::Image;
    /// let image = Image::open("photo.bmp").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Image, MarlinError> {
        Self::open_with_options(path, &LoadOptions::default())
    }

    /// Load the first frame of a file with explicit load options.
    pub fn open_with_options<P: AsRef<Path>>(
        path: P, options: &LoadOptions
    ) -> Result<Image, MarlinError> {
        let descriptor = registry::codec_by_path(path.as_ref())?;
        let mut io = FileReader::open(path.as_ref())?;

        load_single(&mut io, descriptor, options)
    }

    /// Load every frame of a file, e.g. all frames of an animation.
    ///
    /// Still images yield a single frame with a delay of `-1`;
    /// animation frames carry their delay in milliseconds.
    pub fn open_all_frames<P: AsRef<Path>>(path: P) -> Result<Vec<Image>, MarlinError> {
        let descriptor = registry::codec_by_path(path.as_ref())?;
        let mut io = FileReader::open(path.as_ref())?;

        load_all_frames(&mut io, descriptor, &LoadOptions::default())
    }

    /// Load the first frame from a memory buffer, picking the codec by
    /// magic number.
    pub fn read(data: &[u8], options: &LoadOptions) -> Result<Image, MarlinError> {
        let descriptor = registry::codec_by_magic_from_memory(data)?;
        let mut io = MemoryReader::new(data);

        load_single(&mut io, descriptor, options)
    }

    /// Load every frame from a memory buffer, picking the codec by
    /// magic number.
    pub fn read_all_frames(data: &[u8]) -> Result<Vec<Image>, MarlinError> {
        let descriptor = registry::codec_by_magic_from_memory(data)?;
        let mut io = MemoryReader::new(data);

        load_all_frames(&mut io, descriptor, &LoadOptions::default())
    }

    /// Save the image to a file, picking the codec by the file
    /// extension.
    ///
    /// # Example
    /// ```no_run
    /// use marlin_image::image::Image;
    /// let image = Image::open("photo.bmp").unwrap();
    /// image.save("copy.ppm").unwrap();
    /// ```
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MarlinError> {
        self.save_with_options(path, &SaveOptions::default())
    }

    /// Save the image to a file with explicit save options.
    pub fn save_with_options<P: AsRef<Path>>(
        &self, path: P, options: &SaveOptions
    ) -> Result<(), MarlinError> {
        let descriptor = registry::codec_by_path(path.as_ref())?;
        let mut io = FileWriter::create(path.as_ref())?;

        {
            let mut driver = SaveDriver::start(&mut io, descriptor, options)?;
            driver.write_frame(self)?;
            driver.stop()?;
        }
        io.close()
    }

    /// Encode the image into a byte vector using the codec registered
    /// for `extension`.
    pub fn write_to_vec(&self, extension: &str) -> Result<Vec<u8>, MarlinError> {
        let descriptor = registry::codec_by_extension(extension)?;
        let mut sink = Vec::new();

        {
            let mut io = MemoryGrowWriter::new(&mut sink);
            let mut driver = SaveDriver::start(&mut io, descriptor, &SaveOptions::default())?;

            driver.write_frame(self)?;
            driver.stop()?;
        }
        Ok(sink)
    }
}
