#![cfg(feature = "ppm")]
/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Portable anymap codec
//!
//! Loads and saves the binary netpbm variants: `P5` grayscale and `P6`
//! RGB, with a maximum sample value of 255. Header comments are
//! understood and skipped.

use log::trace;

use marlin_core::compression::Compression;
use marlin_core::errors::MarlinError;
use marlin_core::io::IoStream;
use marlin_core::options::{LoadOptions, SaveOptions};
use marlin_core::pixel_format::PixelFormat;

use crate::codec::{
    CodecLayout, CodecLoadState, CodecSaveState, CODEC_LAYOUT_VERSION
};
use crate::image::Image;
use crate::manifest::CodecManifest;
use crate::metadata::SourceImage;

pub(crate) fn manifest() -> CodecManifest {
    CodecManifest {
        name:          "ppm".to_string(),
        version:       "1.0.2".to_string(),
        layout:        CODEC_LAYOUT_VERSION,
        priority:      10,
        description:   "Portable Anymap".to_string(),
        extensions:    vec!["ppm".to_string(), "pgm".to_string(), "pnm".to_string()],
        mime_types:    vec![
            "image/x-portable-pixmap".to_string(),
            "image/x-portable-graymap".to_string(),
        ],
        magic_numbers: vec!["50 35".to_string(), "50 36".to_string()]
    }
}

pub(crate) static LAYOUT: CodecLayout = CodecLayout {
    layout:    CODEC_LAYOUT_VERSION,
    load_init: Some(load_init),
    save_init: Some(save_init)
};

struct PpmLoadState<'io> {
    io:       &'io mut dyn IoStream,
    width:    u32,
    height:   u32,
    gray:     bool,
    fill_source: bool,
    consumed: bool
}

/// Read one byte, `ReadIo` at end of stream.
fn read_byte(io: &mut dyn IoStream) -> Result<u8, MarlinError> {
    let mut buf = [0_u8];
    io.strict_read(&mut buf)?;
    Ok(buf[0])
}

/// Read the next whitespace separated header token, skipping `#`
/// comments.
fn read_token(io: &mut dyn IoStream) -> Result<String, MarlinError> {
    let mut token = String::new();

    loop {
        let byte = read_byte(io)?;

        if byte == b'#' {
            // comment runs to the end of the line
            while read_byte(io)? != b'\n' {}
            continue;
        }
        if byte.is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            return Ok(token);
        }
        token.push(byte as char);
    }
}

fn read_number(io: &mut dyn IoStream) -> Result<u32, MarlinError> {
    let token = read_token(io)?;

    token
        .parse()
        .map_err(|_| MarlinError::BrokenImage(format!("bad header number '{token}'")))
}

fn load_init<'io>(
    io: &'io mut dyn IoStream, options: &LoadOptions
) -> Result<Box<dyn CodecLoadState + 'io>, MarlinError> {
    let magic = read_token(io)?;
    let gray = match magic.as_str() {
        "P5" => true,
        "P6" => false,
        _ => {
            return Err(MarlinError::BrokenImage(format!(
                "unsupported netpbm magic '{magic}'"
            )))
        }
    };

    let width = read_number(io)?;
    let height = read_number(io)?;
    let max_value = read_number(io)?;

    if width == 0 || height == 0 {
        return Err(MarlinError::IncorrectImageDimensions);
    }
    if width > options.max_width() || height > options.max_height() {
        return Err(MarlinError::IncorrectImageDimensions);
    }
    if max_value == 0 || max_value > 255 {
        return Err(MarlinError::BrokenImage(format!(
            "unsupported sample range {max_value}"
        )));
    }

    trace!("PPM: {width}x{height}, gray={gray}");

    Ok(Box::new(PpmLoadState {
        io,
        width,
        height,
        gray,
        fill_source: options.io_options().source_image,
        consumed: false
    }))
}

impl CodecLoadState for PpmLoadState<'_> {
    fn seek_next_frame(&mut self) -> Result<Image, MarlinError> {
        if self.consumed {
            return Err(MarlinError::NoMoreFrames);
        }
        self.consumed = true;

        let mut image = Image::new();
        image.width = self.width;
        image.height = self.height;
        image.pixel_format = if self.gray {
            PixelFormat::Bpp8Gray
        } else {
            PixelFormat::Bpp24Rgb
        };
        image.bytes_per_line = self.width * if self.gray { 1 } else { 3 };

        if self.fill_source {
            image.source_image = Some(SourceImage {
                pixel_format: image.pixel_format,
                compression: Compression::None,
                ..SourceImage::default()
            });
        }

        Ok(image)
    }

    fn load_frame(&mut self, image: &mut Image) -> Result<(), MarlinError> {
        self.io.strict_read(&mut image.pixels)
    }

    fn finish(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }
}

struct PpmSaveState<'io> {
    io:     &'io mut dyn IoStream,
    frames: usize
}

fn save_init<'io>(
    io: &'io mut dyn IoStream, options: &SaveOptions
) -> Result<Box<dyn CodecSaveState + 'io>, MarlinError> {
    match options.compression() {
        Compression::Unknown | Compression::None => {}
        other => return Err(MarlinError::UnsupportedCompression(other))
    }

    Ok(Box::new(PpmSaveState { io, frames: 0 }))
}

impl CodecSaveState for PpmSaveState<'_> {
    fn seek_next_frame(&mut self, image: &Image) -> Result<(), MarlinError> {
        if self.frames > 0 {
            return Err(MarlinError::InvalidArgument(
                "netpbm stores a single image per file"
            ));
        }
        match image.pixel_format {
            PixelFormat::Bpp8Gray | PixelFormat::Bpp24Rgb => Ok(()),
            other => Err(MarlinError::UnsupportedPixelFormat(other))
        }
    }

    fn save_frame(&mut self, image: &Image) -> Result<(), MarlinError> {
        self.frames += 1;

        let gray = image.pixel_format == PixelFormat::Bpp8Gray;
        let magic: &[u8] = if gray { b"P5" } else { b"P6" };

        self.io.strict_write(magic)?;
        self.io
            .strict_write(format!("\n{} {}\n255\n", image.width, image.height).as_bytes())?;

        let row_bytes = image.width as usize * if gray { 1 } else { 3 };
        let stride = image.bytes_per_line as usize;

        for row in image.pixels.chunks_exact(stride) {
            self.io.strict_write(&row[..row_bytes])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MarlinError> {
        self.io.flush()
    }
}
