#![cfg(feature = "bmp")]
/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Windows Bitmap codec
//!
//! Loads uncompressed `BITMAPINFOHEADER` style files with 8, 24 or 32
//! bits per pixel and saves 24 and 32 bit images. Rows are stored
//! bottom-up and BGR ordered on disk; loading flips them to a top-left
//! origin and swaps the channels into the canonical RGB order, keeping
//! the 4-byte row padding of the file.

use log::trace;

use marlin_core::compression::{ChromaSubsampling, Compression};
use marlin_core::errors::MarlinError;
use marlin_core::io::{IoStream, SeekFrom};
use marlin_core::options::{LoadOptions, SaveOptions};
use marlin_core::palette::Palette;
use marlin_core::pixel_format::PixelFormat;

use crate::codec::{
    CodecLayout, CodecLoadState, CodecSaveState, CODEC_LAYOUT_VERSION
};
use crate::image::Image;
use crate::manifest::CodecManifest;
use crate::metadata::{Resolution, ResolutionUnit, SourceImage};

pub(crate) fn manifest() -> CodecManifest {
    CodecManifest {
        name:          "bmp".to_string(),
        version:       "1.1.0".to_string(),
        layout:        CODEC_LAYOUT_VERSION,
        priority:      0,
        description:   "Windows Bitmap".to_string(),
        extensions:    vec!["bmp".to_string(), "dib".to_string()],
        mime_types:    vec!["image/bmp".to_string(), "image/x-bmp".to_string()],
        magic_numbers: vec!["42 4d".to_string()]
    }
}

pub(crate) static LAYOUT: CodecLayout = CodecLayout {
    layout:    CODEC_LAYOUT_VERSION,
    load_init: Some(load_init),
    save_init: Some(save_init)
};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;

struct BmpHeader {
    width:          u32,
    height:         u32,
    top_down:       bool,
    bit_count:      u16,
    pixel_offset:   u32,
    stride:         u32,
    palette:        Option<Palette>,
    resolution:     Option<Resolution>
}

fn read_u16_le(io: &mut dyn IoStream) -> Result<u16, MarlinError> {
    let mut buf = [0_u8; 2];
    io.strict_read(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le(io: &mut dyn IoStream) -> Result<u32, MarlinError> {
    let mut buf = [0_u8; 4];
    io.strict_read(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn parse_header(io: &mut dyn IoStream) -> Result<BmpHeader, MarlinError> {
    let mut signature = [0_u8; 2];
    io.strict_read(&mut signature)?;

    if &signature != b"BM" {
        return Err(MarlinError::BrokenImage("not a BMP signature".into()));
    }

    let _file_size = read_u32_le(io)?;
    let _reserved = read_u32_le(io)?;
    let pixel_offset = read_u32_le(io)?;

    let info_size = read_u32_le(io)?;
    if info_size < INFO_HEADER_SIZE {
        return Err(MarlinError::BrokenImage(
            "info header is older than BITMAPINFOHEADER".into()
        ));
    }

    let raw_width = read_u32_le(io)? as i32;
    let raw_height = read_u32_le(io)? as i32;
    let _planes = read_u16_le(io)?;
    let bit_count = read_u16_le(io)?;
    let compression = read_u32_le(io)?;
    let _image_size = read_u32_le(io)?;
    let x_ppm = read_u32_le(io)? as i32;
    let y_ppm = read_u32_le(io)? as i32;
    let colors_used = read_u32_le(io)?;
    let _colors_important = read_u32_le(io)?;

    if compression != 0 {
        // BI_RLE4/BI_RLE8 and friends
        return Err(MarlinError::UnsupportedCompression(Compression::Rle));
    }
    if raw_width <= 0 || raw_height == 0 {
        return Err(MarlinError::IncorrectImageDimensions);
    }

    let width = raw_width as u32;
    let (height, top_down) = if raw_height < 0 {
        (raw_height.unsigned_abs(), true)
    } else {
        (raw_height as u32, false)
    };

    // skip headers newer than BITMAPINFOHEADER
    if info_size > INFO_HEADER_SIZE {
        io.seek(SeekFrom::Current(i64::from(info_size - INFO_HEADER_SIZE)))?;
    }

    let palette = match bit_count {
        8 => {
            let count = if colors_used == 0 { 256 } else { colors_used as usize };
            if count > 256 {
                return Err(MarlinError::BrokenImage("palette is too large".into()));
            }

            let mut raw = vec![0_u8; count * 4];
            io.strict_read(&mut raw)?;

            // BGRX entries on disk
            let mut rgb = Vec::with_capacity(count * 3);
            for entry in raw.chunks_exact(4) {
                rgb.extend_from_slice(&[entry[2], entry[1], entry[0]]);
            }
            Some(Palette::new(PixelFormat::Bpp24Rgb, rgb, count)?)
        }
        24 | 32 => None,
        _ => {
            return Err(MarlinError::UnsupportedPixelFormat(PixelFormat::Source));
        }
    };

    let resolution = (x_ppm > 0 && y_ppm > 0).then(|| Resolution {
        x:    f64::from(x_ppm) / 100.0,
        y:    f64::from(y_ppm) / 100.0,
        unit: ResolutionUnit::Centimeter
    });

    let stride = u32::try_from((u64::from(width) * u64::from(bit_count) + 31) / 32 * 4)
        .map_err(|_| MarlinError::IncorrectImageDimensions)?;

    Ok(BmpHeader {
        width,
        height,
        top_down,
        bit_count,
        pixel_offset,
        stride,
        palette,
        resolution
    })
}

struct BmpLoadState<'io> {
    io:       &'io mut dyn IoStream,
    options:  LoadOptions,
    header:   BmpHeader,
    consumed: bool
}

fn load_init<'io>(
    io: &'io mut dyn IoStream, options: &LoadOptions
) -> Result<Box<dyn CodecLoadState + 'io>, MarlinError> {
    let header = parse_header(io)?;

    if header.width > options.max_width() || header.height > options.max_height() {
        return Err(MarlinError::IncorrectImageDimensions);
    }

    trace!(
        "BMP: {}x{} at {} bpp",
        header.width,
        header.height,
        header.bit_count
    );

    Ok(Box::new(BmpLoadState {
        io,
        options: options.clone(),
        header,
        consumed: false
    }))
}

impl CodecLoadState for BmpLoadState<'_> {
    fn seek_next_frame(&mut self) -> Result<Image, MarlinError> {
        if self.consumed {
            return Err(MarlinError::NoMoreFrames);
        }
        self.consumed = true;

        let mut image = Image::new();
        image.width = self.header.width;
        image.height = self.header.height;
        image.bytes_per_line = self.header.stride;
        image.resolution = self.header.resolution;
        image.pixel_format = match self.header.bit_count {
            8 => PixelFormat::Bpp8Indexed,
            24 => PixelFormat::Bpp24Rgb,
            _ => PixelFormat::Bpp32Rgba
        };
        image.palette = self.header.palette.clone();

        if self.options.io_options().source_image {
            let mut source = SourceImage {
                pixel_format: match self.header.bit_count {
                    8 => PixelFormat::Bpp8Indexed,
                    24 => PixelFormat::Bpp24Bgr,
                    _ => PixelFormat::Bpp32Bgra
                },
                chroma_subsampling: ChromaSubsampling::Unknown,
                compression: Compression::None,
                ..SourceImage::default()
            };
            source.properties.flipped_vertically = !self.header.top_down;
            image.source_image = Some(source);
        }

        Ok(image)
    }

    fn load_frame(&mut self, image: &mut Image) -> Result<(), MarlinError> {
        self.io
            .seek(SeekFrom::Start(u64::from(self.header.pixel_offset)))?;

        let stride = self.header.stride as usize;
        let height = self.header.height as usize;

        // rows land in file order first
        self.io.strict_read(&mut image.pixels[..stride * height])?;

        if !self.header.top_down {
            image.mirror_vertically()?;
        }

        // BGR(A) on disk, canonical order in memory
        match self.header.bit_count {
            24 => {
                for row in image.pixels.chunks_exact_mut(stride) {
                    for pixel in row[..self.header.width as usize * 3].chunks_exact_mut(3) {
                        pixel.swap(0, 2);
                    }
                }
            }
            32 => {
                for row in image.pixels.chunks_exact_mut(stride) {
                    for pixel in row[..self.header.width as usize * 4].chunks_exact_mut(4) {
                        pixel.swap(0, 2);
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }
}

struct BmpSaveState<'io> {
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

    Ok(Box::new(BmpSaveState { io, frames: 0 }))
}

impl CodecSaveState for BmpSaveState<'_> {
    fn seek_next_frame(&mut self, image: &Image) -> Result<(), MarlinError> {
        if self.frames > 0 {
            return Err(MarlinError::InvalidArgument(
                "BMP stores a single image per file"
            ));
        }
        match image.pixel_format {
            PixelFormat::Bpp24Rgb | PixelFormat::Bpp32Rgba => Ok(()),
            other => Err(MarlinError::UnsupportedPixelFormat(other))
        }
    }

    fn save_frame(&mut self, image: &Image) -> Result<(), MarlinError> {
        self.frames += 1;

        let bytes_per_pixel: u32 = match image.pixel_format {
            PixelFormat::Bpp24Rgb => 3,
            _ => 4
        };
        let stride = (image.width * bytes_per_pixel * 8 + 31) / 32 * 4;
        let pixel_bytes = stride * image.height;
        let file_size = FILE_HEADER_SIZE + INFO_HEADER_SIZE + pixel_bytes;

        // file header
        self.io.strict_write(b"BM")?;
        self.io.strict_write(&file_size.to_le_bytes())?;
        self.io.strict_write(&0_u32.to_le_bytes())?;
        self.io
            .strict_write(&(FILE_HEADER_SIZE + INFO_HEADER_SIZE).to_le_bytes())?;

        // info header
        self.io.strict_write(&INFO_HEADER_SIZE.to_le_bytes())?;
        self.io.strict_write(&(image.width as i32).to_le_bytes())?;
        self.io.strict_write(&(image.height as i32).to_le_bytes())?;
        self.io.strict_write(&1_u16.to_le_bytes())?;
        self.io
            .strict_write(&((bytes_per_pixel * 8) as u16).to_le_bytes())?;
        self.io.strict_write(&0_u32.to_le_bytes())?;
        self.io.strict_write(&pixel_bytes.to_le_bytes())?;

        let (x_ppm, y_ppm) = match image.resolution {
            Some(res) if res.unit == ResolutionUnit::Centimeter => {
                ((res.x * 100.0) as i32, (res.y * 100.0) as i32)
            }
            _ => (0, 0)
        };
        self.io.strict_write(&x_ppm.to_le_bytes())?;
        self.io.strict_write(&y_ppm.to_le_bytes())?;
        self.io.strict_write(&0_u32.to_le_bytes())?;
        self.io.strict_write(&0_u32.to_le_bytes())?;

        // pixels, bottom-up, channels swapped back to BGR(A)
        let src_stride = image.bytes_per_line as usize;
        let row_pixels = image.width as usize;
        let mut row_out = vec![0_u8; stride as usize];

        for y in (0..image.height as usize).rev() {
            let row_in = &image.pixels[y * src_stride..y * src_stride + src_stride];

            row_out.fill(0);
            if bytes_per_pixel == 3 {
                for (dst, src) in row_out
                    .chunks_exact_mut(3)
                    .zip(row_in.chunks_exact(3))
                    .take(row_pixels)
                {
                    dst[0] = src[2];
                    dst[1] = src[1];
                    dst[2] = src[0];
                }
            } else {
                for (dst, src) in row_out
                    .chunks_exact_mut(4)
                    .zip(row_in.chunks_exact(4))
                    .take(row_pixels)
                {
                    dst[0] = src[2];
                    dst[1] = src[1];
                    dst[2] = src[0];
                    dst[3] = src[3];
                }
            }
            self.io.strict_write(&row_out)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), MarlinError> {
        self.io.flush()
    }
}
