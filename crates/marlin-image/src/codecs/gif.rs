#![cfg(feature = "gif")]
/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Graphics Interchange Format codec
//!
//! The representative animation codec: every frame is an LZW compressed,
//! palette indexed fragment placed somewhere on the logical screen. The
//! whole stream is demuxed up front, then frames are decoded one by one
//! and composited onto the persistent canvas, so every output image is a
//! full `BPP32_RGBA` canvas frame.
//!
//! Saving GIF files is not implemented.

use log::{trace, warn};

use marlin_core::compression::Compression;
use marlin_core::errors::MarlinError;
use marlin_core::io::IoStream;
use marlin_core::options::{LoadOptions, SaveOptions};
use marlin_core::pixel_format::PixelFormat;

use crate::codec::{
    CodecLayout, CodecLoadState, CodecSaveState, CODEC_LAYOUT_VERSION
};
use crate::compositor::{
    BlendMethod, DisposeMethod, FrameCompositor, FrameRect, FALLBACK_DELAY_MS
};
use crate::image::Image;
use crate::manifest::CodecManifest;
use crate::metadata::{MetaEntry, SourceImage};

pub(crate) fn manifest() -> CodecManifest {
    CodecManifest {
        name:          "gif".to_string(),
        version:       "1.3.0".to_string(),
        layout:        CODEC_LAYOUT_VERSION,
        priority:      0,
        description:   "Graphics Interchange Format".to_string(),
        extensions:    vec!["gif".to_string()],
        mime_types:    vec!["image/gif".to_string()],
        magic_numbers: vec![
            "47 49 46 38 37 61".to_string(),
            "47 49 46 38 39 61".to_string(),
        ]
    }
}

pub(crate) static LAYOUT: CodecLayout = CodecLayout {
    layout:    CODEC_LAYOUT_VERSION,
    load_init: Some(load_init),
    save_init: Some(save_init)
};

/// A color table inside the raw stream: byte offset plus entry count.
type PaletteSpan = (usize, usize);

#[derive(Clone)]
struct GifFrame {
    rect:          FrameRect,
    interlaced:    bool,
    palette:       Option<PaletteSpan>,
    min_code_size: u8,
    /// LZW data sub-block spans inside the raw stream
    data:          Vec<(usize, usize)>,
    delay_cs:      u16,
    dispose:       DisposeMethod,
    transparent:   Option<u8>
}

struct GifLoadState {
    options:        LoadOptions,
    data:           Vec<u8>,
    screen_width:   u32,
    screen_height:  u32,
    global_palette: Option<PaletteSpan>,
    frames:         Vec<GifFrame>,
    comments:       Vec<String>,
    frame_number:   usize,
    /// Frames already composited onto the canvas
    composited:     usize,
    compositor:     Option<FrameCompositor>
}

fn broken(why: &str) -> MarlinError {
    MarlinError::BrokenImage(why.to_string())
}

fn take<'d>(data: &'d [u8], pos: &mut usize, n: usize) -> Result<&'d [u8], MarlinError> {
    let end = pos
        .checked_add(n)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| broken("unexpected end of stream"))?;
    let slice = &data[*pos..end];

    *pos = end;
    Ok(slice)
}

fn take_u16_le(data: &[u8], pos: &mut usize) -> Result<u16, MarlinError> {
    let bytes = take(data, pos, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn dispose_from_gif(value: u8) -> DisposeMethod {
    match value {
        2 => DisposeMethod::Background,
        3 => DisposeMethod::Previous,
        0 | 1 => DisposeMethod::None,
        other => {
            warn!("GIF: treating reserved disposal method {other} as none");
            DisposeMethod::None
        }
    }
}

/// Pending graphic control data, applies to the next image descriptor.
#[derive(Copy, Clone, Default)]
struct GraphicControl {
    delay_cs:    u16,
    dispose:     u8,
    transparent: Option<u8>
}

fn load_init<'io>(
    io: &'io mut dyn IoStream, options: &LoadOptions
) -> Result<Box<dyn CodecLoadState + 'io>, MarlinError> {
    // demux wants the whole stream in memory, like any other container probe
    let mut data = Vec::new();
    let mut chunk = [0_u8; 64 * 1024];

    loop {
        match io.read(&mut chunk)? {
            0 => break,
            n => {
                data.try_reserve(n)?;
                data.extend_from_slice(&chunk[..n]);
            }
        }
    }

    let state = parse_stream(data, options)?;

    trace!(
        "GIF: {}x{} screen, {} frames",
        state.screen_width,
        state.screen_height,
        state.frames.len()
    );

    Ok(Box::new(state))
}

fn parse_stream(data: Vec<u8>, options: &LoadOptions) -> Result<GifLoadState, MarlinError> {
    let mut pos = 0_usize;

    let header = take(&data, &mut pos, 6)?;
    if header != b"GIF87a" && header != b"GIF89a" {
        return Err(broken("not a GIF signature"));
    }

    let screen_width = u32::from(take_u16_le(&data, &mut pos)?);
    let screen_height = u32::from(take_u16_le(&data, &mut pos)?);
    let flags = take(&data, &mut pos, 1)?[0];
    let _background_index = take(&data, &mut pos, 1)?[0];
    let _aspect_ratio = take(&data, &mut pos, 1)?[0];

    if screen_width == 0 || screen_height == 0 {
        return Err(MarlinError::IncorrectImageDimensions);
    }
    if screen_width > options.max_width() || screen_height > options.max_height() {
        return Err(MarlinError::IncorrectImageDimensions);
    }

    let global_palette = if flags & 0x80 != 0 {
        let count = 2_usize << (flags & 0x07);
        let span = (pos, count);

        take(&data, &mut pos, count * 3)?;
        Some(span)
    } else {
        None
    };

    let mut frames = Vec::new();
    let mut comments = Vec::new();
    let mut pending = GraphicControl::default();

    loop {
        if pos >= data.len() {
            if frames.is_empty() {
                return Err(broken("stream ends before any image"));
            }
            warn!("GIF: stream ends without a trailer");
            break;
        }

        let introducer = take(&data, &mut pos, 1)?[0];

        match introducer {
            // image descriptor
            0x2c => {
                let x = u32::from(take_u16_le(&data, &mut pos)?);
                let y = u32::from(take_u16_le(&data, &mut pos)?);
                let width = u32::from(take_u16_le(&data, &mut pos)?);
                let height = u32::from(take_u16_le(&data, &mut pos)?);
                let frame_flags = take(&data, &mut pos, 1)?[0];

                let palette = if frame_flags & 0x80 != 0 {
                    let count = 2_usize << (frame_flags & 0x07);
                    let span = (pos, count);

                    take(&data, &mut pos, count * 3)?;
                    Some(span)
                } else {
                    None
                };

                let min_code_size = take(&data, &mut pos, 1)?[0];
                let mut blocks = Vec::new();

                loop {
                    let len = take(&data, &mut pos, 1)?[0] as usize;
                    if len == 0 {
                        break;
                    }
                    blocks.push((pos, len));
                    take(&data, &mut pos, len)?;
                }

                frames.push(GifFrame {
                    rect: FrameRect { x, y, width, height },
                    interlaced: frame_flags & 0x40 != 0,
                    palette,
                    min_code_size,
                    data: blocks,
                    delay_cs: pending.delay_cs,
                    dispose: dispose_from_gif(pending.dispose),
                    transparent: pending.transparent
                });
                pending = GraphicControl::default();
            }
            // extension
            0x21 => {
                let label = take(&data, &mut pos, 1)?[0];
                let mut payload = Vec::new();

                loop {
                    let len = take(&data, &mut pos, 1)?[0] as usize;
                    if len == 0 {
                        break;
                    }
                    payload.extend_from_slice(take(&data, &mut pos, len)?);
                }

                match label {
                    // graphic control
                    0xf9 => {
                        if payload.len() < 4 {
                            return Err(broken("short graphic control extension"));
                        }
                        pending = GraphicControl {
                            delay_cs:    u16::from_le_bytes([payload[1], payload[2]]),
                            dispose:     (payload[0] >> 2) & 0x07,
                            transparent: (payload[0] & 0x01 != 0).then_some(payload[3])
                        };
                    }
                    // comment
                    0xfe => {
                        comments.push(String::from_utf8_lossy(&payload).into_owned());
                    }
                    // application extensions (animation loop counts) and
                    // plain text are skipped
                    _ => {}
                }
            }
            // trailer
            0x3b => break,
            other => {
                return Err(broken(&format!("unknown block introducer {other:#04x}")));
            }
        }
    }

    Ok(GifLoadState {
        options: options.clone(),
        data,
        screen_width,
        screen_height,
        global_palette,
        frames,
        comments,
        frame_number: 0,
        composited: 0,
        compositor: None
    })
}

impl GifLoadState {
    fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Decode frame `idx` and land its fragment on the canvas.
    fn composite_frame(&mut self, idx: usize) -> Result<(), MarlinError> {
        let frame = self.frames[idx].clone();
        let expected = frame.rect.width as usize * frame.rect.height as usize;

        let mut lzw = Vec::new();
        for &(offset, len) in &frame.data {
            lzw.extend_from_slice(&self.data[offset..offset + len]);
        }

        let mut indices = lzw_decode(&lzw, frame.min_code_size, expected)?;
        if frame.interlaced {
            indices = deinterlace(
                &indices,
                frame.rect.width as usize,
                frame.rect.height as usize
            );
        }

        let (palette_offset, palette_count) = frame
            .palette
            .or(self.global_palette)
            .ok_or_else(|| broken("frame has no color table"))?;

        let mut fragment = Vec::new();
        fragment.try_reserve_exact(expected * 4)?;
        fragment.resize(expected * 4, 0);

        for (i, &index) in indices.iter().enumerate() {
            if frame.transparent == Some(index) {
                // stays fully transparent
                continue;
            }
            if index as usize >= palette_count {
                return Err(broken("pixel index escapes the color table"));
            }
            let entry = palette_offset + index as usize * 3;

            fragment[i * 4..i * 4 + 3].copy_from_slice(&self.data[entry..entry + 3]);
            fragment[i * 4 + 3] = 255;
        }

        // transparency must leave the canvas visible underneath
        let blend = if frame.transparent.is_some() {
            BlendMethod::AlphaOver
        } else {
            BlendMethod::Overwrite
        };

        self.compositor
            .as_mut()
            .expect("canvas exists once the first frame was sought")
            .compose(frame.rect, frame.dispose, blend, &fragment)
    }
}

impl CodecLoadState for GifLoadState {
    fn seek_next_frame(&mut self) -> Result<Image, MarlinError> {
        if self.frame_number >= self.frames.len() {
            return Err(MarlinError::NoMoreFrames);
        }

        if self.frame_number == 0 {
            self.compositor = Some(FrameCompositor::new(
                self.screen_width,
                self.screen_height,
                [0, 0, 0, 0]
            )?);
        }

        // frames skipped without a pixel read still shape the canvas
        while self.composited < self.frame_number {
            let idx = self.composited;
            self.composite_frame(idx)?;
            self.composited += 1;
        }

        let frame = &self.frames[self.frame_number];

        let mut image = Image::new();
        image.width = self.screen_width;
        image.height = self.screen_height;
        image.pixel_format = PixelFormat::Bpp32Rgba;
        image.bytes_per_line = self.screen_width * 4;

        image.delay = if self.is_animated() {
            match i32::from(frame.delay_cs) * 10 {
                d if d <= 0 => FALLBACK_DELAY_MS,
                d => d
            }
        } else {
            -1
        };

        if self.frame_number == 0 && self.options.io_options().meta_data {
            for comment in &self.comments {
                if let Ok(entry) = MetaEntry::new("Comment", comment.clone()) {
                    image.meta_data.push(entry);
                }
            }
        }

        if self.options.io_options().source_image {
            let mut source = SourceImage {
                pixel_format: PixelFormat::Bpp8Indexed,
                compression: Compression::Lzw,
                ..SourceImage::default()
            };
            source.properties.interlaced = frame.interlaced;
            image.source_image = Some(source);
        }

        self.frame_number += 1;
        Ok(image)
    }

    fn load_frame(&mut self, image: &mut Image) -> Result<(), MarlinError> {
        let idx = self.frame_number - 1;

        if self.composited == idx {
            self.composite_frame(idx)?;
            self.composited = idx + 1;
        }

        self.compositor
            .as_ref()
            .expect("canvas exists once the first frame was sought")
            .write_into(&mut image.pixels)
    }

    fn finish(&mut self) -> Result<(), MarlinError> {
        self.compositor = None;
        Ok(())
    }
}

fn save_init<'io>(
    _io: &'io mut dyn IoStream, _options: &SaveOptions
) -> Result<Box<dyn CodecSaveState + 'io>, MarlinError> {
    Err(MarlinError::NotImplemented)
}

const MAX_LZW_CODES: usize = 4096;

/// Decode a GIF flavored LZW stream into `expected` palette indices.
fn lzw_decode(data: &[u8], min_code_size: u8, expected: usize) -> Result<Vec<u8>, MarlinError> {
    if !(2..=8).contains(&min_code_size) {
        return Err(broken("bad LZW minimum code size"));
    }

    let clear = 1_u16 << min_code_size;
    let end_code = clear + 1;

    let mut code_size = u32::from(min_code_size) + 1;
    let mut next_code = end_code + 1;
    let mut prefix = vec![0_u16; MAX_LZW_CODES];
    let mut suffix = vec![0_u8; MAX_LZW_CODES];

    let mut out = Vec::new();
    out.try_reserve(expected)?;

    let mut accumulator = 0_u32;
    let mut bits = 0_u32;
    let mut pos = 0_usize;
    let mut prev: Option<u16> = None;

    while out.len() < expected {
        while bits < code_size {
            if pos >= data.len() {
                return Err(broken("LZW stream ended early"));
            }
            accumulator |= u32::from(data[pos]) << bits;
            pos += 1;
            bits += 8;
        }

        let code = (accumulator & ((1 << code_size) - 1)) as u16;
        accumulator >>= code_size;
        bits -= code_size;

        if code == clear {
            code_size = u32::from(min_code_size) + 1;
            next_code = end_code + 1;
            prev = None;
            continue;
        }
        if code == end_code {
            break;
        }

        match prev {
            None => {
                if code >= clear {
                    return Err(broken("LZW starts with a compound code"));
                }
                out.push(code as u8);
            }
            Some(p) => {
                let current_first = if code < next_code {
                    expand_code(&mut out, code, &prefix, &suffix, clear)?
                } else if code == next_code {
                    let first = expand_code(&mut out, p, &prefix, &suffix, clear)?;
                    out.push(first);
                    first
                } else {
                    return Err(broken("LZW code out of sequence"));
                };

                if (next_code as usize) < MAX_LZW_CODES {
                    prefix[next_code as usize] = p;
                    suffix[next_code as usize] = current_first;
                    next_code += 1;

                    if u32::from(next_code) == (1 << code_size) && code_size < 12 {
                        code_size += 1;
                    }
                }
            }
        }
        prev = Some(code);
    }

    if out.len() < expected {
        return Err(broken("LZW stream holds fewer pixels than the frame"));
    }
    out.truncate(expected);
    Ok(out)
}

/// Expand one code to the output, returning the first byte of its
/// expansion.
fn expand_code(
    out: &mut Vec<u8>, code: u16, prefix: &[u16], suffix: &[u8], clear: u16
) -> Result<u8, MarlinError> {
    let mut stack = Vec::new();
    let mut current = code;

    while current >= clear {
        if stack.len() >= MAX_LZW_CODES {
            return Err(broken("LZW code chain loops"));
        }
        stack.push(suffix[current as usize]);
        current = prefix[current as usize];
    }

    let root = current as u8;
    out.push(root);
    out.extend(stack.iter().rev());
    Ok(root)
}

/// Reorder the four interlace passes into sequential rows.
fn deinterlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0_u8; indices.len()];
    let mut source_row = 0_usize;

    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        let mut y = start;

        while y < height {
            out[y * width..(y + 1) * width]
                .copy_from_slice(&indices[source_row * width..(source_row + 1) * width]);
            source_row += 1;
            y += step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lzw_decodes_literal_codes() {
        // min code size 2: clear=4, end=5, three bit codes
        // stream: clear, 0, 1, end  ->  0x44 0x0a
        let decoded = lzw_decode(&[0x44, 0x0a], 2, 2).unwrap();
        assert_eq!(decoded, vec![0, 1]);
    }

    #[test]
    fn lzw_builds_dictionary_entries() {
        // clear, 1, 1 (adds code 6 = "11"), 6, then one literal after the
        // code size grew to four bits
        let mut packer = BitPacker::default();
        for code in [4_u16, 1, 1, 6] {
            packer.push(code, 3);
        }
        packer.push(1, 4);

        let decoded = lzw_decode(&packer.finish(), 2, 5).unwrap();
        assert_eq!(decoded, vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn truncated_lzw_is_rejected() {
        assert!(matches!(
            lzw_decode(&[0x44], 2, 4),
            Err(MarlinError::BrokenImage(_))
        ));
    }

    #[test]
    fn deinterlace_reorders_passes() {
        // 1x8 image: passes emit rows 0,8.. / 4.. / 2,6.. / 1,3,5,7
        let interlaced = [0_u8, 4, 2, 6, 1, 3, 5, 7];
        let restored = deinterlace(&interlaced, 1, 8);
        assert_eq!(restored, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[derive(Default)]
    struct BitPacker {
        bytes:       Vec<u8>,
        accumulator: u32,
        bits:        u32
    }

    impl BitPacker {
        fn push(&mut self, code: u16, size: u32) {
            self.accumulator |= u32::from(code) << self.bits;
            self.bits += size;
            while self.bits >= 8 {
                self.bytes.push((self.accumulator & 0xff) as u8);
                self.accumulator >>= 8;
                self.bits -= 8;
            }
        }

        fn finish(mut self) -> Vec<u8> {
            if self.bits > 0 {
                self.bytes.push((self.accumulator & 0xff) as u8);
            }
            self.bytes
        }
    }
}
