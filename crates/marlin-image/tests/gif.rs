//! End-to-end tests for the GIF codec and its canvas compositing

use std::rc::Rc;

use marlin_core::io::MemoryReader;
use marlin_core::options::{IoOptions, LoadOptions};
use marlin_core::pixel_format::PixelFormat;
use marlin_image::driver::LoadDriver;
use marlin_image::image::Image;
use marlin_image::{context, registry, MarlinError};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Palette slots used by every test stream.
const PALETTE: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [0, 0, 0]];

/// Pack three-bit LZW codes LSB first, emitting a clear code before
/// every literal so the dictionary never grows.
fn lzw_literals(indices: &[u8]) -> Vec<u8> {
    const CLEAR: u16 = 4;
    const END: u16 = 5;

    let mut accumulator = 0_u32;
    let mut bits = 0_u32;
    let mut out = Vec::new();

    let mut push = |code: u16, accumulator: &mut u32, bits: &mut u32, out: &mut Vec<u8>| {
        *accumulator |= u32::from(code) << *bits;
        *bits += 3;
        while *bits >= 8 {
            out.push((*accumulator & 0xff) as u8);
            *accumulator >>= 8;
            *bits -= 8;
        }
    };

    push(CLEAR, &mut accumulator, &mut bits, &mut out);
    for &index in indices {
        push(u16::from(index), &mut accumulator, &mut bits, &mut out);
        push(CLEAR, &mut accumulator, &mut bits, &mut out);
    }
    push(END, &mut accumulator, &mut bits, &mut out);

    if bits > 0 {
        out.push((accumulator & 0xff) as u8);
    }
    out
}

fn screen(width: u16, height: u16) -> Vec<u8> {
    let mut out = b"GIF89a".to_vec();

    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    // global color table, 4 entries
    out.push(0x80 | 0x01);
    out.push(0); // background index
    out.push(0); // aspect ratio
    for color in PALETTE {
        out.extend_from_slice(&color);
    }
    out
}

fn graphic_control(out: &mut Vec<u8>, dispose: u8, delay_cs: u16, transparent: Option<u8>) {
    out.extend_from_slice(&[0x21, 0xf9, 0x04]);
    out.push((dispose << 2) | u8::from(transparent.is_some()));
    out.extend_from_slice(&delay_cs.to_le_bytes());
    out.push(transparent.unwrap_or(0));
    out.push(0);
}

fn frame(out: &mut Vec<u8>, x: u16, y: u16, width: u16, height: u16, indices: &[u8]) {
    out.push(0x2c);
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.push(0); // no local table, not interlaced
    out.push(2); // minimum LZW code size

    let data = lzw_literals(indices);
    assert!(data.len() <= 255, "test frames stay within one sub-block");
    out.push(data.len() as u8);
    out.extend_from_slice(&data);
    out.push(0);
}

fn comment(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(&[0x21, 0xfe]);
    out.push(text.len() as u8);
    out.extend_from_slice(text.as_bytes());
    out.push(0);
}

fn trailer(mut stream: Vec<u8>) -> Vec<u8> {
    stream.push(0x3b);
    stream
}

fn pixel(image: &Image, x: u32, y: u32) -> [u8; 4] {
    let offset = (y * image.bytes_per_line + x * 4) as usize;
    image.pixels[offset..offset + 4].try_into().unwrap()
}

#[test]
fn single_frame_is_a_still_image() {
    let mut stream = screen(2, 2);
    comment(&mut stream, "made by hand");
    frame(&mut stream, 0, 0, 2, 2, &[0, 1, 2, 3]);
    let data = trailer(stream);

    let frames = Image::read_all_frames(&data).unwrap();
    assert_eq!(frames.len(), 1);

    let image = &frames[0];
    assert_eq!(image.width, 2);
    assert_eq!(image.height, 2);
    assert_eq!(image.pixel_format, PixelFormat::Bpp32Rgba);
    assert_eq!(image.bytes_per_line, 8);
    assert_eq!(image.delay, -1);

    assert_eq!(pixel(image, 0, 0), RED);
    assert_eq!(pixel(image, 1, 0), GREEN);
    assert_eq!(pixel(image, 0, 1), BLUE);

    assert_eq!(image.meta_data.len(), 1);
    assert_eq!(image.meta_data[0].key(), "Comment");
    assert_eq!(image.meta_data[0].value(), "made by hand");
}

#[test]
fn background_disposal_clears_only_the_previous_rect() {
    // frame 1 paints a red 2x2 square top left and disposes to the
    // background, frame 2 paints a green 2x2 square bottom right
    let mut stream = screen(4, 4);
    graphic_control(&mut stream, 2, 0, None);
    frame(&mut stream, 0, 0, 2, 2, &[0, 0, 0, 0]);
    graphic_control(&mut stream, 0, 0, None);
    frame(&mut stream, 2, 2, 2, 2, &[1, 1, 1, 1]);
    let data = trailer(stream);

    let frames = Image::read_all_frames(&data).unwrap();
    assert_eq!(frames.len(), 2);

    let first = &frames[0];
    assert_eq!(pixel(first, 0, 0), RED);
    assert_eq!(pixel(first, 1, 1), RED);
    assert_eq!(pixel(first, 2, 2), TRANSPARENT);

    let second = &frames[1];
    assert_eq!(pixel(second, 0, 0), TRANSPARENT);
    assert_eq!(pixel(second, 1, 1), TRANSPARENT);
    assert_eq!(pixel(second, 2, 2), GREEN);
    assert_eq!(pixel(second, 3, 3), GREEN);

    // zero length durations fall back to 100 ms
    assert_eq!(first.delay, 100);
    assert_eq!(second.delay, 100);
}

#[test]
fn previous_disposal_restores_the_canvas() {
    let mut stream = screen(2, 1);
    frame(&mut stream, 0, 0, 2, 1, &[0, 0]);
    graphic_control(&mut stream, 3, 0, None);
    frame(&mut stream, 0, 0, 1, 1, &[1]);
    graphic_control(&mut stream, 0, 0, None);
    frame(&mut stream, 1, 0, 1, 1, &[2]);
    let data = trailer(stream);

    let frames = Image::read_all_frames(&data).unwrap();
    assert_eq!(frames.len(), 3);

    assert_eq!(pixel(&frames[1], 0, 0), GREEN);
    assert_eq!(pixel(&frames[1], 1, 0), RED);

    // the green square was thrown away, frame 1 shines through again
    assert_eq!(pixel(&frames[2], 0, 0), RED);
    assert_eq!(pixel(&frames[2], 1, 0), BLUE);
}

#[test]
fn transparent_pixels_leave_the_canvas_visible() {
    let mut stream = screen(2, 1);
    frame(&mut stream, 0, 0, 2, 1, &[0, 0]);
    graphic_control(&mut stream, 0, 0, Some(3));
    frame(&mut stream, 0, 0, 2, 1, &[3, 1]);
    let data = trailer(stream);

    let frames = Image::read_all_frames(&data).unwrap();

    assert_eq!(pixel(&frames[1], 0, 0), RED);
    assert_eq!(pixel(&frames[1], 1, 0), GREEN);
}

#[test]
fn animation_delays_come_from_the_stream() {
    let mut stream = screen(1, 1);
    graphic_control(&mut stream, 0, 25, None); // 250 ms
    frame(&mut stream, 0, 0, 1, 1, &[0]);
    graphic_control(&mut stream, 0, 0, None); // falls back to 100 ms
    frame(&mut stream, 0, 0, 1, 1, &[1]);
    let data = trailer(stream);

    let frames = Image::read_all_frames(&data).unwrap();

    assert_eq!(frames[0].delay, 250);
    assert_eq!(frames[1].delay, 100);
}

#[test]
fn skipped_frames_still_shape_the_canvas() {
    let mut stream = screen(2, 1);
    frame(&mut stream, 0, 0, 2, 1, &[0, 0]);
    graphic_control(&mut stream, 0, 0, None);
    frame(&mut stream, 1, 0, 1, 1, &[1]);
    graphic_control(&mut stream, 0, 0, None);
    frame(&mut stream, 0, 0, 1, 1, &[2]);
    let data = trailer(stream);

    let descriptor = registry::codec_by_extension("gif").unwrap();
    let mut io = MemoryReader::new(&data);
    let mut driver =
        LoadDriver::start(&mut io, Rc::clone(&descriptor), &LoadOptions::default()).unwrap();

    // skip the first two frames without reading their pixels
    driver.next_frame_header().unwrap().unwrap();
    driver.next_frame_header().unwrap().unwrap();

    let mut third = driver.next_frame_header().unwrap().unwrap();
    driver.read_frame(&mut third).unwrap();
    driver.stop().unwrap();

    // both skipped frames landed on the canvas before the third
    assert_eq!(pixel(&third, 0, 0), BLUE);
    assert_eq!(pixel(&third, 1, 0), GREEN);
}

#[test]
fn broken_pixel_data_surfaces_after_cleanup() {
    let mut stream = screen(2, 2);
    // only three of the four pixels are present
    frame(&mut stream, 0, 0, 2, 2, &[0, 1, 2]);
    let data = trailer(stream);

    let err = Image::read(&data, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, MarlinError::BrokenImage(_)));

    // the failure detail is kept for the caller on this thread
    let detail = context::last_error().unwrap();
    assert!(detail.starts_with("GIF:"));
}

#[test]
fn source_descriptor_reports_lzw_indexed_frames() {
    let mut stream = screen(1, 1);
    frame(&mut stream, 0, 0, 1, 1, &[0]);
    let data = trailer(stream);

    let options = LoadOptions::default().set_io_options(IoOptions {
        meta_data:    false,
        iccp:         false,
        source_image: true
    });
    let image = Image::read(&data, &options).unwrap();
    let source = image.source_image.unwrap();

    assert_eq!(source.pixel_format, PixelFormat::Bpp8Indexed);
    assert_eq!(
        source.compression,
        marlin_core::compression::Compression::Lzw
    );
    // metadata was switched off
    assert!(image.meta_data.is_empty());
}

#[test]
fn saving_gif_is_not_implemented() {
    let mut image = Image::new();
    image.width = 1;
    image.height = 1;
    image.pixel_format = PixelFormat::Bpp32Rgba;
    image.bytes_per_line = 4;
    image.pixels = vec![0, 0, 0, 255];

    assert!(matches!(
        image.write_to_vec("gif"),
        Err(MarlinError::NotImplemented)
    ));
}

#[test]
fn frames_through_files_match_frames_through_memory() {
    let mut stream = screen(2, 1);
    graphic_control(&mut stream, 0, 10, None);
    frame(&mut stream, 0, 0, 2, 1, &[0, 1]);
    graphic_control(&mut stream, 0, 10, None);
    frame(&mut stream, 0, 0, 2, 1, &[1, 0]);
    let data = trailer(stream);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.gif");
    std::fs::write(&path, &data).unwrap();

    let from_file = Image::open_all_frames(&path).unwrap();
    let from_memory = Image::read_all_frames(&data).unwrap();

    assert_eq!(from_file.len(), 2);
    for (a, b) in from_file.iter().zip(&from_memory) {
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.delay, b.delay);
    }
}
