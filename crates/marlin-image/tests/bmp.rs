//! End-to-end tests for the BMP codec

use marlin_core::options::{IoOptions, LoadOptions};
use marlin_core::pixel_format::PixelFormat;
use marlin_image::codecs::probe_memory;
use marlin_image::image::Image;

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// A 2x2 24-bit BMP: red, green on the top row, blue, white on the
/// bottom row. Rows are 4-byte padded and stored bottom-up in BGR.
fn bmp_2x2() -> Vec<u8> {
    let mut out = Vec::new();

    out.extend_from_slice(b"BM");
    push_u32(&mut out, 54 + 16); // file size
    push_u32(&mut out, 0);
    push_u32(&mut out, 54); // pixel offset

    push_u32(&mut out, 40); // info header size
    push_u32(&mut out, 2); // width
    push_u32(&mut out, 2); // height, bottom-up
    push_u16(&mut out, 1); // planes
    push_u16(&mut out, 24); // bit count
    push_u32(&mut out, 0); // BI_RGB
    push_u32(&mut out, 16); // image size
    push_u32(&mut out, 0); // x resolution
    push_u32(&mut out, 0); // y resolution
    push_u32(&mut out, 0); // colors used
    push_u32(&mut out, 0); // colors important

    // bottom row: blue, white + padding
    out.extend_from_slice(&[255, 0, 0, 255, 255, 255, 0, 0]);
    // top row: red, green + padding
    out.extend_from_slice(&[0, 0, 255, 0, 255, 0, 0, 0]);

    out
}

#[test]
fn load_two_by_two_truecolor() {
    let image = Image::read(&bmp_2x2(), &LoadOptions::default()).unwrap();

    assert_eq!(image.width, 2);
    assert_eq!(image.height, 2);
    assert_eq!(image.pixel_format, PixelFormat::Bpp24Rgb);
    // padded to a 4-byte boundary
    assert_eq!(image.bytes_per_line, 8);
    assert_eq!(image.delay, -1);
    assert_eq!(
        image.pixels,
        vec![
            255, 0, 0, 0, 255, 0, 0, 0, // red, green
            0, 0, 255, 255, 255, 255, 0, 0, // blue, white
        ]
    );
}

#[test]
fn probe_identifies_bmp_by_magic() {
    let (header, descriptor) = probe_memory(&bmp_2x2()).unwrap();

    assert_eq!(descriptor.name(), "bmp");
    assert_eq!(header.width, 2);
    assert_eq!(header.height, 2);
    assert!(header.pixels.is_empty());
}

#[test]
fn source_descriptor_records_the_on_disk_form() {
    let options = LoadOptions::default().set_io_options(IoOptions {
        meta_data:    true,
        iccp:         true,
        source_image: true
    });
    let image = Image::read(&bmp_2x2(), &options).unwrap();
    let source = image.source_image.unwrap();

    assert_eq!(source.pixel_format, PixelFormat::Bpp24Bgr);
    assert!(source.properties.flipped_vertically);
}

#[test]
fn saved_images_load_back_identically() {
    let mut image = Image::new();
    image.width = 2;
    image.height = 2;
    image.pixel_format = PixelFormat::Bpp24Rgb;
    image.bytes_per_line = 8;
    image.pixels = vec![
        10, 20, 30, 40, 50, 60, 0, 0, //
        70, 80, 90, 100, 110, 120, 0, 0,
    ];

    let encoded = image.write_to_vec("bmp").unwrap();
    let loaded = Image::read(&encoded, &LoadOptions::default()).unwrap();

    assert_eq!(loaded.width, image.width);
    assert_eq!(loaded.height, image.height);
    assert_eq!(loaded.pixel_format, image.pixel_format);
    assert_eq!(loaded.bytes_per_line, image.bytes_per_line);
    assert_eq!(loaded.pixels, image.pixels);
}

#[test]
fn save_and_open_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bmp");

    let mut image = Image::new();
    image.width = 3;
    image.height = 1;
    image.pixel_format = PixelFormat::Bpp32Rgba;
    image.bytes_per_line = 12;
    image.pixels = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

    image.save(&path).unwrap();

    let loaded = Image::open(&path).unwrap();
    assert_eq!(loaded.pixel_format, PixelFormat::Bpp32Rgba);
    assert_eq!(loaded.pixels, image.pixels);
}

#[test]
fn indexed_bmp_carries_its_palette() {
    let mut out = Vec::new();

    out.extend_from_slice(b"BM");
    push_u32(&mut out, 54 + 8 + 4);
    push_u32(&mut out, 0);
    push_u32(&mut out, 54 + 8); // pixels after a 2 entry palette

    push_u32(&mut out, 40);
    push_u32(&mut out, 2); // width
    push_u32(&mut out, 1); // height
    push_u16(&mut out, 1);
    push_u16(&mut out, 8); // bit count
    push_u32(&mut out, 0);
    push_u32(&mut out, 4);
    push_u32(&mut out, 0);
    push_u32(&mut out, 0);
    push_u32(&mut out, 2); // colors used
    push_u32(&mut out, 0);

    // palette, BGRX: red then green
    out.extend_from_slice(&[0, 0, 255, 0, 0, 255, 0, 0]);
    // one padded row
    out.extend_from_slice(&[0, 1, 0, 0]);

    let image = Image::read(&out, &LoadOptions::default()).unwrap();

    assert_eq!(image.pixel_format, PixelFormat::Bpp8Indexed);
    assert_eq!(image.bytes_per_line, 4);
    assert_eq!(image.pixels[..2], [0, 1]);

    let palette = image.palette.unwrap();
    assert_eq!(palette.color_count(), 2);
    assert_eq!(palette.rgba32(0).unwrap(), [255, 0, 0, 255]);
    assert_eq!(palette.rgba32(1).unwrap(), [0, 255, 0, 255]);
}

#[test]
fn rle_compressed_files_are_refused() {
    let mut data = bmp_2x2();
    // compression field sits at offset 30
    data[30] = 1;

    assert!(matches!(
        Image::read(&data, &LoadOptions::default()),
        Err(marlin_image::MarlinError::UnsupportedCompression(_))
    ));
}
