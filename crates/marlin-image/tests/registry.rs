//! Discovery and lookup tests against the per-thread registry

use std::io::Write;
use std::path::Path;

use marlin_image::{context, registry, MarlinError};

fn write_manifest(dir: &Path, file: &str, body: &str) {
    let mut out = std::fs::File::create(dir.join(file)).unwrap();
    out.write_all(body.as_bytes()).unwrap();
}

const PNG_MANIFEST: &str = "[codec]
layout = 8
version = 1.6.0
name = png
priority = 0
description = Portable Network Graphics
extensions = png
mime-types = image/png
magic-numbers = \"89 50 4e 47 0d 0a 1a 0a\"
";

#[test]
fn manifest_codecs_are_found_by_magic() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "png.codec.info", PNG_MANIFEST);

    context::finish();
    context::init_with_flags(context::InitFlags::default(), &[dir.path()]).unwrap();

    let probe: [u8; 16] = [
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d, 0x49, 0x48, 0x44, 0x52
    ];
    let descriptor = registry::codec_by_magic_from_memory(&probe).unwrap();

    assert_eq!(descriptor.name(), "png");
    assert_eq!(descriptor.description(), "Portable Network Graphics");

    // the manifest describes the codec; binding it needs a module
    assert!(matches!(
        descriptor.bind(),
        Err(MarlinError::CannotLoadCodec(_))
    ));

    context::finish();
}

#[test]
fn lower_priority_wins_a_contested_extension() {
    let dir = tempfile::tempdir().unwrap();

    write_manifest(
        dir.path(),
        "tiff-turbo.codec.info",
        "[codec]\nlayout = 8\nversion = 2.0.0\nname = tiff-turbo\npriority = 5\nextensions = tif;tiff\n"
    );
    write_manifest(
        dir.path(),
        "tiff.codec.info",
        "[codec]\nlayout = 8\nversion = 1.0.0\nname = tiff\npriority = 0\nextensions = tif;tiff\n"
    );

    context::finish();
    context::init_with_flags(context::InitFlags::default(), &[dir.path()]).unwrap();

    let first = registry::codec_by_extension("tif").unwrap();
    assert_eq!(first.name(), "tiff");

    context::finish();
}

#[test]
fn built_in_codecs_are_always_registered() {
    let names: Vec<String> = registry::codec_list()
        .unwrap()
        .iter()
        .map(|d| d.name().to_string())
        .collect();

    assert!(names.contains(&"bmp".to_string()));
    assert!(names.contains(&"gif".to_string()));
    assert!(names.contains(&"ppm".to_string()));

    // priority 10 sorts the netpbm codec after the others
    let gif_at = names.iter().position(|n| n == "gif").unwrap();
    let ppm_at = names.iter().position(|n| n == "ppm").unwrap();
    assert!(gif_at < ppm_at);
}

#[test]
fn lookup_by_mime_type_and_path() {
    let by_mime = registry::codec_by_mime_type("IMAGE/GIF").unwrap();
    assert_eq!(by_mime.name(), "gif");

    let by_path = registry::codec_by_path(Path::new("shots/Photo.BMP")).unwrap();
    assert_eq!(by_path.name(), "bmp");

    assert!(matches!(
        registry::codec_by_path(Path::new("no_extension")),
        Err(MarlinError::InvalidArgument(_))
    ));
    assert!(matches!(
        registry::codec_by_extension("xcf"),
        Err(MarlinError::CodecNotFound)
    ));
}

#[test]
fn magic_beats_a_lying_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake.bmp");

    // a GIF header behind a .bmp extension
    let mut data = b"GIF89a".to_vec();
    data.resize(16, 0);
    std::fs::write(&path, &data).unwrap();

    let descriptor = registry::codec_by_path_with_magic(&path).unwrap();
    assert_eq!(descriptor.name(), "gif");
}

#[test]
fn unmagical_files_fall_back_to_their_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.ppm");

    std::fs::write(&path, vec![0_u8; 32]).unwrap();

    let descriptor = registry::codec_by_path_with_magic(&path).unwrap();
    assert_eq!(descriptor.name(), "ppm");
}

#[test]
fn environment_directories_join_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "envcodec.codec.info",
        "[codec]\nlayout = 8\nversion = 0.3.0\nname = envcodec\npriority = 3\nextensions = envx\n"
    );

    std::env::set_var(context::CODEC_PATH_ENV, dir.path());
    context::finish();
    context::init().unwrap();

    let descriptor = registry::codec_by_extension("envx").unwrap();
    assert_eq!(descriptor.name(), "envcodec");

    std::env::remove_var(context::CODEC_PATH_ENV);
    context::finish();
}

#[test]
fn stale_layouts_are_refused_at_bind_time() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "old.codec.info",
        "[codec]\nlayout = 5\nversion = 9.0.0\nname = oldtimer\nextensions = old\n"
    );

    context::finish();
    context::init_with_flags(context::InitFlags::default(), &[dir.path()]).unwrap();

    // the manifest is indexed, only binding refuses the stale layout
    let descriptor = registry::codec_by_extension("old").unwrap();
    assert!(matches!(
        descriptor.bind(),
        Err(MarlinError::UnsupportedCodecLayout(5))
    ));

    context::finish();
}

#[test]
fn unloading_codecs_keeps_the_registry() {
    let descriptor = registry::codec_by_extension("bmp").unwrap();
    descriptor.bind().unwrap();

    context::unload_codecs().unwrap();

    // rebinds transparently on next use
    let descriptor = registry::codec_by_extension("bmp").unwrap();
    descriptor.bind().unwrap();
}
