/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The codec registry
//!
//! The registry indexes every codec the current thread knows about:
//! built-in codecs first, then codecs discovered through manifest files.
//! Descriptors are immutable once discovery finishes; binding a
//! descriptor to its entry point table happens lazily on first use.
//!
//! When several codecs claim the same extension, MIME type or magic
//! number, lookups return the first descriptor in registry order, which
//! is ascending priority with discovery order breaking ties. The full
//! descriptor list is public so callers can pick differently.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace};

use marlin_core::errors::MarlinError;
use marlin_core::io::{IoStream, MemoryReader, SeekFrom};

use crate::codec::{CodecLayout, CODEC_LAYOUT_VERSION};
use crate::codecs;
use crate::context;
use crate::manifest::CodecManifest;

/// Bytes read from offset 0 when identifying a stream by magic number.
pub const MAGIC_BUFFER_SIZE: usize = 16;

/// An indexed codec: its manifest data plus the lazily bound entry
/// point table.
pub struct CodecDescriptor {
    manifest:       CodecManifest,
    module_path:    Option<PathBuf>,
    implementation: RefCell<Option<&'static CodecLayout>>
}

impl CodecDescriptor {
    pub(crate) fn new(manifest: CodecManifest, module_path: Option<PathBuf>) -> CodecDescriptor {
        CodecDescriptor {
            manifest,
            module_path,
            implementation: RefCell::new(None)
        }
    }

    /// Short lowercase codec name, e.g. `"gif"`.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Codec version as declared by its manifest.
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Tie-breaking priority; lower sorts first.
    pub fn priority(&self) -> u32 {
        self.manifest.priority
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.manifest.description
    }

    /// Lowercase file extensions, without the dot.
    pub fn extensions(&self) -> &[String] {
        &self.manifest.extensions
    }

    /// Lowercase MIME types.
    pub fn mime_types(&self) -> &[String] {
        &self.manifest.mime_types
    }

    /// Magic number prefix patterns, lowercase space-separated hex with
    /// optional `??` don't-care bytes, anchored at offset 0.
    pub fn magic_numbers(&self) -> &[String] {
        &self.manifest.magic_numbers
    }

    /// Declared codec layout version.
    pub fn layout(&self) -> u32 {
        self.manifest.layout
    }

    /// Path of the codec module on disk, `None` for built-in codecs.
    pub fn module_path(&self) -> Option<&Path> {
        self.module_path.as_deref()
    }

    /// Bind the descriptor to its entry point table, loading the codec
    /// on first use and caching the result.
    pub fn bind(&self) -> Result<&'static CodecLayout, MarlinError> {
        if let Some(layout) = *self.implementation.borrow() {
            return Ok(layout);
        }

        if self.manifest.layout != CODEC_LAYOUT_VERSION {
            return Err(MarlinError::UnsupportedCodecLayout(self.manifest.layout));
        }

        debug!("Binding codec '{}'", self.name());

        let layout = codecs::builtin_layout(self.name())
            .ok_or_else(|| MarlinError::CannotLoadCodec(self.name().to_string()))?;

        if layout.layout != CODEC_LAYOUT_VERSION {
            return Err(MarlinError::UnsupportedCodecLayout(layout.layout));
        }

        *self.implementation.borrow_mut() = Some(layout);
        Ok(layout)
    }

    /// Drop the cached entry point table; the next use rebinds.
    pub(crate) fn unbind(&self) {
        self.implementation.borrow_mut().take();
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.implementation.borrow().is_some()
    }
}

/// The per-thread codec index.
pub struct Registry {
    descriptors:  Vec<Rc<CodecDescriptor>>,
    by_extension: HashMap<String, Vec<usize>>,
    by_mime:      HashMap<String, Vec<usize>>
}

impl Registry {
    /// Build the index from discovered descriptors.
    ///
    /// Descriptors are ordered by ascending priority; the stable sort
    /// keeps discovery order among equal priorities.
    pub(crate) fn build(mut descriptors: Vec<CodecDescriptor>) -> Registry {
        descriptors.sort_by_key(CodecDescriptor::priority);

        let descriptors: Vec<Rc<CodecDescriptor>> =
            descriptors.into_iter().map(Rc::new).collect();

        let mut by_extension: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_mime: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            for extension in descriptor.extensions() {
                by_extension.entry(extension.clone()).or_default().push(index);
            }
            for mime in descriptor.mime_types() {
                by_mime.entry(mime.clone()).or_default().push(index);
            }
        }

        trace!("Registry built with {} codecs", descriptors.len());

        Registry {
            descriptors,
            by_extension,
            by_mime
        }
    }

    /// All descriptors in registry order.
    pub fn descriptors(&self) -> &[Rc<CodecDescriptor>] {
        &self.descriptors
    }

    /// First codec claiming `extension` (matched lowercase, without a
    /// leading dot).
    pub fn find_by_extension(&self, extension: &str) -> Result<Rc<CodecDescriptor>, MarlinError> {
        self.find_all_by_extension(extension)
            .into_iter()
            .next()
            .ok_or(MarlinError::CodecNotFound)
    }

    /// Every codec claiming `extension`, in registry order.
    pub fn find_all_by_extension(&self, extension: &str) -> Vec<Rc<CodecDescriptor>> {
        let extension = extension.to_lowercase();

        self.by_extension
            .get(&extension)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| Rc::clone(&self.descriptors[i]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First codec claiming the MIME type (matched lowercase, exact).
    pub fn find_by_mime_type(&self, mime: &str) -> Result<Rc<CodecDescriptor>, MarlinError> {
        let mime = mime.to_lowercase();

        self.by_mime
            .get(&mime)
            .and_then(|indices| indices.first())
            .map(|&i| Rc::clone(&self.descriptors[i]))
            .ok_or(MarlinError::CodecNotFound)
    }

    /// First codec claiming the extension of `path`, taken after the
    /// last `.` of the file name.
    pub fn find_by_path(&self, path: &Path) -> Result<Rc<CodecDescriptor>, MarlinError> {
        debug!("Finding codec for path '{}'", path.display());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or(MarlinError::InvalidArgument("path carries no extension"))?;

        self.find_by_extension(extension)
    }

    /// Identify a stream by its first [`MAGIC_BUFFER_SIZE`] bytes.
    ///
    /// The stream is rewound to offset 0 after the probe, so a load can
    /// start right away. Identical bytes always resolve to the same
    /// descriptor, whatever the call order.
    pub fn find_by_magic(
        &self, io: &mut dyn IoStream
    ) -> Result<Rc<CodecDescriptor>, MarlinError> {
        let mut buffer = [0_u8; MAGIC_BUFFER_SIZE];
        io.strict_read(&mut buffer)?;
        io.seek(SeekFrom::Start(0))?;

        let hex: Vec<String> = buffer.iter().map(|b| format!("{b:02x}")).collect();

        debug!("Read magic number: '{}'", hex.join(" "));

        for descriptor in &self.descriptors {
            for pattern in descriptor.magic_numbers() {
                if magic_matches(&hex, pattern) {
                    debug!("Found codec '{}'", descriptor.name());
                    return Ok(Rc::clone(descriptor));
                }
            }
        }
        Err(MarlinError::CodecNotFound)
    }

    /// Identify a file by magic number, falling back to its extension
    /// when no magic pattern matches. The magic answer wins when the
    /// two disagree.
    pub fn find_by_path_with_magic(
        &self, path: &Path
    ) -> Result<Rc<CodecDescriptor>, MarlinError> {
        let mut io = marlin_core::io::FileReader::open(path)?;

        match self.find_by_magic(&mut io) {
            Ok(descriptor) => Ok(descriptor),
            Err(MarlinError::CodecNotFound) => self.find_by_path(path),
            Err(other) => Err(other)
        }
    }

    /// Drop every cached entry point table.
    pub(crate) fn unbind_all(&self) -> usize {
        let mut count = 0;

        for descriptor in &self.descriptors {
            if descriptor.is_bound() {
                descriptor.unbind();
                count += 1;
            }
        }
        count
    }
}

/// Prefix-match a probe (as per-byte lowercase hex tokens) against a
/// manifest magic pattern.
fn magic_matches(hex: &[String], pattern: &str) -> bool {
    let tokens: Vec<&str> = pattern.split_whitespace().collect();

    if tokens.is_empty() || tokens.len() > hex.len() {
        return false;
    }
    tokens
        .iter()
        .zip(hex)
        .all(|(token, byte)| *token == "??" || *token == byte)
}

/// Find a codec by file extension in the current thread's registry.
pub fn codec_by_extension(extension: &str) -> Result<Rc<CodecDescriptor>, MarlinError> {
    context::with_context(|ctx| ctx.registry.find_by_extension(extension))
}

/// Find a codec by MIME type in the current thread's registry.
pub fn codec_by_mime_type(mime: &str) -> Result<Rc<CodecDescriptor>, MarlinError> {
    context::with_context(|ctx| ctx.registry.find_by_mime_type(mime))
}

/// Find a codec by the extension of `path`.
pub fn codec_by_path(path: &Path) -> Result<Rc<CodecDescriptor>, MarlinError> {
    context::with_context(|ctx| ctx.registry.find_by_path(path))
}

/// Find a codec by the magic number at the start of `io`.
pub fn codec_by_magic(io: &mut dyn IoStream) -> Result<Rc<CodecDescriptor>, MarlinError> {
    context::with_context(|ctx| ctx.registry.find_by_magic(io))
}

/// Find a codec by the magic number at the start of a memory buffer.
pub fn codec_by_magic_from_memory(data: &[u8]) -> Result<Rc<CodecDescriptor>, MarlinError> {
    let mut io = MemoryReader::new(data);
    codec_by_magic(&mut io)
}

/// Find a codec for `path`, preferring its magic number over its
/// extension.
pub fn codec_by_path_with_magic(path: &Path) -> Result<Rc<CodecDescriptor>, MarlinError> {
    context::with_context(|ctx| ctx.registry.find_by_path_with_magic(path))
}

/// All codecs known to the current thread, in registry order.
pub fn codec_list() -> Result<Vec<Rc<CodecDescriptor>>, MarlinError> {
    context::with_context(|ctx| Ok(ctx.registry.descriptors().to_vec()))
}
