/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per-thread host context
//!
//! Codec discovery and the registry are kept per thread: every thread
//! calls [`init_with_flags`] (or lets the first registry access run an
//! implicit default init) and [`finish`] before it exits. Loaded codec
//! descriptors are never shared across threads, so no locking is
//! involved anywhere in the host.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use marlin_core::errors::MarlinError;

use crate::codecs;
use crate::manifest::CodecManifest;
use crate::registry::{CodecDescriptor, Registry};

/// Name of the environment variable listing extra codec directories,
/// separated by `:` (or `;` on Windows).
pub const CODEC_PATH_ENV: &str = "MARLIN_CODECS_PATH";

/// Directory scanned on every init, fixed at compile time.
pub const DEFAULT_CODEC_DIR: &str = "/usr/lib/marlin/codecs";

/// Suffix of codec manifest files.
const MANIFEST_SUFFIX: &str = ".codec.info";

/// Behavior switches for [`init_with_flags`].
#[derive(Copy, Clone, Debug, Default)]
pub struct InitFlags {
    /// Bind every discovered codec eagerly instead of on first use
    pub preload_codecs: bool
}

pub(crate) struct Context {
    pub registry:   Registry,
    pub last_error: Option<String>
}

thread_local! {
    static CONTEXT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

impl Context {
    fn create(flags: InitFlags, extra_paths: &[&Path]) -> Context {
        let mut descriptors = codecs::builtin_descriptors();

        for dir in search_directories(extra_paths) {
            scan_directory(&dir, &mut descriptors);
        }

        let registry = Registry::build(descriptors);

        if flags.preload_codecs {
            for descriptor in registry.descriptors() {
                if let Err(err) = descriptor.bind() {
                    warn!("Cannot preload codec '{}': {:?}", descriptor.name(), err);
                }
            }
        }

        Context {
            registry,
            last_error: None
        }
    }
}

/// Initialize this thread's context with default flags.
pub fn init() -> Result<(), MarlinError> {
    init_with_flags(InitFlags::default(), &[])
}

/// Initialize this thread's context, discovering codecs in the default
/// directory, the [`CODEC_PATH_ENV`] directories and `extra_paths`.
///
/// Calling this on an initialized thread is a cheap no-op; call
/// [`finish`] first to re-run discovery with different paths.
pub fn init_with_flags(flags: InitFlags, extra_paths: &[&Path]) -> Result<(), MarlinError> {
    CONTEXT.with(|cell| {
        let mut slot = cell.borrow_mut();

        if slot.is_some() {
            trace!("Context is already initialized on this thread");
            return Ok(());
        }
        *slot = Some(Context::create(flags, extra_paths));
        Ok(())
    })
}

/// Tear down this thread's context, releasing every codec binding.
///
/// Does nothing when the thread never initialized a context.
pub fn finish() {
    info!("Finish");

    CONTEXT.with(|cell| {
        if let Some(context) = cell.borrow_mut().take() {
            let unbound = context.registry.unbind_all();
            debug!("Released codecs: {unbound}");
        }
    });
}

/// Drop every cached codec binding without discarding the registry.
pub fn unload_codecs() -> Result<(), MarlinError> {
    with_context(|ctx| {
        let unbound = ctx.registry.unbind_all();
        debug!("Unloaded codecs: {unbound}");
        Ok(())
    })
}

/// The diagnostic detail recorded for the last codec failure on this
/// thread, when there was one.
pub fn last_error() -> Option<String> {
    CONTEXT.with(|cell| {
        cell.borrow()
            .as_ref()
            .and_then(|ctx| ctx.last_error.clone())
    })
}

pub(crate) fn record_error(detail: String) {
    CONTEXT.with(|cell| {
        if let Some(ctx) = cell.borrow_mut().as_mut() {
            ctx.last_error = Some(detail);
        }
    });
}

/// Run `f` against this thread's context, creating it with default
/// flags when the caller skipped the explicit init.
pub(crate) fn with_context<R>(
    f: impl FnOnce(&mut Context) -> Result<R, MarlinError>
) -> Result<R, MarlinError> {
    CONTEXT.with(|cell| {
        let mut slot = cell.borrow_mut();

        if slot.is_none() {
            trace!("Implicitly initializing the context with default flags");
            *slot = Some(Context::create(InitFlags::default(), &[]));
        }
        f(slot.as_mut().unwrap())
    })
}

fn search_directories(extra_paths: &[&Path]) -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(DEFAULT_CODEC_DIR)];

    if let Ok(value) = std::env::var(CODEC_PATH_ENV) {
        let separator = if cfg!(windows) { ';' } else { ':' };

        for part in value.split(separator).filter(|p| !p.is_empty()) {
            dirs.push(PathBuf::from(part));
        }
    }

    dirs.extend(extra_paths.iter().map(PathBuf::from));
    dirs
}

/// Parse every manifest in `dir`, appending a descriptor per usable
/// manifest. Bad manifests are skipped, discovery never fails hard.
fn scan_directory(dir: &Path, descriptors: &mut Vec<CodecDescriptor>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            trace!("Codec directory '{}' is not readable", dir.display());
            return;
        }
    };

    debug!("Scanning codec directory '{}'", dir.display());

    for entry in entries.flatten() {
        let path = entry.path();
        let is_manifest = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX));

        if !is_manifest {
            continue;
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!("Cannot read manifest '{}': {err}", path.display());
                continue;
            }
        };

        match CodecManifest::parse(&text) {
            Ok(manifest) => {
                debug!("Discovered codec '{}'", manifest.name);

                let module = module_path_for(&path);
                descriptors.push(CodecDescriptor::new(manifest, module));
            }
            Err(err) => {
                warn!("Skipping manifest '{}': {:?}", path.display(), err);
            }
        }
    }
}

/// The codec module sitting next to its manifest: same stem, platform
/// library extension.
fn module_path_for(manifest_path: &Path) -> Option<PathBuf> {
    let name = manifest_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(MANIFEST_SUFFIX)?;

    let extension = if cfg!(windows) { "dll" } else { "so" };
    let module = manifest_path.with_file_name(format!("{stem}.{extension}"));

    module.exists().then_some(module)
}
