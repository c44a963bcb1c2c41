/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! I/O streams backed by OS files

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use log::trace;

use crate::errors::MarlinError;
use crate::io::{IoStream, SeekFrom};

/// A buffered read-only stream over an OS file.
pub struct FileReader {
    inner: BufReader<File>
}

impl FileReader {
    /// Open `path` for reading.
    ///
    /// Fails with [`MarlinError::OpenFile`] when the file cannot be
    /// opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileReader, MarlinError> {
        trace!("Opening '{}' for reading", path.as_ref().display());

        let file = File::open(path).map_err(MarlinError::OpenFile)?;
        Ok(FileReader {
            inner: BufReader::new(file)
        })
    }
}

impl IoStream for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MarlinError> {
        self.inner.read(buf).map_err(|_| MarlinError::ReadIo)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, MarlinError> {
        Err(MarlinError::UnsupportedIoOperation("write"))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError> {
        self.inner.seek(pos).map_err(|_| MarlinError::SeekIo)
    }

    fn tell(&mut self) -> Result<u64, MarlinError> {
        self.inner
            .stream_position()
            .map_err(|_| MarlinError::SeekIo)
    }

    fn flush(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }

    fn eof(&mut self) -> Result<bool, MarlinError> {
        // may cost a syscall, same trade-off the buffered reader makes
        self.inner
            .fill_buf()
            .map(|b| b.is_empty())
            .map_err(|_| MarlinError::ReadIo)
    }
}

/// A buffered write-only stream over an OS file.
///
/// The target file is created if missing and truncated otherwise. Seeking
/// past the end is allowed; the file extends on the next write.
pub struct FileWriter {
    inner: BufWriter<File>
}

impl FileWriter {
    /// Open `path` for writing, creating or truncating it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<FileWriter, MarlinError> {
        trace!("Opening '{}' for writing", path.as_ref().display());

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(MarlinError::OpenFile)?;

        Ok(FileWriter {
            inner: BufWriter::new(file)
        })
    }
}

impl IoStream for FileWriter {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, MarlinError> {
        Err(MarlinError::UnsupportedIoOperation("read"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, MarlinError> {
        self.inner.write(buf).map_err(|_| MarlinError::WriteIo)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError> {
        self.inner.seek(pos).map_err(|_| MarlinError::SeekIo)
    }

    fn tell(&mut self) -> Result<u64, MarlinError> {
        self.inner
            .stream_position()
            .map_err(|_| MarlinError::SeekIo)
    }

    fn flush(&mut self) -> Result<(), MarlinError> {
        self.inner.flush().map_err(|_| MarlinError::WriteIo)
    }

    fn eof(&mut self) -> Result<bool, MarlinError> {
        Ok(false)
    }
}
