/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Status codes shared by the whole marlin workspace
//!
//! Every public entry point in the host library and in the codecs reports
//! failures through [`MarlinError`]. There are no side channels; diagnostic
//! detail that does not fit the status value is logged instead.

use std::collections::TryReserveError;
use std::fmt::{Debug, Formatter};

use crate::compression::Compression;
use crate::pixel_format::PixelFormat;

/// The single error taxonomy of the library.
///
/// [`MarlinError::NoMoreFrames`] is a sentinel rather than a true error:
/// codecs report it when a load operation runs past the last frame and the
/// driver consumes it to terminate iteration.
pub enum MarlinError {
    /// An argument did not satisfy a documented precondition
    InvalidArgument(&'static str),
    /// The stream does not implement the requested capability
    UnsupportedIoOperation(&'static str),
    /// A read failed or could not be satisfied in full
    ReadIo,
    /// A write failed or could not be satisfied in full
    WriteIo,
    /// A seek failed or targeted an unreachable position
    SeekIo,
    /// The end of a bounded stream was reached
    IoEof,
    /// A file could not be opened
    OpenFile(std::io::Error),
    /// An allocation was refused by the allocator
    OutOfMemory,
    /// The file contents contradict its own headers
    BrokenImage(String),
    /// The pixel format is not supported by the operation
    UnsupportedPixelFormat(PixelFormat),
    /// The compression is not supported by the codec
    UnsupportedCompression(Compression),
    /// Width or height is zero or overflows an addressable buffer
    IncorrectImageDimensions,
    /// The I/O stream is not usable for this operation
    InvalidIo(&'static str),
    /// No frames are left in the stream, consumed by the driver
    NoMoreFrames,
    /// No registered codec matches the query
    CodecNotFound,
    /// The codec module could not be bound
    CannotLoadCodec(String),
    /// The codec module lacks a required entry point
    MissingEntryPoint(&'static str),
    /// The codec declares an ABI layout this host does not speak
    UnsupportedCodecLayout(u32),
    /// The codec's underlying implementation reported a failure
    UnderlyingCodec(String),
    /// The operation is recognized but not implemented
    NotImplemented
}

impl Debug for MarlinError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(what) => {
                writeln!(f, "Invalid argument: {what}")
            }
            Self::UnsupportedIoOperation(op) => {
                writeln!(f, "The I/O stream does not support {op}")
            }
            Self::ReadIo => writeln!(f, "Failed to read from the I/O stream"),
            Self::WriteIo => writeln!(f, "Failed to write to the I/O stream"),
            Self::SeekIo => writeln!(f, "Failed to seek the I/O stream"),
            Self::IoEof => writeln!(f, "Reached the end of the I/O stream"),
            Self::OpenFile(err) => writeln!(f, "Cannot open file: {err}"),
            Self::OutOfMemory => writeln!(f, "Out of memory"),
            Self::BrokenImage(why) => writeln!(f, "Broken image: {why}"),
            Self::UnsupportedPixelFormat(fmt) => {
                writeln!(f, "Unsupported pixel format {}", fmt.as_str())
            }
            Self::UnsupportedCompression(c) => {
                writeln!(f, "Unsupported compression {}", c.as_str())
            }
            Self::IncorrectImageDimensions => writeln!(f, "Incorrect image dimensions"),
            Self::InvalidIo(why) => writeln!(f, "Invalid I/O stream: {why}"),
            Self::NoMoreFrames => writeln!(f, "No more frames in this stream"),
            Self::CodecNotFound => writeln!(f, "No codec matches the query"),
            Self::CannotLoadCodec(name) => writeln!(f, "Cannot load codec '{name}'"),
            Self::MissingEntryPoint(entry) => {
                writeln!(f, "Codec is missing the '{entry}' entry point")
            }
            Self::UnsupportedCodecLayout(layout) => {
                writeln!(f, "Codec layout version {layout} is not supported")
            }
            Self::UnderlyingCodec(why) => writeln!(f, "Underlying codec failure: {why}"),
            Self::NotImplemented => writeln!(f, "Operation is not implemented")
        }
    }
}

impl From<TryReserveError> for MarlinError {
    fn from(_: TryReserveError) -> Self {
        MarlinError::OutOfMemory
    }
}

impl MarlinError {
    /// Return true if this status is the end-of-iteration sentinel.
    pub const fn is_no_more_frames(&self) -> bool {
        matches!(self, MarlinError::NoMoreFrames)
    }
}
