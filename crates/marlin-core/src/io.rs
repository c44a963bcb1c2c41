/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The polymorphic I/O stream consumed by all codecs
//!
//! Codecs never see concrete file handles or byte buffers, only the
//! [`IoStream`] capability interface. The host ships streams backed by OS
//! files and by caller owned memory; callers may implement the trait for
//! their own transports.
//!
//! A stream's lifetime is managed by whoever created it: the load/save
//! driver borrows a stream for the duration of one operation and never
//! closes it.

use log::error;

use crate::errors::MarlinError;

mod file;
mod memory;

pub use file::{FileReader, FileWriter};
pub use memory::{MemoryGrowWriter, MemoryReader, MemoryWriter};

/// Re-exported seek origin, shared with the standard library.
pub use std::io::SeekFrom;

/// A capability interface over a byte stream.
///
/// Operations a concrete stream cannot provide fail with
/// [`MarlinError::UnsupportedIoOperation`]; a read-only stream rejects
/// writes and vice versa.
///
/// Invariant: after any successful operation [`tell`](Self::tell) reports
/// the logical cursor position.
pub trait IoStream {
    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Partial reads are allowed; zero means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MarlinError>;

    /// Write up to `buf.len()` bytes, returning how many were written.
    fn write(&mut self, buf: &[u8]) -> Result<usize, MarlinError>;

    /// Move the cursor, returning the new position from the stream start.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError>;

    /// The current cursor position from the stream start.
    fn tell(&mut self) -> Result<u64, MarlinError>;

    /// Ensure buffered bytes have reached the underlying sink.
    fn flush(&mut self) -> Result<(), MarlinError>;

    /// Whether the stream can produce no further bytes.
    fn eof(&mut self) -> Result<bool, MarlinError>;

    /// Release whatever the stream factory acquired.
    ///
    /// The driver never calls this; closing is the stream owner's
    /// responsibility.
    fn close(&mut self) -> Result<(), MarlinError> {
        self.flush()
    }

    /// Read exactly `buf.len()` bytes or fail with
    /// [`MarlinError::ReadIo`].
    ///
    /// On failure the stream may have consumed bytes internally.
    fn strict_read(&mut self, buf: &mut [u8]) -> Result<(), MarlinError> {
        let mut filled = 0;

        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                0 => {
                    error!(
                        "Strict read wanted {} bytes but the stream held {filled}",
                        buf.len()
                    );
                    return Err(MarlinError::ReadIo);
                }
                n => filled += n
            }
        }
        Ok(())
    }

    /// Write exactly `buf.len()` bytes or fail with
    /// [`MarlinError::WriteIo`].
    fn strict_write(&mut self, buf: &[u8]) -> Result<(), MarlinError> {
        let mut written = 0;

        while written < buf.len() {
            match self.write(&buf[written..]) {
                Ok(0) => {
                    error!(
                        "Strict write wanted {} bytes but the stream took {written}",
                        buf.len()
                    );
                    return Err(MarlinError::WriteIo);
                }
                Ok(n) => written += n,
                // a bounded sink that filled up mid-write still short-wrote
                Err(MarlinError::IoEof) => {
                    error!(
                        "Strict write wanted {} bytes but the stream took {written}",
                        buf.len()
                    );
                    return Err(MarlinError::WriteIo);
                }
                Err(e) => return Err(e)
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_read_fails_on_short_stream() {
        let data = [1_u8, 2, 3];
        let mut stream = MemoryReader::new(&data);
        let mut buf = [0_u8; 4];

        assert!(matches!(
            stream.strict_read(&mut buf),
            Err(MarlinError::ReadIo)
        ));
    }

    #[test]
    fn strict_read_fills_the_buffer() {
        let data = [1_u8, 2, 3, 4];
        let mut stream = MemoryReader::new(&data);
        let mut buf = [0_u8; 4];

        stream.strict_read(&mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(stream.tell().unwrap(), 4);
        assert!(stream.eof().unwrap());
    }

    #[test]
    fn strict_write_fails_when_bounded_sink_fills() {
        let mut sink = [0_u8; 2];
        let mut stream = MemoryWriter::new(&mut sink);

        assert!(matches!(
            stream.strict_write(&[1, 2, 3]),
            Err(MarlinError::WriteIo)
        ));
    }
}
