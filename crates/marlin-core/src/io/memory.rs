/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! I/O streams backed by caller owned memory

use crate::errors::MarlinError;
use crate::io::{IoStream, SeekFrom};

fn resolve_seek(pos: SeekFrom, current: usize, len: usize) -> Result<usize, MarlinError> {
    let target = match pos {
        SeekFrom::Start(offset) => i128::from(offset),
        SeekFrom::Current(offset) => current as i128 + i128::from(offset),
        SeekFrom::End(offset) => len as i128 + i128::from(offset)
    };

    if target < 0 {
        return Err(MarlinError::SeekIo);
    }
    usize::try_from(target).map_err(|_| MarlinError::SeekIo)
}

/// A read-only stream over a borrowed byte slice.
pub struct MemoryReader<'a> {
    data:     &'a [u8],
    position: usize
}

impl<'a> MemoryReader<'a> {
    pub fn new(data: &'a [u8]) -> MemoryReader<'a> {
        MemoryReader { data, position: 0 }
    }
}

impl IoStream for MemoryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MarlinError> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        let n = remaining.len().min(buf.len());

        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, MarlinError> {
        Err(MarlinError::UnsupportedIoOperation("write"))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError> {
        let target = resolve_seek(pos, self.position, self.data.len())?;

        // read-only memory has nothing past the end to reach
        if target > self.data.len() {
            return Err(MarlinError::SeekIo);
        }
        self.position = target;
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> Result<u64, MarlinError> {
        Ok(self.position as u64)
    }

    fn flush(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }

    fn eof(&mut self) -> Result<bool, MarlinError> {
        Ok(self.position >= self.data.len())
    }
}

/// A write-only stream over a borrowed fixed-size buffer.
///
/// Writing past the end of the buffer fails with [`MarlinError::IoEof`].
pub struct MemoryWriter<'a> {
    data:     &'a mut [u8],
    position: usize
}

impl<'a> MemoryWriter<'a> {
    pub fn new(data: &'a mut [u8]) -> MemoryWriter<'a> {
        MemoryWriter { data, position: 0 }
    }
}

impl IoStream for MemoryWriter<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, MarlinError> {
        Err(MarlinError::UnsupportedIoOperation("read"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, MarlinError> {
        if self.position >= self.data.len() && !buf.is_empty() {
            return Err(MarlinError::IoEof);
        }
        let n = (self.data.len() - self.position).min(buf.len());

        self.data[self.position..self.position + n].copy_from_slice(&buf[..n]);
        self.position += n;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError> {
        let target = resolve_seek(pos, self.position, self.data.len())?;

        if target > self.data.len() {
            return Err(MarlinError::SeekIo);
        }
        self.position = target;
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> Result<u64, MarlinError> {
        Ok(self.position as u64)
    }

    fn flush(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }

    fn eof(&mut self) -> Result<bool, MarlinError> {
        Ok(self.position >= self.data.len())
    }
}

/// A write-only stream pushing into a caller owned growable buffer.
///
/// Seeking past the current end is allowed; the gap is zero filled when
/// the next write lands.
pub struct MemoryGrowWriter<'a> {
    data:     &'a mut Vec<u8>,
    position: usize
}

impl<'a> MemoryGrowWriter<'a> {
    pub fn new(data: &'a mut Vec<u8>) -> MemoryGrowWriter<'a> {
        MemoryGrowWriter { data, position: 0 }
    }
}

impl IoStream for MemoryGrowWriter<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, MarlinError> {
        Err(MarlinError::UnsupportedIoOperation("read"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, MarlinError> {
        let end = self
            .position
            .checked_add(buf.len())
            .ok_or(MarlinError::OutOfMemory)?;

        if end > self.data.len() {
            self.data.try_reserve(end - self.data.len())?;
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(buf);
        self.position = end;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MarlinError> {
        self.position = resolve_seek(pos, self.position, self.data.len())?;
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> Result<u64, MarlinError> {
        Ok(self.position as u64)
    }

    fn flush(&mut self) -> Result<(), MarlinError> {
        Ok(())
    }

    fn eof(&mut self) -> Result<bool, MarlinError> {
        Ok(self.position >= self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_tracks_cursor() {
        let data = [9_u8, 8, 7, 6, 5];
        let mut stream = MemoryReader::new(&data);
        let mut buf = [0_u8; 2];

        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(stream.tell().unwrap(), 2);
        assert_eq!(stream.seek(SeekFrom::End(-1)).unwrap(), 4);
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn reader_rejects_seek_past_end() {
        let data = [0_u8; 4];
        let mut stream = MemoryReader::new(&data);

        assert!(matches!(
            stream.seek(SeekFrom::Start(5)),
            Err(MarlinError::SeekIo)
        ));
        assert!(matches!(
            stream.seek(SeekFrom::Current(-1)),
            Err(MarlinError::SeekIo)
        ));
    }

    #[test]
    fn bounded_writer_reports_eof_when_full() {
        let mut sink = [0_u8; 3];
        let mut stream = MemoryWriter::new(&mut sink);

        assert_eq!(stream.write(&[1, 2, 3]).unwrap(), 3);
        assert!(matches!(stream.write(&[4]), Err(MarlinError::IoEof)));
        assert_eq!(sink, [1, 2, 3]);
    }

    #[test]
    fn grow_writer_zero_fills_seek_gaps() {
        let mut sink = Vec::new();
        {
            let mut stream = MemoryGrowWriter::new(&mut sink);
            stream.strict_write(&[1, 2]).unwrap();
            stream.seek(SeekFrom::Start(4)).unwrap();
            stream.strict_write(&[5]).unwrap();
        }
        assert_eq!(sink, [1, 2, 0, 0, 5]);
    }
}
