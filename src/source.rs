//! Byte-source collaborators (spec §6 Byte-source interface).
//!
//! A [`ByteSource`] is the one seam between the driver and wherever bytes
//! actually come from. It has a single operation: hand back the next
//! chunk, or signal end of stream. Implementations own whatever resource
//! backs them (a file handle, a reader) and release it on drop, same as
//! any other Rust value — there is no separate `close()`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Error;

/// Supplies the driver with successive chunks of input.
///
/// A chunk may split any multi-byte construct at any position, including
/// inside a string, a number, or a `\uXXXX` escape — the lexer is built
/// to tolerate this (spec §3 Byte chunk).
pub trait ByteSource {
    /// Returns the next non-empty chunk, or `Ok(None)` at end of stream.
    /// A source must never return `Ok(Some(chunk))` with an empty chunk.
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

/// A source that serves an in-memory buffer, split into chunks of a
/// configurable size. Used directly for small documents, and with a
/// small chunk size in tests exercising chunk-boundary invariance.
pub struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
    chunk_size: usize,
}

impl<'a> SliceSource<'a> {
    /// Serves the whole slice as a single chunk.
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            offset: 0,
            chunk_size: data.len().max(1),
        }
    }

    /// Serves the slice split into chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(data: &'a [u8], chunk_size: usize) -> Self {
        SliceSource {
            data,
            offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.offset >= self.data.len() {
            return Ok(None);
        }
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = self.data[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(chunk))
    }
}

/// A source backed by any [`Read`] implementation, pulling up to
/// `buffer_size` bytes per call.
pub struct ReaderSource<R> {
    reader: R,
    buffer_size: usize,
    offset: usize,
}

impl<R: Read> ReaderSource<R> {
    /// Wraps `reader`, reading in 64 KiB chunks.
    pub fn new(reader: R) -> Self {
        ReaderSource {
            reader,
            buffer_size: 64 * 1024,
            offset: 0,
        }
    }

    /// Wraps `reader`, reading in chunks of at most `buffer_size` bytes.
    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        ReaderSource {
            reader,
            buffer_size: buffer_size.max(1),
            offset: 0,
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    self.offset += n;
                    return Ok(Some(buf));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::Io {
                        offset: self.offset,
                        source: e,
                    })
                }
            }
        }
    }
}

/// A source backed by an open file. Opening (and later closing, via
/// `Drop`) is plain RAII — there is no explicit release step.
pub struct FileSource {
    inner: ReaderSource<File>,
}

impl FileSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::Io {
            offset: 0,
            source: e,
        })?;
        Ok(FileSource {
            inner: ReaderSource::new(file),
        })
    }
}

impl ByteSource for FileSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.inner.read_chunk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_single_chunk() {
        let data = b"hello";
        let mut src = SliceSource::new(data);
        assert_eq!(src.read_chunk().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), None);
    }

    #[test]
    fn slice_source_splits_into_chunks() {
        let data = b"abcdefg";
        let mut src = SliceSource::with_chunk_size(data, 3);
        assert_eq!(src.read_chunk().unwrap(), Some(b"abc".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), Some(b"def".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), Some(b"g".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), None);
    }

    #[test]
    fn reader_source_reads_cursor() {
        let cursor = std::io::Cursor::new(b"xyz".to_vec());
        let mut src = ReaderSource::with_buffer_size(cursor, 2);
        assert_eq!(src.read_chunk().unwrap(), Some(b"xy".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), Some(b"z".to_vec()));
        assert_eq!(src.read_chunk().unwrap(), None);
    }

    #[test]
    fn empty_slice_yields_no_chunks() {
        let mut src = SliceSource::new(b"");
        assert_eq!(src.read_chunk().unwrap(), None);
    }
}
