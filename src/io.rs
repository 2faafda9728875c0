//! Low-level file and stream helpers.
//!
//! Files are read whole into memory; binary files are opened through buffered
//! handles. [`CountingReader`] and [`CountingWriter`] track the exact number of
//! bytes that crossed them, which lets callers verify that a sequence of tagged
//! records consumed the stream completely.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{FactoriaError, Result};

/// Returns the content of the whole file as a string.
pub fn file_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| with_context(e, format!("failed to open file '{}'", path.display())))
}

/// Writes `content` to `path`, truncating any existing file.
pub fn string_to_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}

/// Opens a file for buffered binary reading.
pub fn open_binary(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        with_context(e, format!("failed to open '{}' for binary reading", path.display()))
    })?;
    Ok(BufReader::new(file))
}

/// Creates (or truncates) a file for buffered binary writing.
pub fn create_binary(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        with_context(e, format!("failed to open '{}' for binary writing", path.display()))
    })?;
    Ok(BufWriter::new(file))
}

/// Keeps the error kind but prefixes the message with the file being accessed.
fn with_context(err: io::Error, context: String) -> FactoriaError {
    FactoriaError::Io(Arc::new(io::Error::new(err.kind(), format!("{context}: {err}"))))
}

/// A reader adapter that records how many bytes have been consumed.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> CountingReader<R> {
    /// Wraps `inner`, starting the count at zero.
    pub fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Bytes read through this adapter so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Returns true when the underlying reader has no bytes left.
    ///
    /// This performs a one-byte probe, so it must only be used once the caller is
    /// done reading records.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        let mut probe = [0u8; 1];
        Ok(self.inner.read(&mut probe)? == 0)
    }

    /// Unwraps the adapter.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

/// A writer adapter that records the current output offset.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    current_offset: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wraps `inner`, starting at offset zero.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            current_offset: 0,
        }
    }

    /// Returns the current output position.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Unwraps the adapter.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.current_offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
