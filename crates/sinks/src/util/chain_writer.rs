//! Chain writers for rotated output files
//!
//! A [`ChainWriter`] is a factory that wraps a freshly opened file with the
//! buffering/compression strategy of one output format. The wrapped handle is
//! a [`ChainWrite`], owned by the rotating sink for the lifetime of one bucket.
//!
//! # Available Writers
//!
//! - `GzipWriter` - gzip compressed output (`.gz`), one gzip member per open
//! - `PlainTextWriter` - buffered text output (`.jsonl`), no compression
//!
//! # Gzip members
//!
//! The sink opens files in append mode, so reopening a bucket's file (process
//! restart within the same hour, or reopen after a write failure) appends a
//! second gzip member. The result is a valid multi-member gzip file, which
//! `gzip -d` and `flate2::read::MultiGzDecoder` read in full. Decoders that
//! stop after the first member only see records written before the reopen.
//!
//! # Example
//!
//! ```ignore
//! use std::fs::File;
//! use chirp_sinks::util::{ChainWriter, GzipWriter};
//!
//! let writer = GzipWriter::default();
//! let file = File::options().create(true).append(true).open("2024.01.01_09.gz")?;
//! let mut chain = writer.wrap(file)?;
//!
//! chain.write_all(b"{\"id\":1}\n")?;
//! chain.finish()?;
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Default buffer size for writers (64KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default gzip compression level (same as the `gzip` tool)
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Trait for pluggable chain writers
///
/// Implementations wrap a file and provide buffered writing with optional
/// compression. The writer owns the underlying file and handles flushing.
pub trait ChainWriter: Send + Sync {
    /// Wrap a file with this writer's buffering/compression strategy
    fn wrap(&self, file: File) -> io::Result<Box<dyn ChainWrite>>;

    /// Get the file extension for this writer type
    fn file_extension(&self) -> &'static str;
}

/// Trait for the actual write operations
///
/// Dropping a `ChainWrite` without calling [`ChainWrite::finish`] still
/// writes the compression trailer and flushes on a best-effort basis, but
/// errors are lost. Call `finish` to observe them.
pub trait ChainWrite: Write + Send {
    /// Flush all buffered data to the underlying file
    fn flush_all(&mut self) -> io::Result<()>;

    /// Finish writing and close the writer (for compression finalization)
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Get the number of uncompressed bytes accepted by this writer
    fn bytes_written(&self) -> u64;
}

// ============================================================================
// GzipWriter - gzip compressed output
// ============================================================================

/// Gzip compressed writer
///
/// Output is byte-compatible with what the `gzip` tool expects: a standard
/// gzip member with header, deflate stream and CRC32/size trailer.
#[derive(Debug, Clone)]
pub struct GzipWriter {
    buffer_size: usize,
    level: Compression,
}

impl GzipWriter {
    /// Create a new gzip writer with the specified buffer size and level (0-9)
    pub fn new(buffer_size: usize, level: u32) -> Self {
        Self {
            buffer_size,
            level: Compression::new(level),
        }
    }

    /// Compression level used for new members
    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for GzipWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_GZIP_LEVEL)
    }
}

impl ChainWriter for GzipWriter {
    fn wrap(&self, file: File) -> io::Result<Box<dyn ChainWrite>> {
        let buf_writer = BufWriter::with_capacity(self.buffer_size, file);
        Ok(Box::new(GzipChain {
            encoder: GzEncoder::new(buf_writer, self.level),
            bytes_written: 0,
        }))
    }

    fn file_extension(&self) -> &'static str {
        ".gz"
    }
}

struct GzipChain {
    encoder: GzEncoder<BufWriter<File>>,
    bytes_written: u64,
}

impl Write for GzipChain {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl ChainWrite for GzipChain {
    fn flush_all(&mut self) -> io::Result<()> {
        self.encoder.flush()?;
        self.encoder.get_mut().flush()
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        // Trailer goes into the BufWriter, which finish() does not flush
        let mut buf_writer = self.encoder.finish()?;
        buf_writer.flush()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

// ============================================================================
// PlainTextWriter - Buffered text output
// ============================================================================

/// Plain text writer with buffering (no compression)
#[derive(Debug, Clone)]
pub struct PlainTextWriter {
    buffer_size: usize,
}

impl PlainTextWriter {
    /// Create a new plain text writer with the specified buffer size
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Default for PlainTextWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl ChainWriter for PlainTextWriter {
    fn wrap(&self, file: File) -> io::Result<Box<dyn ChainWrite>> {
        Ok(Box::new(PlainTextChain {
            writer: BufWriter::with_capacity(self.buffer_size, file),
            bytes_written: 0,
        }))
    }

    fn file_extension(&self) -> &'static str {
        ".jsonl"
    }
}

struct PlainTextChain {
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl Write for PlainTextChain {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl ChainWrite for PlainTextChain {
    fn flush_all(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.writer.flush()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
#[path = "chain_writer_test.rs"]
mod chain_writer_test;
