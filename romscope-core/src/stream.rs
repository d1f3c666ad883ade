//! The byte-stream abstraction every parser reads through.
//!
//! A [`ByteStream`] is a seekable, readable view with its own cursor. `dup`
//! produces an independent cursor over the same underlying storage, so two
//! duplicated handles may be read from different threads without affecting
//! each other's position.
//!
//! Reads past the end are short (or zero), never an error.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use romscope_crypto::EncryptionStatus;

use crate::RomError;

/// Seek/read/size/duplicate contract over some underlying storage.
pub trait ByteStream: Send {
    fn is_open(&self) -> bool;

    /// Read up to `buf.len()` bytes from the current position. Returns the
    /// number of bytes read; 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError>;

    /// Move the cursor to an absolute position. Seeking past the end is
    /// allowed; subsequent reads return 0.
    fn seek(&mut self, pos: u64) -> Result<(), RomError>;

    fn tell(&self) -> u64;

    fn size(&self) -> u64;

    /// Release the underlying storage. Safe to call more than once.
    fn close(&mut self);

    /// An independent handle over the same storage, positioned at 0.
    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError>;

    fn seek_and_read(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize, RomError> {
        self.seek(pos)?;
        self.read(buf)
    }

    /// Fill `buf` completely from `pos`, or fail with [`RomError::Truncated`].
    fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), RomError> {
        self.seek(pos)?;
        let mut done = 0;
        while done < buf.len() {
            let n = self.read(&mut buf[done..])?;
            if n == 0 {
                return Err(RomError::truncated(buf.len() as u64, done as u64));
            }
            done += n;
        }
        Ok(())
    }

    fn read_vec_at(&mut self, pos: u64, len: usize) -> Result<Vec<u8>, RomError> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read up to `len` bytes from `pos`, truncating at end of stream.
    fn read_up_to(&mut self, pos: u64, len: usize) -> Result<Vec<u8>, RomError> {
        let mut buf = vec![0u8; len];
        self.seek(pos)?;
        let mut done = 0;
        while done < len {
            let n = self.read(&mut buf[done..])?;
            if n == 0 {
                break;
            }
            done += n;
        }
        buf.truncate(done);
        Ok(buf)
    }
}

/// A [`ByteStream`] that is a window into a larger container, possibly
/// decrypted on the fly.
pub trait PartitionStream: ByteStream {
    /// Declared size of the region.
    fn region_size(&self) -> u64;

    /// Bytes of the region actually populated with data.
    fn used_region_size(&self) -> u64 {
        self.region_size()
    }

    fn encryption_status(&self) -> EncryptionStatus {
        EncryptionStatus::Ok
    }
}

/// Clamp a read of `want` bytes at `pos` to a region of `len` bytes.
pub fn clamp_read(pos: u64, want: usize, len: u64) -> usize {
    if pos >= len {
        0
    } else {
        want.min((len - pos).min(usize::MAX as u64) as usize)
    }
}

// ---------------------------------------------------------------------------
// File-backed stream
// ---------------------------------------------------------------------------

/// Positional reads over a shared file handle.
#[derive(Debug)]
pub struct FileStream {
    file: Option<Arc<File>>,
    size: u64,
    pos: u64,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Some(Arc::new(file)),
            size,
            pos: 0,
        })
    }

    #[cfg(unix)]
    fn read_at(file: &File, buf: &mut [u8], pos: u64) -> std::io::Result<usize> {
        use std::os::unix::fs::FileExt;
        file.read_at(buf, pos)
    }

    #[cfg(windows)]
    fn read_at(file: &File, buf: &mut [u8], pos: u64) -> std::io::Result<usize> {
        use std::os::windows::fs::FileExt;
        file.seek_read(buf, pos)
    }
}

impl ByteStream for FileStream {
    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        let file = self.file.as_ref().ok_or(RomError::NotOpen)?;
        let want = clamp_read(self.pos, buf.len(), self.size);
        if want == 0 {
            return Ok(0);
        }
        let n = Self::read_at(file, &mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<(), RomError> {
        if self.file.is_none() {
            return Err(RomError::NotOpen);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        let file = self.file.clone().ok_or(RomError::NotOpen)?;
        Ok(Box::new(Self {
            file: Some(file),
            size: self.size,
            pos: 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory stream
// ---------------------------------------------------------------------------

/// A stream over a shared, immutable byte buffer.
#[derive(Debug, Clone)]
pub struct MemStream {
    data: Option<Arc<[u8]>>,
    pos: u64,
}

impl MemStream {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: Some(data.into()),
            pos: 0,
        }
    }
}

impl ByteStream for MemStream {
    fn is_open(&self) -> bool {
        self.data.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        let data = self.data.as_ref().ok_or(RomError::NotOpen)?;
        let n = clamp_read(self.pos, buf.len(), data.len() as u64);
        if n == 0 {
            return Ok(0);
        }
        // n > 0 means pos < len, so pos fits in usize
        let start = self.pos as usize;
        let Some(src) = data.get(start..start + n) else {
            return Ok(0);
        };
        buf[..n].copy_from_slice(src);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<(), RomError> {
        if self.data.is_none() {
            return Err(RomError::NotOpen);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.data.as_ref().map_or(0, |d| d.len() as u64)
    }

    fn close(&mut self) {
        self.data = None;
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        let data = self.data.clone().ok_or(RomError::NotOpen)?;
        Ok(Box::new(Self {
            data: Some(data),
            pos: 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// Unencrypted window
// ---------------------------------------------------------------------------

/// A plain sub-range `[base, base + len)` of a parent stream. Position 0 is
/// the start of the window.
pub struct WindowStream {
    parent: Option<Box<dyn ByteStream>>,
    base: u64,
    len: u64,
    pos: u64,
}

impl WindowStream {
    /// Wrap `parent`. The window is clipped to the parent's size.
    pub fn new(parent: Box<dyn ByteStream>, base: u64, len: u64) -> Result<Self, RomError> {
        if !parent.is_open() {
            return Err(RomError::NotOpen);
        }
        let available = parent.size().saturating_sub(base);
        Ok(Self {
            parent: Some(parent),
            base,
            len: len.min(available),
            pos: 0,
        })
    }
}

impl ByteStream for WindowStream {
    fn is_open(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.is_open())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
        let want = clamp_read(self.pos, buf.len(), self.len);
        if want == 0 {
            return Ok(0);
        }
        let n = parent.seek_and_read(self.base + self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<(), RomError> {
        if self.parent.is_none() {
            return Err(RomError::NotOpen);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn close(&mut self) {
        self.parent = None;
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        let parent = self.parent.as_ref().ok_or(RomError::NotOpen)?.dup()?;
        Ok(Box::new(Self {
            parent: Some(parent),
            base: self.base,
            len: self.len,
            pos: 0,
        }))
    }
}

impl PartitionStream for WindowStream {
    fn region_size(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
