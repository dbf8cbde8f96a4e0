use crate::error::{IndexError, Result};
use crate::utils::encoding::{decode_varnum, encode_varnum, get_fixed, put_fixed};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Seekable read/write access to a single backing file.
///
/// Reads and writes take an explicit byte offset and leave an internal cursor
/// just past the touched bytes, so a caller can position once and continue
/// with the `next_*`/`append_*` forms. Nothing is buffered beyond the OS.
pub struct RandomAccessStore {
    path: PathBuf,
    file: Option<File>,
    cursor: u64,
}

impl RandomAccessStore {
    /// Open `path` for reading and writing, creating it if missing
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            cursor: 0,
        })
    }

    /// Open an existing file read-only
    pub fn open_read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            cursor: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(IndexError::Closed)
    }

    /// Current file length in bytes
    pub fn length(&mut self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        self.cursor = offset + buf.len() as u64;
        Ok(())
    }

    /// Read a big-endian value of `width` bytes (1..=8) at `offset`
    pub fn read_fixed(&mut self, offset: u64, width: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf[..width])?;
        get_fixed(&buf[..width], width)
    }

    /// Read `len` raw bytes at `offset`
    pub fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read a VarNum at `offset`
    pub fn read_varnum(&mut self, offset: u64) -> Result<u32> {
        let mut head = [0u8; 5];
        self.read_exact_at(offset, &mut head[..1])?;
        let width = match head[0] >> 6 {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => 5,
        };
        if width > 1 {
            self.read_exact_at(offset + 1, &mut head[1..width])?;
        }
        let (value, consumed) = decode_varnum(&head[..width])?;
        self.cursor = offset + consumed as u64;
        Ok(value)
    }

    /// Read the VarNum at the cursor
    pub fn next_varnum(&mut self) -> Result<u32> {
        self.read_varnum(self.cursor)
    }

    /// Write the low `width` bytes of `value` big-endian at `offset`
    pub fn write_fixed(&mut self, offset: u64, value: u64, width: usize) -> Result<()> {
        let mut buf = Vec::with_capacity(width);
        put_fixed(&mut buf, value, width);
        self.write_bytes(offset, &buf)
    }

    /// Write a VarNum at `offset`, returning its encoded width
    pub fn write_varnum(&mut self, offset: u64, value: u32) -> Result<usize> {
        let mut buf = Vec::with_capacity(5);
        encode_varnum(value, &mut buf);
        self.write_bytes(offset, &buf)?;
        Ok(buf.len())
    }

    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        self.cursor = offset + bytes.len() as u64;
        Ok(())
    }

    /// Write a VarNum at the cursor
    pub fn append_varnum(&mut self, value: u32) -> Result<usize> {
        self.write_varnum(self.cursor, value)
    }

    /// Drop everything past `len`
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file()?.set_len(len)?;
        self.cursor = self.cursor.min(len);
        Ok(())
    }

    /// Flush to disk and release the handle; later calls return `Closed`
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}
