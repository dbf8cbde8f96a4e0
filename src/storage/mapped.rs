use crate::error::{IndexError, Result};
use crate::utils::encoding::{get_fixed, read_varnum};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Read-only memory map of an index file.
///
/// Empty files cannot be mapped, so they are represented without a map and
/// read as an empty slice.
pub struct MappedFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: index files are replaced by rename, never rewritten in place.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes `[offset, offset + len)`, or a malformed-index error
    #[inline]
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes().get(offset..end))
            .ok_or_else(|| {
                IndexError::malformed(format!(
                    "{}: range {}+{} outside {} bytes",
                    self.path.display(),
                    offset,
                    len,
                    self.len()
                ))
            })
    }

    /// Big-endian value of `width` bytes at `offset`
    #[inline]
    pub fn read_fixed(&self, offset: usize, width: usize) -> Result<u64> {
        get_fixed(self.slice(offset, width)?, width)
    }

    /// VarNum at `*offset`, advancing it
    #[inline]
    pub fn read_varnum(&self, offset: &mut usize) -> Result<u32> {
        read_varnum(self.bytes(), offset)
    }
}
