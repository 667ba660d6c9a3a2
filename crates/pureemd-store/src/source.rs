//! Backing bytes for an open container.
//!
//! Read-only files are memory-mapped when the `mmap` feature is enabled, so
//! dataset payloads are served straight out of the page cache. Writable
//! files are read into memory: a mapping of a file that `flush` is about to
//! replace would pin the old inode (and fail outright on Windows).

use std::fs;
use std::io::{self, Read};
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

pub(crate) enum Source {
    /// No backing bytes: a new container, or one that has been closed.
    Empty,
    Memory(Vec<u8>),
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
}

impl Source {
    pub(crate) fn load(path: &Path, mmap: bool) -> io::Result<Self> {
        let mut file = fs::File::open(path)?;
        if let Some(mapped) = try_map(&file, mmap)? {
            return Ok(mapped);
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Source::Memory(data))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Empty => &[],
            Source::Memory(data) => data,
            #[cfg(feature = "mmap")]
            Source::Mapped(map) => map,
        }
    }

    pub(crate) fn is_mapped(&self) -> bool {
        match self {
            #[cfg(feature = "mmap")]
            Source::Mapped(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "mmap")]
fn try_map(file: &fs::File, mmap: bool) -> io::Result<Option<Source>> {
    // Zero-length files cannot be mapped on every platform.
    if !mmap || file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // SAFETY: read-only mapping. Concurrent modification of the file by
    // another process is outside the supported usage.
    let map = unsafe { Mmap::map(file)? };
    Ok(Some(Source::Mapped(map)))
}

#[cfg(not(feature = "mmap"))]
fn try_map(_file: &fs::File, _mmap: bool) -> io::Result<Option<Source>> {
    Ok(None)
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Source::Empty => "empty",
            Source::Memory(_) => "memory",
            #[cfg(feature = "mmap")]
            Source::Mapped(_) => "mmap",
        };
        f.debug_struct("Source")
            .field("kind", &kind)
            .field("len", &self.as_bytes().len())
            .finish()
    }
}
