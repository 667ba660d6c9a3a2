//! Error types for the container store.

use std::fmt;

use crate::types::DType;

/// Errors that can occur when reading, mutating, or persisting a container.
#[derive(Debug)]
pub enum StoreError {
    /// I/O error from the filesystem.
    Io(std::io::Error),
    /// The HDF5 superblock signature was not found at any candidate offset.
    SignatureNotFound,
    /// A structure carries a version this crate does not read.
    UnsupportedVersion {
        /// Which structure (superblock, object header, ...).
        what: &'static str,
        /// The version found.
        version: u8,
    },
    /// Unexpected end of data while decoding.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Metadata checksum mismatch.
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// A structure did not start with its 4-byte signature (`OHDR`, `TREE`, ...).
    InvalidSignature(&'static str),
    /// Superblock offset or length size outside 2, 4, or 8.
    InvalidFieldSize(u8),
    /// A file address does not fit in memory on this platform.
    InvalidAddress(u64),
    /// An encoded tag byte did not name a known class or type.
    UnknownTag {
        /// What was being decoded.
        what: &'static str,
        /// The offending byte.
        tag: u8,
    },
    /// A link or attribute name was not valid UTF-8.
    InvalidUtf8,
    /// The file uses an HDF5 feature this adapter does not implement.
    Unsupported(String),
    /// A malformed path or child name.
    InvalidPath(String),
    /// Nothing exists at the given path.
    NotFound(String),
    /// The object at the given path is not a group.
    NotAGroup(String),
    /// The object at the given path is not a dataset.
    NotADataset(String),
    /// A child with this name already exists.
    AlreadyExists(String),
    /// Element bytes do not match `product(shape) * dtype.size()`, or that
    /// product does not fit in `usize` (reported as `expected == usize::MAX`).
    PayloadSize {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },
    /// Requested element type differs from the stored one.
    DTypeMismatch {
        /// The type that was requested.
        expected: DType,
        /// The stored type.
        actual: DType,
    },
    /// Mutation attempted on a container opened read-only.
    ReadOnly,
    /// The container has already been closed.
    Closed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::SignatureNotFound => write!(f, "HDF5 signature not found"),
            StoreError::UnsupportedVersion { what, version } => {
                write!(f, "unsupported {what} version: {version}")
            }
            StoreError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            StoreError::ChecksumMismatch { expected, computed } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#010x}, computed {computed:#010x}"
                )
            }
            StoreError::InvalidSignature(sig) => write!(f, "missing {sig} signature"),
            StoreError::InvalidFieldSize(n) => write!(f, "invalid offset/length size: {n}"),
            StoreError::InvalidAddress(a) => write!(f, "file address out of range: {a:#x}"),
            StoreError::UnknownTag { what, tag } => write!(f, "unknown {what} {tag:#04x}"),
            StoreError::InvalidUtf8 => write!(f, "invalid UTF-8 in link or attribute name"),
            StoreError::Unsupported(what) => write!(f, "unsupported HDF5 feature: {what}"),
            StoreError::InvalidPath(p) => write!(f, "invalid path: {p:?}"),
            StoreError::NotFound(p) => write!(f, "no such object: {p}"),
            StoreError::NotAGroup(p) => write!(f, "not a group: {p}"),
            StoreError::NotADataset(p) => write!(f, "not a dataset: {p}"),
            StoreError::AlreadyExists(p) => write!(f, "already exists: {p}"),
            StoreError::PayloadSize { expected, actual } if *expected == usize::MAX => {
                write!(f, "dataset extents overflow (payload holds {actual} bytes)")
            }
            StoreError::PayloadSize { expected, actual } => {
                write!(f, "payload size mismatch: expected {expected} bytes, got {actual}")
            }
            StoreError::DTypeMismatch { expected, actual } => {
                write!(f, "dtype mismatch: requested {expected}, stored {actual}")
            }
            StoreError::ReadOnly => write!(f, "container is opened read-only"),
            StoreError::Closed => write!(f, "container is closed"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StoreError::NotADataset("/data/x".into()).to_string(),
            "not a dataset: /data/x"
        );
        assert_eq!(
            StoreError::UnexpectedEof {
                expected: 8,
                available: 3
            }
            .to_string(),
            "unexpected EOF: need 8 bytes, have 3"
        );
        assert_eq!(
            StoreError::DTypeMismatch {
                expected: DType::F64,
                actual: DType::U16
            }
            .to_string(),
            "dtype mismatch: requested f64, stored u16"
        );
        assert_eq!(
            StoreError::UnsupportedVersion {
                what: "superblock",
                version: 9
            }
            .to_string(),
            "unsupported superblock version: 9"
        );
        assert_eq!(
            StoreError::PayloadSize {
                expected: usize::MAX,
                actual: 16
            }
            .to_string(),
            "dataset extents overflow (payload holds 16 bytes)"
        );
    }

    #[test]
    fn io_error_has_source() {
        use std::error::Error as _;
        let err = StoreError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
        assert!(StoreError::Closed.source().is_none());
    }
}
