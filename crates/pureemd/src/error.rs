//! Error types for the EMD layer.

use pureemd_store::StoreError;

/// Errors that can occur when reading or writing EMD files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing container could not be opened.
    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: StoreError,
    },

    /// The target is not an EMD group, or an argument has the wrong form.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Data rank or extents disagree with the dim vectors.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The write target is occupied and overwriting was not requested.
    #[error("'{label}' already exists in '{parent}'")]
    AlreadyExists { label: String, parent: String },

    /// No layout policy knows how to name the dataset of this group.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// Creating a group's children failed partway.
    #[error("failed to write '{path}': {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Mutation attempted on a file opened read-only.
    #[error("EMD file is opened read-only")]
    ReadOnly,

    /// Position past the end of the discovered-groups list.
    #[error("no EMD group at index {index} ({count} discovered)")]
    NoSuchGroup { index: usize, count: usize },

    /// Any other failure reported by the container store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// A group whose stored content does not follow the EMD layout.
    pub(crate) fn content(path: &str, reason: impl std::fmt::Display) -> Self {
        Error::ShapeMismatch(format!(
            "content of '{path}' is not in EMD shape: {reason}"
        ))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = Error::AlreadyExists {
            label: "x".into(),
            parent: "/data".into(),
        };
        assert_eq!(err.to_string(), "'x' already exists in '/data'");

        let err = Error::content("/data/x", "missing dim2");
        assert_eq!(
            err.to_string(),
            "shape mismatch: content of '/data/x' is not in EMD shape: missing dim2"
        );

        let err = Error::from(StoreError::Closed);
        assert_eq!(err.to_string(), "container is closed");
    }

    #[test]
    fn sources_are_chained() {
        use std::error::Error as _;
        let err = Error::WriteFailure {
            path: "/data/x".into(),
            source: StoreError::ReadOnly,
        };
        assert!(err.source().is_some());
        assert!(Error::ReadOnly.source().is_none());
    }
}
