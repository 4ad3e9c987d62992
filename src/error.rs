//! Error vocabulary shared by every backend.
//!
//! Native `io::Error`s never leave the crate raw: each call site reclassifies them into one of
//! four kinds, keeping the offending virtual path and, where there is one, the native cause.

use std::fmt;
use std::io;

use thiserror::Error;

/// Operation code attached to [`FsError::OperationFailed`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    Open,
    Query,
    ListDir,
    MakeDir,
    Remove,
    RemoveDir,
    Rename,
    Xattr,
    Close,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Open => "open",
            Op::Query => "query",
            Op::ListDir => "list_dir",
            Op::MakeDir => "make_dir",
            Op::Remove => "remove",
            Op::RemoveDir => "remove_dir",
            Op::Rename => "rename",
            Op::Xattr => "xattr",
            Op::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    /// The required target does not exist.
    #[error("resource not found: {path}")]
    ResourceNotFound { path: String },

    /// A native call failed for a reason callers are not expected to recover from.
    #[error("{op} failed: {path}{}", describe(.source))]
    OperationFailed {
        op: Op,
        path: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Unclassified failure while reading metadata.
    #[error("unknown error: {path}{}", describe(.source))]
    Unknown {
        path: String,
        #[source]
        source: Option<io::Error>,
    },

    /// The caller asked for something this backend refuses to do.
    #[error("{reason}: {path}")]
    PreconditionViolation { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FsError>;

fn describe(source: &Option<io::Error>) -> String {
    match source {
        Some(err) => format!(" ({err})"),
        None => String::new(),
    }
}

impl FsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        FsError::ResourceNotFound { path: path.into() }
    }

    pub fn failed(op: Op, path: impl Into<String>, source: io::Error) -> Self {
        FsError::OperationFailed {
            op,
            path: path.into(),
            source: Some(source),
        }
    }

    /// `OperationFailed` without a native cause (e.g. the adapter itself detected the problem).
    pub fn refused(op: Op, path: impl Into<String>) -> Self {
        FsError::OperationFailed {
            op,
            path: path.into(),
            source: None,
        }
    }

    pub fn unknown(path: impl Into<String>, source: io::Error) -> Self {
        FsError::Unknown {
            path: path.into(),
            source: Some(source),
        }
    }

    pub fn precondition(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FsError::PreconditionViolation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps a native error where absence has its own meaning: `NotFound` becomes
    /// `ResourceNotFound`, everything else `OperationFailed`.
    pub fn from_io(op: Op, path: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            FsError::not_found(path)
        } else {
            FsError::failed(op, path, source)
        }
    }

    /// Virtual path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            FsError::ResourceNotFound { path }
            | FsError::OperationFailed { path, .. }
            | FsError::Unknown { path, .. }
            | FsError::PreconditionViolation { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::ResourceNotFound { .. })
    }

    pub fn is_operation_failed(&self) -> bool {
        matches!(self, FsError::OperationFailed { .. })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, FsError::PreconditionViolation { .. })
    }
}
