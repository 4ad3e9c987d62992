//! Sandboxed file systems over real host directories.
//!
//! ### Overview
//!
//! `osfs-kit` exposes a directory of the host through a small virtual-path API. Every path is
//! resolved under the root of the file system; nothing outside of it can be reached.
//! It defines the generic `FsBackend` trait and two implementations:
//! - `OsFS` shadows an existing directory and never removes it.
//! - `TempFS` creates a fresh temporary directory and removes it again on close.
//!
//! **Key ideas**:
//! - **Safety**: `..` is clamped at the root and symlinks leading out of it are refused.
//! - **Typed errors**: host failures surface as one of four `FsError` kinds.
//! - **Extended attributes**: native where the host supports them, a fallback store elsewhere.
//! - **Cleanup**: a `TempFS` leaves nothing behind, even when it is only dropped.

mod core;
mod error;
mod vfs;

pub use crate::core::{DEFAULT_DIR_MODE, FsBackend, Result, utils};
pub use crate::error::{FsError, Op};
pub use crate::vfs::{
    DEFAULT_IDENTIFIER, DEFAULT_TEMP_DIR_MODE, EntryInfo, EntryType, ListOptions,
    MemoryXattrStore, OsFS, OsFSBuilder, TempFS, TempFSBuilder, XattrStore, filter_listing,
};
