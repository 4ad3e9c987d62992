use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub mod utils;

pub use crate::error::Result;
use crate::error::{FsError, Op};
use crate::vfs::{EntryInfo, ListOptions};

/// Default mode for new directories (before umask).
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Uniform virtual-path operation surface.
///
/// Every `path` argument is a virtual path (`/`-separated, relative to the backend root).
/// Host paths are never accepted; use [`FsBackend::real_path`] to go the other way.
pub trait FsBackend {
    /// Returns root path related to the host file system.
    fn root(&self) -> &Path;

    /// Resolves a virtual path to the host path it maps to.
    /// Fails if the resolution would leave the root.
    fn real_path(&self, path: &str) -> Result<PathBuf>;

    /// Opens a file with an `fopen`-style mode (`r`, `w`, `a`, `x`, optionally `+`, `b`, `t`).
    /// The returned handle is owned by the caller.
    fn open(&self, path: &str, mode: &str) -> Result<File>;

    fn exists(&self, path: &str) -> Result<bool>;

    fn is_dir(&self, path: &str) -> Result<bool>;

    fn is_file(&self, path: &str) -> Result<bool>;

    /// Dot-prefix naming convention; platform hidden flags are not consulted.
    fn is_hidden(&self, path: &str) -> bool {
        utils::basename(path).starts_with('.')
    }

    /// Lists a directory, post-filtered and rendered according to `options`.
    fn list_dir(&self, path: &str, options: &ListOptions) -> Result<Vec<String>>;

    /// Creates a directory.
    /// * `recursive` - create missing parents as well.
    /// * `allow_recreate` - an already existing directory is not an error.
    fn make_dir(&self, path: &str, mode: u32, recursive: bool, allow_recreate: bool)
    -> Result<()>;

    /// Removes a single file.
    fn remove(&self, path: &str) -> Result<()>;

    /// Removes a directory.
    /// * `force` - remove its contents first.
    /// * `recursive` - afterwards remove empty parents, up to (not including) the root.
    fn remove_dir(&self, path: &str, recursive: bool, force: bool) -> Result<()>;

    /// Renames an entry within its directory.
    fn rename(&self, src: &str, dst: &str) -> Result<()>;

    fn info(&self, path: &str) -> Result<EntryInfo>;

    fn size(&self, path: &str) -> Result<u64>;

    fn get_xattr(&self, path: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn set_xattr(&self, path: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Removing a key that is not set is not an error.
    fn remove_xattr(&self, path: &str, key: &str) -> Result<()>;

    fn list_xattrs(&self, path: &str) -> Result<Vec<String>>;

    /// Releases the backend. Idempotent.
    fn close(&self) -> Result<()>;

    /// Reads the entire contents of a file.
    fn get_contents(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open(path, "rb")?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| FsError::failed(Op::Open, path, e))?;
        Ok(content)
    }

    /// Creates (or truncates) a file and writes `content` into it.
    fn set_contents(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut file = self.open(path, "wb")?;
        file.write_all(content)
            .map_err(|e| FsError::failed(Op::Open, path, e))
    }

    fn is_dir_empty(&self, path: &str) -> Result<bool> {
        Ok(self.list_dir(path, &ListOptions::default())?.is_empty())
    }
}
