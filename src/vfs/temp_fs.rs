//! A file system living in a freshly created temporary directory.
//!
//! [`TempFS`] owns its directory and removes it exactly once: on [`FsBackend::close`], or as a
//! fallback when the value is dropped, or (for roots still alive at that point) when the process
//! exits normally.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::{FsBackend, Result};
use crate::error::{FsError, Op};
use crate::vfs::attrs::XattrStore;
use crate::vfs::os_fs::{OsFS, OsFSBuilder};
use crate::vfs::{EntryInfo, ListOptions};

/// Name suffix used when no identifier is given.
pub const DEFAULT_IDENTIFIER: &str = "TempFS";

/// Mode of the temporary root (Unix only).
pub const DEFAULT_TEMP_DIR_MODE: u32 = 0o700;

/// A self-cleaning [`OsFS`] over a new temporary directory.
///
/// Call [`FsBackend::close`] when done. Dropping an unclosed `TempFS` removes the directory too,
/// but logs a warning. After close the instance is unusable: operations fail with
/// [`FsError::ResourceNotFound`] or [`FsError::OperationFailed`].
///
/// ### Example:
/// ```
/// use osfs_kit::{FsBackend, TempFS};
///
/// let fs = TempFS::with_identifier("job1").unwrap();
/// fs.set_contents("out.txt", b"done").unwrap();
/// let root = fs.root().to_path_buf();
///
/// fs.close().unwrap();
/// assert!(!root.exists());
/// ```
pub struct TempFS {
    fs: OsFS,
    torn_down: AtomicBool,
}

/// Configures and builds a [`TempFS`].
pub struct TempFSBuilder {
    identifier: Option<String>,
    parent: Option<PathBuf>,
    dir_mode: u32,
    purge_at_exit: bool,
    base: OsFSBuilder,
}

impl Default for TempFSBuilder {
    fn default() -> Self {
        Self {
            identifier: None,
            parent: None,
            dir_mode: DEFAULT_TEMP_DIR_MODE,
            purge_at_exit: true,
            base: OsFS::builder(PathBuf::new()),
        }
    }
}

impl TempFSBuilder {
    /// Text embedded in the directory name, to tell temporary roots apart.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Directory under which the temporary root is created. Defaults to the system temp dir.
    pub fn parent<P: AsRef<Path>>(mut self, parent: P) -> Self {
        self.parent = Some(parent.as_ref().to_path_buf());
        self
    }

    /// Creation mode of the temporary root. Ignored outside Unix.
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Removes the root at normal process exit if it is still there. Enabled by default.
    pub fn purge_at_exit(mut self, enabled: bool) -> Self {
        self.purge_at_exit = enabled;
        self
    }

    /// See [`OsFSBuilder::lock`].
    pub fn lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.base = self.base.lock(lock);
        self
    }

    /// See [`OsFSBuilder::xattr_store`].
    pub fn xattr_store(mut self, store: Arc<dyn XattrStore>) -> Self {
        self.base = self.base.xattr_store(store);
        self
    }

    /// See [`OsFSBuilder::native_xattrs`].
    pub fn native_xattrs(mut self, enabled: bool) -> Self {
        self.base = self.base.native_xattrs(enabled);
        self
    }

    pub fn build(self) -> Result<TempFS> {
        let parent = self.parent.unwrap_or_else(std::env::temp_dir);
        let suffix = self.identifier.as_deref().unwrap_or(DEFAULT_IDENTIFIER);

        let mut builder = tempfile::Builder::new();
        builder.prefix("tmp").suffix(suffix);
        set_permissions(&mut builder, self.dir_mode);
        let temp_dir = builder
            .tempdir_in(&parent)
            .map_err(|e| FsError::from_io(Op::MakeDir, parent.display().to_string(), e))?
            .keep();

        let mut base = self.base;
        base.root = temp_dir.clone();
        let fs = match base.build() {
            Ok(fs) => fs,
            Err(err) => {
                let _ = std::fs::remove_dir(&temp_dir);
                return Err(err);
            }
        };
        if self.purge_at_exit {
            exit_purge::register(fs.root());
        }
        info!(root = %fs.root().display(), "created temp fs");

        Ok(TempFS {
            fs,
            torn_down: AtomicBool::new(false),
        })
    }
}

impl TempFS {
    /// Creates a temp fs with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a temp fs whose directory name contains `identifier`.
    pub fn with_identifier(identifier: &str) -> Result<Self> {
        Self::builder().identifier(identifier).build()
    }

    pub fn builder() -> TempFSBuilder {
        TempFSBuilder::default()
    }

    /// Returns true once the temporary directory has been removed.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn teardown(&self) -> Result<()> {
        if self.is_torn_down() {
            return Ok(());
        }
        {
            let _guard = self.fs.lock();
            if self.is_torn_down() {
                return Ok(());
            }
            let root = self.fs.root();
            if root.exists() {
                remove_tree(root)?;
            } else {
                debug!(root = %root.display(), "temp root already gone");
            }
            self.torn_down.store(true, Ordering::Release);
        }
        exit_purge::forget(self.fs.root());
        info!(root = %self.fs.root().display(), "removed temp fs");
        self.fs.close()
    }
}

/// Removes `root` and everything below it, deepest entries first.
///
/// A single "remove the whole tree" call is avoided on purpose: it mishandles long paths on some
/// platforms. Entries that vanish while walking are skipped.
fn remove_tree(root: &Path) -> Result<()> {
    let virtual_path = |path: &Path| {
        path.strip_prefix(root)
            .map(|p| p.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
            .unwrap_or_default()
    };

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(virtual_path).unwrap_or_default();
                let err = io::Error::from(err);
                if err.kind() == io::ErrorKind::NotFound {
                    continue;
                }
                return Err(FsError::failed(Op::Close, path, err));
            }
        };
        let removed = if entry.file_type().is_dir() {
            std::fs::remove_dir(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::failed(Op::Close, virtual_path(entry.path()), e)),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_permissions(builder: &mut tempfile::Builder<'_, '_>, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    builder.permissions(std::fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_permissions(_builder: &mut tempfile::Builder<'_, '_>, _mode: u32) {}

impl FsBackend for TempFS {
    fn root(&self) -> &Path {
        self.fs.root()
    }

    fn real_path(&self, path: &str) -> Result<PathBuf> {
        self.fs.real_path(path)
    }

    fn open(&self, path: &str, mode: &str) -> Result<File> {
        self.fs.open(path, mode)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.fs.exists(path)
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        self.fs.is_dir(path)
    }

    fn is_file(&self, path: &str) -> Result<bool> {
        self.fs.is_file(path)
    }

    fn is_hidden(&self, path: &str) -> bool {
        self.fs.is_hidden(path)
    }

    fn list_dir(&self, path: &str, options: &ListOptions) -> Result<Vec<String>> {
        self.fs.list_dir(path, options)
    }

    fn make_dir(
        &self,
        path: &str,
        mode: u32,
        recursive: bool,
        allow_recreate: bool,
    ) -> Result<()> {
        self.fs.make_dir(path, mode, recursive, allow_recreate)
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.fs.remove(path)
    }

    fn remove_dir(&self, path: &str, recursive: bool, force: bool) -> Result<()> {
        self.fs.remove_dir(path, recursive, force)
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.fs.rename(src, dst)
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        self.fs.info(path)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.fs.size(path)
    }

    fn get_xattr(&self, path: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.fs.get_xattr(path, key)
    }

    fn set_xattr(&self, path: &str, key: &str, value: &[u8]) -> Result<()> {
        self.fs.set_xattr(path, key, value)
    }

    fn remove_xattr(&self, path: &str, key: &str) -> Result<()> {
        self.fs.remove_xattr(path, key)
    }

    fn list_xattrs(&self, path: &str) -> Result<Vec<String>> {
        self.fs.list_xattrs(path)
    }

    /// Removes the temporary directory. Idempotent; once it returns `Ok` further calls do
    /// nothing.
    fn close(&self) -> Result<()> {
        self.teardown()
    }
}

impl Drop for TempFS {
    fn drop(&mut self) {
        if self.is_torn_down() {
            return;
        }
        warn!(root = %self.fs.root().display(), "temp fs dropped without close");
        if let Err(err) = self.teardown() {
            warn!(%err, "failed to remove temp fs");
        }
    }
}

impl fmt::Display for TempFS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TempFS: {}>", self.fs.root().display())
    }
}

impl fmt::Debug for TempFS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFS")
            .field("fs", &self.fs)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

/// Roots of live temp filesystems, removed at normal process exit.
///
/// The exit hook exists on Unix only. Elsewhere roots are removed by close and drop alone.
mod exit_purge {
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, MutexGuard, Once, PoisonError};

    use tracing::warn;

    static ROOTS: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
    static HOOK: Once = Once::new();

    fn roots() -> MutexGuard<'static, Vec<PathBuf>> {
        ROOTS.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn register(root: &Path) {
        HOOK.call_once(install);
        roots().push(root.to_path_buf());
    }

    pub(super) fn forget(root: &Path) {
        roots().retain(|registered| registered != root);
    }

    #[cfg(test)]
    pub(super) fn is_registered(root: &Path) -> bool {
        roots().iter().any(|registered| registered == root)
    }

    #[cfg(unix)]
    extern "C" fn purge() {
        let leftovers = std::mem::take(&mut *roots());
        for root in leftovers {
            if root.exists() {
                if let Err(err) = super::remove_tree(&root) {
                    warn!(root = %root.display(), %err, "exit purge failed");
                }
            }
        }
    }

    #[cfg(unix)]
    fn install() {
        // SAFETY: `purge` takes no arguments, never unwinds and only touches process-global
        // state that outlives `exit`.
        let rc = unsafe { libc::atexit(purge) };
        if rc != 0 {
            warn!("could not install exit purge for temp filesystems");
        }
    }

    #[cfg(not(unix))]
    fn install() {}
}
