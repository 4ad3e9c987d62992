//! This module provides a file system that shadows a real directory on the host.
//!
//! ### Key Features:
//! - **Isolated root**: every virtual path is resolved under `root`; lexical `..` is clamped at
//!   the root and symlinks leading outside of it are rejected.
//! - **Typed errors**: native failures are reclassified into [`FsError`] at the call site.
//! - **Extended attributes**: stored natively when the host supports them, otherwise in a
//!   fallback [`XattrStore`].
//! - **No caching**: every call goes to the host.

use std::fmt;
use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::core::{FsBackend, Result, utils};
use crate::error::{FsError, Op};
use crate::vfs::attrs::{self, MemoryXattrStore, XattrStore, native};
use crate::vfs::listing::{ListOptions, filter_listing};
use crate::vfs::EntryInfo;

/// Symlink hops followed while checking where a dangling link points.
const MAX_LINK_HOPS: usize = 40;

/// A file system over a real directory of the host.
///
/// `OsFS` never creates or removes its root; it must exist when the instance is built.
///
/// ### Usage notes:
/// - Only the extended-attribute calls are serialized (one lock per instance, or shared via
///   [`OsFSBuilder::lock`]). Other calls rely on the atomicity of the host filesystem.
/// - Handles returned by [`FsBackend::open`] belong to the caller.
///
/// ### Example:
/// ```no_run
/// use osfs_kit::{FsBackend, ListOptions, OsFS};
///
/// let fs = OsFS::new("~/projects").unwrap();
/// fs.make_dir("notes/2024", 0o755, true, true).unwrap();
/// fs.set_contents("notes/2024/todo.txt", b"write docs").unwrap();
/// assert_eq!(fs.list_dir("notes", &ListOptions::default()).unwrap(), vec!["2024"]);
/// ```
pub struct OsFS {
    root: PathBuf, // host-related absolute canonical path
    lock: Arc<Mutex<()>>,
    fallback: Arc<dyn XattrStore>,
    native_xattrs: bool,
    closed: AtomicBool,
}

/// Configures and builds an [`OsFS`].
pub struct OsFSBuilder {
    pub(crate) root: PathBuf,
    lock: Option<Arc<Mutex<()>>>,
    fallback: Option<Arc<dyn XattrStore>>,
    native_xattrs: bool,
}

impl OsFSBuilder {
    pub(crate) fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            lock: None,
            fallback: None,
            native_xattrs: true,
        }
    }

    /// Shares `lock` with other backends; extended-attribute calls on all of them are then
    /// serialized together.
    pub fn lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Store used for extended attributes the host can not keep.
    /// Defaults to a fresh [`MemoryXattrStore`].
    pub fn xattr_store(mut self, store: Arc<dyn XattrStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    /// Enables or disables native extended attributes. When disabled every attribute goes to
    /// the fallback store.
    pub fn native_xattrs(mut self, enabled: bool) -> Self {
        self.native_xattrs = enabled;
        self
    }

    pub fn build(self) -> Result<OsFS> {
        let root = Self::open_root(&self.root)?;
        debug!(root = %root.display(), "opened os fs");
        Ok(OsFS {
            root,
            lock: self.lock.unwrap_or_default(),
            fallback: self
                .fallback
                .unwrap_or_else(|| Arc::new(MemoryXattrStore::new())),
            native_xattrs: self.native_xattrs,
            closed: AtomicBool::new(false),
        })
    }

    /// Expands and canonicalizes the candidate root, which must be an existing directory.
    fn open_root(candidate: &Path) -> Result<PathBuf> {
        let display = candidate.display().to_string();
        let expanded = match candidate.to_str() {
            Some(text) => utils::expand(text),
            None => candidate.to_path_buf(),
        };
        let root = utils::normalize_host(&expanded)
            .canonicalize()
            .map_err(|e| FsError::from_io(Op::Open, &display, e))?;
        if !root.is_dir() {
            debug!(root = %root.display(), "root is not a directory");
            return Err(FsError::not_found(display));
        }
        Ok(root)
    }
}

impl OsFS {
    /// Creates a new `OsFS` rooted at `root`.
    /// * `root` is a host path; `~` and environment variables are expanded.
    ///
    /// Fails with [`FsError::ResourceNotFound`] if `root` does not exist or is not a
    /// directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        OsFSBuilder::new(root).build()
    }

    pub fn builder<P: AsRef<Path>>(root: P) -> OsFSBuilder {
        OsFSBuilder::new(root)
    }

    /// Returns true once [`FsBackend::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Instance lock guarding extended attributes and teardown.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn native_xattrs(&self) -> bool {
        self.native_xattrs && native::SUPPORTED
    }

    /// Joins the root with the normalized virtual path and checks that the result, with
    /// symlinks resolved, is still under the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = utils::make_relative(path);
        let mut real = self.root.clone();
        real.extend(relative.split('/').filter(|part| !part.is_empty()));
        self.ensure_contained(path, &real)?;
        Ok(real)
    }

    /// Canonicalizes the deepest existing ancestor of `real` and verifies it lies under the
    /// root. Dangling symlinks are followed lexically.
    fn ensure_contained(&self, path: &str, real: &Path) -> Result<()> {
        let mut probe = real.to_path_buf();
        let mut hops = 0;
        loop {
            match probe.canonicalize() {
                Ok(resolved) => {
                    if resolved.starts_with(&self.root) {
                        return Ok(());
                    }
                    debug!(path, resolved = %resolved.display(), "path escapes the root");
                    return Err(FsError::precondition(path, "path escapes the root"));
                }
                Err(e) if is_absent(&e) => {
                    if let Ok(target) = std::fs::read_link(&probe) {
                        hops += 1;
                        if hops > MAX_LINK_HOPS {
                            return Err(FsError::failed(Op::Query, path, e));
                        }
                        let base = probe.parent().map(Path::to_path_buf).unwrap_or_default();
                        probe = utils::normalize_host(base.join(target));
                        continue;
                    }
                    if probe == self.root {
                        // the root itself is gone; nothing may recreate it
                        debug!(path, "root no longer exists");
                        return Err(FsError::not_found(path));
                    }
                    match probe.parent() {
                        Some(parent) => probe = parent.to_path_buf(),
                        None => return Ok(()),
                    }
                }
                Err(e) => return Err(FsError::failed(Op::Query, path, e)),
            }
        }
    }

    /// Force removal: files (and symlinks, which are not followed) first, then
    /// subdirectories.
    fn clear_dir(&self, path: &str, real: &Path) -> Result<()> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        let entries =
            std::fs::read_dir(real).map_err(|e| FsError::failed(Op::ListDir, path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| FsError::failed(Op::ListDir, path, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| FsError::failed(Op::ListDir, path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                dirs.push(name);
            } else {
                files.push((name, entry.path()));
            }
        }

        for (name, host) in files {
            std::fs::remove_file(&host)
                .map_err(|e| FsError::failed(Op::Remove, utils::join(path, &name), e))?;
        }
        for name in dirs {
            self.remove_dir(&utils::join(path, &name), false, true)?;
        }
        Ok(())
    }

    fn query<T>(&self, path: &str, f: impl FnOnce(&std::fs::Metadata) -> T) -> Result<T>
    where
        T: Default,
    {
        let real = self.resolve(path)?;
        match std::fs::metadata(&real) {
            Ok(meta) => Ok(f(&meta)),
            Err(e) if is_absent(&e) => Ok(T::default()),
            Err(e) => Err(FsError::failed(Op::Query, path, e)),
        }
    }
}

impl FsBackend for OsFS {
    fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn real_path(&self, path: &str) -> Result<PathBuf> {
        self.resolve(path)
    }

    fn open(&self, path: &str, mode: &str) -> Result<File> {
        let options = open_options(mode)
            .ok_or_else(|| FsError::precondition(path, format!("invalid open mode '{mode}'")))?;
        let real = self.resolve(path)?;
        trace!(path, mode, "open");
        options
            .open(&real)
            .map_err(|e| FsError::from_io(Op::Open, path, e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let real = self.resolve(path)?;
        match real.try_exists() {
            Ok(exists) => Ok(exists),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(FsError::failed(Op::Query, path, e)),
        }
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        self.query(path, |meta| meta.is_dir())
    }

    fn is_file(&self, path: &str) -> Result<bool> {
        self.query(path, |meta| meta.is_file())
    }

    fn list_dir(&self, path: &str, options: &ListOptions) -> Result<Vec<String>> {
        let real = self.resolve(path)?;
        let names = std::fs::read_dir(&real)
            .map_err(|e| FsError::from_io(Op::ListDir, path, e))?
            .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| FsError::failed(Op::ListDir, path, e))?;
        filter_listing(self, path, names, options)
    }

    fn make_dir(
        &self,
        path: &str,
        mode: u32,
        recursive: bool,
        allow_recreate: bool,
    ) -> Result<()> {
        let real = self.resolve(path)?;
        if !allow_recreate && real.exists() {
            return Err(FsError::refused(Op::MakeDir, path));
        }
        match dir_builder(mode, recursive).create(&real) {
            Ok(()) => {
                debug!(path, recursive, "created directory");
                Ok(())
            }
            Err(e)
                if e.kind() == io::ErrorKind::AlreadyExists && allow_recreate && real.is_dir() =>
            {
                Ok(())
            }
            Err(e) => Err(FsError::failed(Op::MakeDir, path, e)),
        }
    }

    fn remove(&self, path: &str) -> Result<()> {
        let real = self.resolve(path)?;
        std::fs::remove_file(&real).map_err(|e| FsError::failed(Op::Remove, path, e))?;
        trace!(path, "removed file");
        Ok(())
    }

    fn remove_dir(&self, path: &str, recursive: bool, force: bool) -> Result<()> {
        // the root of this fs is never removed
        if utils::is_root(path) {
            return Ok(());
        }
        let real = self.resolve(path)?;
        if force {
            self.clear_dir(path, &real)?;
        }
        std::fs::remove_dir(&real).map_err(|e| FsError::failed(Op::RemoveDir, path, e))?;
        debug!(path, force, "removed directory");

        // Walk up manually: a host-level "remove parents" could climb out of the root.
        if recursive {
            let parent = utils::dirname(path);
            if let Err(err) = self.remove_dir(&parent, true, false) {
                trace!(parent = %parent, %err, "stopped collapsing parents");
            }
        }
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        if !utils::is_same_dir(src, dst) {
            return Err(FsError::precondition(
                src,
                format!("destination '{dst}' must be in the same directory"),
            ));
        }
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        std::fs::rename(&from, &to).map_err(|e| FsError::failed(Op::Rename, src, e))?;
        debug!(src, dst, "renamed");
        Ok(())
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let real = self.resolve(path)?;
        let meta = std::fs::metadata(&real).map_err(|e| FsError::unknown(path, e))?;
        Ok(EntryInfo::from(&meta))
    }

    fn size(&self, path: &str) -> Result<u64> {
        let real = self.resolve(path)?;
        let meta = std::fs::metadata(&real).map_err(|e| FsError::unknown(path, e))?;
        Ok(meta.len())
    }

    fn get_xattr(&self, path: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock();
        let real = self.resolve(path)?;
        if self.native_xattrs() {
            match native::get(&real, key) {
                Ok(value) => return Ok(value),
                Err(e) if attrs::is_unsupported(&e) => {
                    trace!(path, key, "xattr not supported, using fallback store")
                }
                Err(e) => return Err(FsError::failed(Op::Xattr, path, e)),
            }
        }
        self.fallback.get(path, key)
    }

    fn set_xattr(&self, path: &str, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock();
        let real = self.resolve(path)?;
        if self.native_xattrs() {
            match native::set(&real, key, value) {
                Ok(()) => return Ok(()),
                Err(e) if attrs::is_unsupported(&e) => {
                    trace!(path, key, "xattr not supported, using fallback store")
                }
                Err(e) => return Err(FsError::failed(Op::Xattr, path, e)),
            }
        }
        self.fallback.set(path, key, value)
    }

    fn remove_xattr(&self, path: &str, key: &str) -> Result<()> {
        let _guard = self.lock();
        let real = self.resolve(path)?;
        if self.native_xattrs() {
            match native::remove(&real, key) {
                Ok(()) => return Ok(()),
                Err(e) if attrs::is_missing_key(&e) => return Ok(()),
                Err(e) if attrs::is_unsupported(&e) => {
                    trace!(path, key, "xattr not supported, using fallback store")
                }
                Err(e) => return Err(FsError::failed(Op::Xattr, path, e)),
            }
        }
        self.fallback.remove(path, key)
    }

    fn list_xattrs(&self, path: &str) -> Result<Vec<String>> {
        let _guard = self.lock();
        let real = self.resolve(path)?;
        if self.native_xattrs() {
            match native::list(&real) {
                Ok(keys) => return Ok(keys),
                Err(e) if attrs::is_unsupported(&e) => {
                    trace!(path, "xattr not supported, using fallback store")
                }
                Err(e) => return Err(FsError::failed(Op::Xattr, path, e)),
            }
        }
        self.fallback.list(path)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(root = %self.root.display(), "closed os fs");
        }
        Ok(())
    }
}

impl fmt::Display for OsFS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OsFS: {}>", self.root.display())
    }
}

impl fmt::Debug for OsFS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsFS")
            .field("root", &self.root)
            .field("native_xattrs", &self.native_xattrs())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Absence of the target, or of one of its parents.
fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Translates an `fopen`-style mode into `OpenOptions`. Returns `None` for invalid modes.
fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut base = None;
    let mut update = false;
    for c in mode.chars() {
        match c {
            'r' | 'w' | 'a' | 'x' if base.is_none() => base = Some(c),
            '+' if !update => update = true,
            'b' | 't' => {}
            _ => return None,
        }
    }

    let mut options = OpenOptions::new();
    match base? {
        'r' => options.read(true).write(update),
        'w' => options.write(true).create(true).truncate(true).read(update),
        'a' => options.append(true).create(true).read(update),
        'x' => options.write(true).create_new(true).read(update),
        _ => return None,
    };
    Some(options)
}

fn dir_builder(mode: u32, recursive: bool) -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    std::os::unix::fs::DirBuilderExt::mode(&mut builder, mode);
    #[cfg(not(unix))]
    let _ = mode;
    builder
}
