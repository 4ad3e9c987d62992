//! Extended attributes: the native backend and the fallback store used when the native one is
//! not available.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::core::{Result, utils};

/// Attribute storage that does not depend on the host filesystem.
///
/// Keys are normalized, root-relative virtual paths. Implementations must be safe to share
/// between threads; callers already serialize access per backend.
pub trait XattrStore: Send + Sync {
    fn get(&self, path: &str, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, path: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Removing a missing key is a no-op.
    fn remove(&self, path: &str, key: &str) -> Result<()>;

    /// Keys set on `path`, sorted.
    fn list(&self, path: &str) -> Result<Vec<String>>;
}

/// In-process fallback store. Attributes live as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryXattrStore {
    attrs: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryXattrStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl XattrStore for MemoryXattrStore {
    fn get(&self, path: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let attrs = self.attrs.read().unwrap_or_else(|e| e.into_inner());
        Ok(attrs
            .get(&utils::make_relative(path))
            .and_then(|entry| entry.get(key))
            .cloned())
    }

    fn set(&self, path: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut attrs = self.attrs.write().unwrap_or_else(|e| e.into_inner());
        attrs
            .entry(utils::make_relative(path))
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, path: &str, key: &str) -> Result<()> {
        let mut attrs = self.attrs.write().unwrap_or_else(|e| e.into_inner());
        let path = utils::make_relative(path);
        if let Some(entry) = attrs.get_mut(&path) {
            entry.remove(key);
            if entry.is_empty() {
                attrs.remove(&path);
            }
        }
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let attrs = self.attrs.read().unwrap_or_else(|e| e.into_inner());
        Ok(attrs
            .get(&utils::make_relative(path))
            .map(|entry| entry.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Native attribute calls. Errors are returned raw; use [`is_unsupported`] and
/// [`is_missing_key`] to classify them.
#[cfg(all(unix, feature = "native-xattr"))]
pub(crate) mod native {
    use std::io;
    use std::path::Path;

    pub const SUPPORTED: bool = xattr::SUPPORTED_PLATFORM;

    pub fn get(path: &Path, key: &str) -> io::Result<Option<Vec<u8>>> {
        xattr::get(path, key)
    }

    pub fn set(path: &Path, key: &str, value: &[u8]) -> io::Result<()> {
        xattr::set(path, key, value)
    }

    pub fn remove(path: &Path, key: &str) -> io::Result<()> {
        xattr::remove(path, key)
    }

    pub fn list(path: &Path) -> io::Result<Vec<String>> {
        let mut keys: Vec<String> = xattr::list(path)?
            .map(|key| key.to_string_lossy().into_owned())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(not(all(unix, feature = "native-xattr")))]
pub(crate) mod native {
    use std::io;
    use std::path::Path;

    pub const SUPPORTED: bool = false;

    fn unsupported<T>() -> io::Result<T> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub fn get(_path: &Path, _key: &str) -> io::Result<Option<Vec<u8>>> {
        unsupported()
    }

    pub fn set(_path: &Path, _key: &str, _value: &[u8]) -> io::Result<()> {
        unsupported()
    }

    pub fn remove(_path: &Path, _key: &str) -> io::Result<()> {
        unsupported()
    }

    pub fn list(_path: &Path) -> io::Result<Vec<String>> {
        unsupported()
    }
}

#[cfg(unix)]
mod errno {
    pub const NOT_SUPPORTED: &[i32] = &[libc::ENOTSUP, libc::EOPNOTSUPP];

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const NO_ATTR: &[i32] = &[libc::ENODATA];
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd"
    ))]
    pub const NO_ATTR: &[i32] = &[libc::ENOATTR];
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd"
    )))]
    pub const NO_ATTR: &[i32] = &[];
}

#[cfg(not(unix))]
mod errno {
    pub const NOT_SUPPORTED: &[i32] = &[];
    pub const NO_ATTR: &[i32] = &[];
}

fn errno_in(err: &std::io::Error, codes: &[i32]) -> bool {
    err.raw_os_error().is_some_and(|code| codes.contains(&code))
}

/// The filesystem holding the path does not support extended attributes
/// (`ENOTSUP`/`EOPNOTSUPP`), or the build has no native backend.
pub(crate) fn is_unsupported(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::Unsupported || errno_in(err, errno::NOT_SUPPORTED)
}

/// The attribute key is not set on the path (`ENODATA` on Linux, `ENOATTR` on BSDs).
pub(crate) fn is_missing_key(err: &std::io::Error) -> bool {
    errno_in(err, errno::NO_ATTR)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod memory_store {
        use super::*;

        #[test]
        fn test_set_get() {
            let store = MemoryXattrStore::new();
            store.set("/a.txt", "user.comment", b"hello").unwrap();
            assert_eq!(
                store.get("a.txt", "user.comment").unwrap(),
                Some(b"hello".to_vec())
            );
            assert_eq!(store.get("a.txt", "user.other").unwrap(), None);
            assert_eq!(store.get("b.txt", "user.comment").unwrap(), None);
        }

        #[test]
        fn test_overwrite_and_list() {
            let store = MemoryXattrStore::new();
            store.set("a.txt", "user.b", b"1").unwrap();
            store.set("a.txt", "user.a", b"2").unwrap();
            store.set("a.txt", "user.b", b"3").unwrap();
            assert_eq!(store.list("a.txt").unwrap(), vec!["user.a", "user.b"]);
            assert_eq!(store.get("a.txt", "user.b").unwrap(), Some(b"3".to_vec()));
            assert!(store.list("missing").unwrap().is_empty());
        }

        #[test]
        fn test_remove_missing_key_is_noop() {
            let store = MemoryXattrStore::new();
            store.remove("a.txt", "user.none").unwrap();
            store.set("a.txt", "user.k", b"v").unwrap();
            store.remove("a.txt", "user.k").unwrap();
            store.remove("a.txt", "user.k").unwrap();
            assert!(store.list("a.txt").unwrap().is_empty());
        }
    }

    mod classification {
        use super::*;
        use std::io;

        #[test]
        fn test_unsupported_kind() {
            assert!(is_unsupported(&io::Error::from(io::ErrorKind::Unsupported)));
            assert!(!is_unsupported(&io::Error::from(
                io::ErrorKind::PermissionDenied
            )));
        }

        #[cfg(unix)]
        #[test]
        fn test_errno_codes() {
            assert!(is_unsupported(&io::Error::from_raw_os_error(libc::ENOTSUP)));
            assert!(is_unsupported(&io::Error::from_raw_os_error(
                libc::EOPNOTSUPP
            )));
            assert!(!is_unsupported(&io::Error::from_raw_os_error(libc::EACCES)));
            assert!(!is_missing_key(&io::Error::from_raw_os_error(libc::EACCES)));
        }

        #[cfg(target_os = "linux")]
        #[test]
        fn test_missing_key_linux() {
            assert!(is_missing_key(&io::Error::from_raw_os_error(libc::ENODATA)));
        }
    }
}
