//! Path algebra.
//!
//! Virtual paths are `/`-separated strings and behave the same on every platform. The few
//! helpers working on host paths (`normalize_host`, `expand`) are marked as such.

use std::path::{Component, Path, PathBuf};

/// Normalizes a virtual path: removes `.` components, empty components and trailing slashes,
/// and resolves `..`. A `..` that would climb above the root is dropped.
/// A leading `/` is preserved.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Joins two virtual paths. An absolute `tail` replaces `base`.
pub fn join(base: &str, tail: &str) -> String {
    if tail.starts_with('/') || base.is_empty() {
        return normalize(tail);
    }
    normalize(&format!("{base}/{tail}"))
}

/// Strips the leading `/`, turning an absolute virtual path into a root-relative one.
pub fn make_relative(path: &str) -> String {
    normalize(path).trim_start_matches('/').to_string()
}

/// Makes a virtual path absolute (rooted at `/`).
pub fn make_absolute(path: &str) -> String {
    format!("/{}", make_relative(path))
}

/// Parent of a virtual path, relative form. The parent of a top-level entry is `""`.
pub fn dirname(path: &str) -> String {
    let path = make_relative(path);
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Last component of a virtual path, `""` for the root.
pub fn basename(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

/// Returns true when both paths name entries of the same directory.
pub fn is_same_dir(a: &str, b: &str) -> bool {
    dirname(a) == dirname(b)
}

/// Returns true when `path` resolves to the virtual root.
pub fn is_root(path: &str) -> bool {
    make_relative(path).is_empty()
}

/// Lexically normalizes a host path: resolves `.` and `..` without touching the filesystem.
/// `..` never climbs above the first component.
pub fn normalize_host<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(parent) = result.parent() {
                    result = parent.to_path_buf();
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Expands `~`, `~/...`, `$VAR` and `${VAR}` in a host path.
/// Unknown variables are left untouched.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::path::full_with_context_no_errors(path, dirs::home_dir, |var: &str| {
        std::env::var(var).ok()
    });
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/c/"), "/a/b/c");
        assert_eq!(normalize("/a/b/./c"), "/a/b/c");
        assert_eq!(normalize("/a/b/../c"), "/a/c");
        assert_eq!(normalize("a//b"), "a/b");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize(".."), "");
        assert_eq!(normalize("../../etc/passwd"), "etc/passwd");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("./a"), "a");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(join("a/b", "../c"), "a/c");
        assert_eq!(join("a/b", "/c"), "/c");
        assert_eq!(join("", "c"), "c");
        assert_eq!(join("/", "c"), "/c");
    }

    #[test]
    fn test_relative_and_absolute() {
        assert_eq!(make_relative("/a/b"), "a/b");
        assert_eq!(make_relative("a/b/"), "a/b");
        assert_eq!(make_relative("/"), "");
        assert_eq!(make_absolute("a/b"), "/a/b");
        assert_eq!(make_absolute(""), "/");
    }

    #[test]
    fn test_dirname_basename() {
        assert_eq!(dirname("a/b/c.txt"), "a/b");
        assert_eq!(dirname("/c.txt"), "");
        assert_eq!(dirname("c.txt"), "");
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("/a/"), "a");
        assert_eq!(basename("/"), "");
    }

    #[test]
    fn test_is_same_dir() {
        assert!(is_same_dir("a/b", "a/c"));
        assert!(is_same_dir("/a/b", "a/c"));
        assert!(is_same_dir("x", "/y"));
        assert!(!is_same_dir("a/b", "c/b"));
        assert!(!is_same_dir("a/b", "b"));
    }

    #[test]
    fn test_is_root() {
        assert!(is_root(""));
        assert!(is_root("/"));
        assert!(is_root("."));
        assert!(is_root("a/.."));
        assert!(!is_root("a"));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("/a/b/../c"), PathBuf::from("/a/c"));
        assert_eq!(normalize_host("/a/./b/"), PathBuf::from("/a/b"));
        assert_eq!(normalize_host("/.."), PathBuf::from("/"));
        assert_eq!(normalize_host("a/../.."), PathBuf::from(""));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir();
        if let Some(home) = home {
            assert_eq!(expand("~"), home);
            assert_eq!(expand("~/data"), home.join("data"));
        }
        assert_eq!(expand("/plain/path"), PathBuf::from("/plain/path"));
    }

    #[test]
    fn test_expand_vars() {
        let Ok(search) = std::env::var("PATH") else {
            return;
        };
        assert_eq!(expand("$PATH"), PathBuf::from(&search));
        assert_eq!(expand("${PATH}/x"), PathBuf::from(format!("{search}/x")));
        assert_eq!(
            expand("$OSFS_KIT_SURELY_UNSET_VAR/x"),
            PathBuf::from("$OSFS_KIT_SURELY_UNSET_VAR/x")
        );
    }
}
