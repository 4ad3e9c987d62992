//! Post-filtering of raw directory listings, shared by all backends.

use glob::Pattern;

use crate::core::{FsBackend, Result, utils};
use crate::error::FsError;

/// How [`FsBackend::list_dir`] filters and renders entries.
///
/// The default lists every entry (hidden ones included) by bare name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Glob pattern matched against entry names.
    pub wildcard: Option<String>,
    /// Render entries as root-relative paths (`dir/name`).
    pub full: bool,
    /// Render entries as absolute virtual paths (`/dir/name`).
    pub absolute: bool,
    /// Include entries whose name starts with `.`.
    pub hidden: bool,
    pub dirs_only: bool,
    pub files_only: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            wildcard: None,
            full: false,
            absolute: false,
            hidden: true,
            dirs_only: false,
            files_only: false,
        }
    }
}

impl ListOptions {
    pub fn wildcard(mut self, pattern: impl Into<String>) -> Self {
        self.wildcard = Some(pattern.into());
        self
    }

    pub fn full(mut self) -> Self {
        self.full = true;
        self
    }

    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    pub fn no_hidden(mut self) -> Self {
        self.hidden = false;
        self
    }

    pub fn dirs_only(mut self) -> Self {
        self.dirs_only = true;
        self
    }

    pub fn files_only(mut self) -> Self {
        self.files_only = true;
        self
    }
}

/// Filters the raw `names` found in directory `path` and renders them per `options`.
/// Output is sorted by name.
pub fn filter_listing<F>(
    fs: &F,
    path: &str,
    names: Vec<String>,
    options: &ListOptions,
) -> Result<Vec<String>>
where
    F: FsBackend + ?Sized,
{
    if options.dirs_only && options.files_only {
        return Err(FsError::precondition(
            path,
            "dirs_only and files_only can not both be set",
        ));
    }

    let pattern = match &options.wildcard {
        Some(wildcard) => Some(
            Pattern::new(wildcard)
                .map_err(|e| FsError::precondition(path, format!("invalid wildcard: {e}")))?,
        ),
        None => None,
    };

    let mut names = names;
    names.sort();

    let mut listing = Vec::with_capacity(names.len());
    for name in names {
        if let Some(pattern) = &pattern {
            if !pattern.matches(&name) {
                continue;
            }
        }
        if !options.hidden && fs.is_hidden(&name) {
            continue;
        }
        let entry_path = utils::join(path, &name);
        if options.dirs_only && !kind_matches(fs.is_dir(&entry_path))? {
            continue;
        }
        if options.files_only && !kind_matches(fs.is_file(&entry_path))? {
            continue;
        }

        let rendered = if options.absolute {
            utils::make_absolute(&entry_path)
        } else if options.full {
            utils::make_relative(&entry_path)
        } else {
            name
        };
        listing.push(rendered);
    }

    Ok(listing)
}

/// An entry that resolves outside the root is neither a directory nor a file of this fs.
fn kind_matches(query: Result<bool>) -> Result<bool> {
    match query {
        Err(err) if err.is_precondition() => Ok(false),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::OsFS;
    use tempdir::TempDir;

    fn setup_test_env() -> (TempDir, OsFS) {
        let temp_dir = TempDir::new("listing_test").unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("docs/sub")).unwrap();
        std::fs::write(root.join("docs/a.txt"), b"a").unwrap();
        std::fs::write(root.join("docs/b.md"), b"b").unwrap();
        std::fs::write(root.join("docs/.secret"), b"s").unwrap();
        let fs = OsFS::new(root.to_str().unwrap()).unwrap();
        (temp_dir, fs)
    }

    fn raw_names() -> Vec<String> {
        ["sub", "b.md", ".secret", "a.txt"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_default_lists_everything_sorted() {
        let (_temp_dir, fs) = setup_test_env();
        let listing = filter_listing(&fs, "docs", raw_names(), &ListOptions::default()).unwrap();
        assert_eq!(listing, vec![".secret", "a.txt", "b.md", "sub"]);
    }

    #[test]
    fn test_wildcard() {
        let (_temp_dir, fs) = setup_test_env();
        let options = ListOptions::default().wildcard("*.txt");
        let listing = filter_listing(&fs, "docs", raw_names(), &options).unwrap();
        assert_eq!(listing, vec!["a.txt"]);
    }

    #[test]
    fn test_invalid_wildcard() {
        let (_temp_dir, fs) = setup_test_env();
        let options = ListOptions::default().wildcard("[");
        let err = filter_listing(&fs, "docs", raw_names(), &options).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_hidden_excluded() {
        let (_temp_dir, fs) = setup_test_env();
        let options = ListOptions::default().no_hidden();
        let listing = filter_listing(&fs, "docs", raw_names(), &options).unwrap();
        assert_eq!(listing, vec!["a.txt", "b.md", "sub"]);
    }

    #[test]
    fn test_dirs_only_and_files_only() {
        let (_temp_dir, fs) = setup_test_env();

        let dirs = filter_listing(&fs, "docs", raw_names(), &ListOptions::default().dirs_only())
            .unwrap();
        assert_eq!(dirs, vec!["sub"]);

        let files =
            filter_listing(&fs, "docs", raw_names(), &ListOptions::default().files_only())
                .unwrap();
        assert_eq!(files, vec![".secret", "a.txt", "b.md"]);

        let both = ListOptions::default().dirs_only().files_only();
        let err = filter_listing(&fs, "docs", raw_names(), &both).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_rendering() {
        let (_temp_dir, fs) = setup_test_env();

        let full = ListOptions::default().full().dirs_only();
        assert_eq!(
            filter_listing(&fs, "/docs", raw_names(), &full).unwrap(),
            vec!["docs/sub"]
        );

        let absolute = ListOptions::default().absolute().dirs_only();
        assert_eq!(
            filter_listing(&fs, "docs", raw_names(), &absolute).unwrap(),
            vec!["/docs/sub"]
        );
    }
}
