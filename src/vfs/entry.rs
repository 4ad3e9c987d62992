use std::collections::BTreeMap;
use std::fs::{FileType, Metadata};

use chrono::{DateTime, Utc};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Other,
}

impl From<FileType> for EntryType {
    fn from(file_type: FileType) -> Self {
        if file_type.is_dir() {
            EntryType::Directory
        } else if file_type.is_file() {
            EntryType::File
        } else if file_type.is_symlink() {
            EntryType::Symlink
        } else {
            EntryType::Other
        }
    }
}

/// Snapshot of native metadata for one entry, taken at the moment of the call.
///
/// `raw` holds every stat field the platform exposes, under its traditional name (`st_mode`,
/// `st_mtime`, ...). Timestamps in `raw` are whole seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    entry_type: EntryType,
    pub size: u64,
    pub created_time: Option<DateTime<Utc>>,
    pub accessed_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub raw: BTreeMap<&'static str, i64>,
}

impl EntryInfo {
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// Raw stat field by name, e.g. `info.raw_field("st_ino")`.
    pub fn raw_field(&self, name: &str) -> Option<i64> {
        self.raw.get(name).copied()
    }
}

impl From<&Metadata> for EntryInfo {
    #[cfg(unix)]
    fn from(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        let raw = BTreeMap::from([
            ("st_mode", i64::from(meta.mode())),
            ("st_ino", meta.ino() as i64),
            ("st_dev", meta.dev() as i64),
            ("st_nlink", meta.nlink() as i64),
            ("st_uid", i64::from(meta.uid())),
            ("st_gid", i64::from(meta.gid())),
            ("st_size", meta.size() as i64),
            ("st_atime", meta.atime()),
            ("st_mtime", meta.mtime()),
            ("st_ctime", meta.ctime()),
            ("st_blksize", meta.blksize() as i64),
            ("st_blocks", meta.blocks() as i64),
            ("st_rdev", meta.rdev() as i64),
        ]);

        Self {
            entry_type: meta.file_type().into(),
            size: meta.size(),
            created_time: timestamp(meta.ctime(), meta.ctime_nsec()),
            accessed_time: timestamp(meta.atime(), meta.atime_nsec()),
            modified_time: timestamp(meta.mtime(), meta.mtime_nsec()),
            raw,
        }
    }

    #[cfg(not(unix))]
    fn from(meta: &Metadata) -> Self {
        let mut raw = BTreeMap::from([("st_size", meta.len() as i64)]);
        let created_time = meta.created().ok().map(DateTime::<Utc>::from);
        let accessed_time = meta.accessed().ok().map(DateTime::<Utc>::from);
        let modified_time = meta.modified().ok().map(DateTime::<Utc>::from);
        for (name, time) in [
            ("st_ctime", created_time),
            ("st_atime", accessed_time),
            ("st_mtime", modified_time),
        ] {
            if let Some(time) = time {
                raw.insert(name, time.timestamp());
            }
        }

        Self {
            entry_type: meta.file_type().into(),
            size: meta.len(),
            created_time,
            accessed_time,
            modified_time,
            raw,
        }
    }
}

#[cfg(unix)]
fn timestamp(secs: i64, nsecs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, u32::try_from(nsecs).ok()?)
}
