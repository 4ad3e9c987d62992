mod attrs;
mod entry;
mod listing;
mod os_fs;
mod temp_fs;

pub use attrs::{MemoryXattrStore, XattrStore};
pub use entry::{EntryInfo, EntryType};
pub use listing::{ListOptions, filter_listing};
pub use os_fs::{OsFS, OsFSBuilder};
pub use temp_fs::{DEFAULT_IDENTIFIER, DEFAULT_TEMP_DIR_MODE, TempFS, TempFSBuilder};
