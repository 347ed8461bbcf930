//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The lake was far away and the cloud bill was close. Someone wanted to run
//! the whole job on a laptop on a train with no WiFi. So every collaborator
//! got a stand-in made of plain files:
//!
//! - tables are NDJSON files under `<root>/<database_path>/<table>.ndjson`
//! - buckets are directories under the store root
//! - the parameter store is one JSON object of name → value
//! - the SFTP connector copies staged files into a "remote" directory
//! - the error stream appends lines to a file
//!
//! 💀 Disk full → your problem now
//! 🦆 (mandatory, no notes)

mod file_error_stream;
mod file_parameters;
mod file_source;
mod file_store;
mod file_transfer;

pub use file_error_stream::{FileErrorStream, FileErrorStreamConfig};
pub use file_parameters::{FileParameterConfig, FileParameterStore};
pub use file_source::{FileRecordSource, FileSourceConfig};
pub use file_store::{FileObjectStore, FileStoreConfig};
pub use file_transfer::{FileTransferConfig, FileTransferTrigger};

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// 🧭 Joins untrusted `/`-separated segments onto a root, refusing anything
/// that would climb out of it.
pub(crate) fn confined_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut joined = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        match Path::new(segment).components().next() {
            Some(Component::Normal(_)) if Path::new(segment).components().count() == 1 => {
                joined.push(segment)
            }
            _ => bail!(
                "💀 '{relative}' tried to wander outside '{}'. Not on our watch.",
                root.display()
            ),
        }
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_dot_dot_is_turned_away() -> Result<()> {
        let root = Path::new("/srv/store");
        assert_eq!(
            confined_path(root, "bucket/prefix/file.csv")?,
            PathBuf::from("/srv/store/bucket/prefix/file.csv")
        );
        assert_eq!(
            confined_path(root, "/bucket//file.csv")?,
            PathBuf::from("/srv/store/bucket/file.csv")
        );
        assert!(confined_path(root, "bucket/../../etc/passwd").is_err());
        assert!(confined_path(root, "./sneaky").is_err());
        Ok(())
    }
}
