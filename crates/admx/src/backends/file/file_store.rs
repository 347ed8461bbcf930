use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use crate::backends::ObjectStore;
use crate::backends::file::confined_path;

// -- 🪣 FileStoreConfig: every bucket is a directory, every key is a path. Cloud cosplay.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileStoreConfig {
    pub root_dir: PathBuf,
}

/// 🪣 FileObjectStore: `put_object(bucket, key)` lands at `<root>/<bucket>/<key>`.
///
/// ⚠️ `File::create` truncates if the object exists. Same as the real thing.
/// He who writes the same key twice keeps only the second draft.
#[derive(Debug)]
pub struct FileObjectStore {
    store_config: FileStoreConfig,
}

impl FileObjectStore {
    pub async fn new(store_config: FileStoreConfig) -> Result<Self> {
        Ok(Self { store_config })
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        confined_path(&self.store_config.root_dir, &format!("{bucket}/{key}"))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn put_object(&mut self, bucket: &str, key: &str, body: &str) -> Result<()> {
        let object_path = self.object_path(bucket, key)?;
        if let Some(parent) = object_path.parent() {
            tokio::fs::create_dir_all(parent).await.context(format!(
                "💀 Could not build the bucket directory '{}'. The shelf refused to be assembled.",
                parent.display()
            ))?;
        }

        let file_handle = File::create(&object_path).await.context(format!(
            "💀 The object '{}' could not be conjured into existence.",
            object_path.display()
        ))?;
        // -- 📦 BufWriter: one syscall per CSV line is a war crime
        let mut file_buf = io::BufWriter::new(file_handle);
        file_buf.write_all(body.as_bytes()).await?;
        file_buf.flush().await.context(format!(
            "💀 Error flushing '{}'. The bytes could SEE the disk. They did not reach it.",
            object_path.display()
        ))?;

        trace!(
            "📬 {} bytes walked into '{}' and sat down",
            body.len(),
            object_path.display()
        );
        Ok(())
    }
}
