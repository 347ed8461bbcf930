use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::trace;

use crate::backends::ErrorStream;

// -- 📣 FileErrorStreamConfig: the error stream, but it's a file you can `tail -f`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileErrorStreamConfig {
    pub file_name: PathBuf,
}

/// 📣 FileErrorStream: appends each record's bytes to one file. Records are
/// expected to carry their own trailing newline.
#[derive(Debug)]
pub struct FileErrorStream {
    stream_config: FileErrorStreamConfig,
}

impl FileErrorStream {
    pub async fn new(stream_config: FileErrorStreamConfig) -> Result<Self> {
        Ok(Self { stream_config })
    }
}

#[async_trait]
impl ErrorStream for FileErrorStream {
    async fn put_record(
        &mut self,
        stream_arn: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<()> {
        let mut file_handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.stream_config.file_name)
            .await
            .context(format!(
                "💀 The error stream file '{}' would not open. Complaints have nowhere to go.",
                self.stream_config.file_name.display()
            ))?;
        file_handle.write_all(data).await?;
        file_handle.flush().await?;
        trace!(
            "📣 {} bytes onto '{stream_arn}' with partition key '{partition_key}'",
            data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_complaints_pile_up_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_name = dir.path().join("errors.ndjson");
        let mut stream = FileErrorStream::new(FileErrorStreamConfig {
            file_name: file_name.clone(),
        })
        .await?;

        stream.put_record("arn:stream", "error", b"{\"n\":1}\n").await?;
        stream.put_record("arn:stream", "error", b"{\"n\":2}\n").await?;

        assert_eq!(
            std::fs::read_to_string(&file_name)?,
            "{\"n\":1}\n{\"n\":2}\n"
        );
        Ok(())
    }
}
