use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::file::confined_path;
use crate::backends::{TransferReceipt, TransferRequest, TransferTrigger};

// -- 🚚 FileTransferConfig: where the "remote" SFTP server keeps its files. It's a folder.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileTransferConfig {
    pub remote_root: PathBuf,
}

/// 🚚 FileTransferTrigger: pretends to be the managed connector.
///
/// Each `/<bucket>/<key>` send path is read out of the file object store and
/// copied to `<remote_root>/<remote_directory_path>/<file name>`. The role is
/// "assumed" by writing it in the log, which is about as much as a folder can do.
#[derive(Debug)]
pub struct FileTransferTrigger {
    transfer_config: FileTransferConfig,
    store_root: PathBuf,
}

impl FileTransferTrigger {
    pub async fn new(transfer_config: FileTransferConfig, store_root: PathBuf) -> Result<Self> {
        Ok(Self {
            transfer_config,
            store_root,
        })
    }
}

#[async_trait]
impl TransferTrigger for FileTransferTrigger {
    async fn start_file_transfer(&mut self, request: &TransferRequest) -> Result<TransferReceipt> {
        if request.connector_id.is_empty() {
            bail!("💀 No connector id. A transfer with no connector is just a wish.");
        }
        info!(
            "🎭 assuming role '{}' as session '{}'",
            request.role_arn, request.role_session_name
        );

        let remote_dir = confined_path(
            &self.transfer_config.remote_root,
            &request.remote_directory_path,
        )?;
        tokio::fs::create_dir_all(&remote_dir).await.context(format!(
            "💀 The remote directory '{}' refused to exist.",
            remote_dir.display()
        ))?;

        for send_path in &request.send_file_paths {
            let staged = confined_path(&self.store_root, send_path)?;
            let file_name = staged
                .file_name()
                .with_context(|| format!("💀 send path '{send_path}' has no file name"))?;
            let delivered = remote_dir.join(file_name);
            tokio::fs::copy(&staged, &delivered).await.context(format!(
                "💀 Copying '{}' to '{}' went sideways.",
                staged.display(),
                delivered.display()
            ))?;
        }

        let transfer_id = format!(
            "t-{}-{}",
            request.connector_id,
            Utc::now().format("%Y%m%d%H%M%S%6f")
        );
        Ok(TransferReceipt { transfer_id })
    }
}
