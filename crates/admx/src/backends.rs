//! 🔌 Backends: everything the job talks to that isn't the transformer.
//!
//! 🎭 This module is the casting agency. The job needs five outside parties:
//!
//! | Role              | Trait               | What it stands in for            |
//! |-------------------|---------------------|----------------------------------|
//! | table reader      | [`RecordSource`]    | the lake's table catalog         |
//! | blob writer       | [`ObjectStore`]     | curated / staging / artifact buckets |
//! | config lookup     | [`ParameterStore`]  | the parameter store              |
//! | file mover        | [`TransferTrigger`] | the managed SFTP connector       |
//! | complaint box     | [`ErrorStream`]     | the internal error stream        |
//!
//! Each trait gets a `File` backend (runs on one laptop) and an `InMemory`
//! backend (runs in a test), plus an enum that dispatches to whichever one the
//! config picked. Callers hold the enum and never ask which one they got.
//!
//! Ancient proverb: "He who hardcodes the bucket, deploys to one account only." 🦆

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_config::{
    ErrorStreamConfig, ParameterConfig, SourceConfig, StoreConfig, TransferConfig,
};
use crate::common::SourceRow;

pub mod file;
pub mod in_mem;

pub use file::{
    FileErrorStream, FileErrorStreamConfig, FileObjectStore, FileParameterConfig,
    FileParameterStore, FileRecordSource, FileSourceConfig, FileStoreConfig, FileTransferConfig,
    FileTransferTrigger,
};
pub use in_mem::{
    InMemoryErrorStream, InMemoryObjectStore, InMemoryParameterConfig, InMemoryParameterStore,
    InMemoryRecordSource, InMemorySourceConfig, InMemoryTransferTrigger, StreamRecord,
};

// ===== Traits =====

/// 🚰 Reads one whole table.
///
/// # Contract 📜
/// - A table that doesn't exist is zero rows, not an error.
/// - A table that exists but can't be read is an error.
#[async_trait]
pub trait RecordSource: std::fmt::Debug + Send + Sync {
    async fn load_table(&mut self, database_path: &str, table_name: &str) -> Result<Vec<SourceRow>>;
}

/// 🪣 Writes one object. Overwrites without asking.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    async fn put_object(&mut self, bucket: &str, key: &str, body: &str) -> Result<()>;
}

/// 🗝️ Resolves a named parameter to its string value. Unknown names are errors.
#[async_trait]
pub trait ParameterStore: std::fmt::Debug + Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// 📦 Everything a transfer needs: who to be, what to send, where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub connector_id: String,
    pub role_arn: String,
    pub role_session_name: String,
    /// `/<bucket>/<key>` paths, the way the connector spells them.
    pub send_file_paths: Vec<String>,
    pub remote_directory_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// 🚚 Assumes the connector role and kicks off one transfer. Fire and forget.
#[async_trait]
pub trait TransferTrigger: std::fmt::Debug + Send + Sync {
    async fn start_file_transfer(&mut self, request: &TransferRequest) -> Result<TransferReceipt>;
}

/// 📣 Puts one record on the error stream.
#[async_trait]
pub trait ErrorStream: std::fmt::Debug + Send + Sync {
    async fn put_record(&mut self, stream_arn: &str, partition_key: &str, data: &[u8])
    -> Result<()>;
}

// ===== Backend enums =====

#[derive(Debug)]
pub enum RecordSourceBackend {
    InMemory(InMemoryRecordSource),
    File(FileRecordSource),
}

impl RecordSourceBackend {
    pub async fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(match config {
            SourceConfig::File(c) => Self::File(FileRecordSource::new(c.clone()).await?),
            SourceConfig::InMemory(c) => Self::InMemory(InMemoryRecordSource::from_config(c)),
        })
    }
}

#[async_trait]
impl RecordSource for RecordSourceBackend {
    async fn load_table(&mut self, database_path: &str, table_name: &str) -> Result<Vec<SourceRow>> {
        match self {
            RecordSourceBackend::InMemory(i) => i.load_table(database_path, table_name).await,
            RecordSourceBackend::File(f) => f.load_table(database_path, table_name).await,
        }
    }
}

#[derive(Debug)]
pub enum ObjectStoreBackend {
    InMemory(InMemoryObjectStore),
    File(FileObjectStore),
}

impl ObjectStoreBackend {
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(match config {
            StoreConfig::File(c) => Self::File(FileObjectStore::new(c.clone()).await?),
            StoreConfig::InMemory => Self::InMemory(InMemoryObjectStore::new()),
        })
    }
}

#[async_trait]
impl ObjectStore for ObjectStoreBackend {
    async fn put_object(&mut self, bucket: &str, key: &str, body: &str) -> Result<()> {
        match self {
            ObjectStoreBackend::InMemory(i) => i.put_object(bucket, key, body).await,
            ObjectStoreBackend::File(f) => f.put_object(bucket, key, body).await,
        }
    }
}

#[derive(Debug)]
pub enum ParameterStoreBackend {
    InMemory(InMemoryParameterStore),
    File(FileParameterStore),
}

impl ParameterStoreBackend {
    pub async fn from_config(config: &ParameterConfig) -> Result<Self> {
        Ok(match config {
            ParameterConfig::File(c) => Self::File(FileParameterStore::new(c.clone()).await?),
            ParameterConfig::InMemory(c) => {
                Self::InMemory(InMemoryParameterStore::new(c.values.clone()))
            }
        })
    }
}

#[async_trait]
impl ParameterStore for ParameterStoreBackend {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        match self {
            ParameterStoreBackend::InMemory(i) => i.get_parameter(name).await,
            ParameterStoreBackend::File(f) => f.get_parameter(name).await,
        }
    }
}

#[derive(Debug)]
pub enum TransferBackend {
    InMemory(InMemoryTransferTrigger),
    File(FileTransferTrigger),
}

impl TransferBackend {
    /// The file connector reads staged objects straight out of the file store,
    /// so it needs to know where that store lives.
    pub async fn from_config(config: &TransferConfig, store: &StoreConfig) -> Result<Self> {
        Ok(match (config, store) {
            (TransferConfig::File(c), StoreConfig::File(s)) => Self::File(
                FileTransferTrigger::new(c.clone(), s.root_dir.clone()).await?,
            ),
            (TransferConfig::File(_), StoreConfig::InMemory) => anyhow::bail!(
                "💀 The file transfer connector reads staged files from disk, \
                 but the object store is in memory. Pick a lane: use a File store_config."
            ),
            (TransferConfig::InMemory, _) => Self::InMemory(InMemoryTransferTrigger::new()),
        })
    }
}

#[async_trait]
impl TransferTrigger for TransferBackend {
    async fn start_file_transfer(&mut self, request: &TransferRequest) -> Result<TransferReceipt> {
        match self {
            TransferBackend::InMemory(i) => i.start_file_transfer(request).await,
            TransferBackend::File(f) => f.start_file_transfer(request).await,
        }
    }
}

#[derive(Debug)]
pub enum ErrorStreamBackend {
    InMemory(InMemoryErrorStream),
    File(FileErrorStream),
}

impl ErrorStreamBackend {
    pub async fn from_config(config: &ErrorStreamConfig) -> Result<Self> {
        Ok(match config {
            ErrorStreamConfig::File(c) => Self::File(FileErrorStream::new(c.clone()).await?),
            ErrorStreamConfig::InMemory => Self::InMemory(InMemoryErrorStream::new()),
        })
    }
}

#[async_trait]
impl ErrorStream for ErrorStreamBackend {
    async fn put_record(
        &mut self,
        stream_arn: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<()> {
        match self {
            ErrorStreamBackend::InMemory(i) => i.put_record(stream_arn, partition_key, data).await,
            ErrorStreamBackend::File(f) => f.put_record(stream_arn, partition_key, data).await,
        }
    }
}
