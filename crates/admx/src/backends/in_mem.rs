//! # Previously, on admx...
//!
//! 🎬 The job needed a lake, four buckets, a parameter store, an SFTP
//! connector and an error stream. The test had a laptop and forty
//! milliseconds. Something had to give.
//!
//! `in_mem` is what gave. Every collaborator here lives on the heap and
//! vanishes when the test ends. The writers keep what they received behind an
//! `Arc<tokio::sync::Mutex<..>>`, and they're `Clone`, so a test can keep one
//! handle, give the other to the job, and look inside afterwards. Great for
//! assertions, great for trust issues, great for both.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please
//! also deploy a therapist. 🦆

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backends::{
    ErrorStream, ObjectStore, ParameterStore, RecordSource, TransferReceipt, TransferRequest,
    TransferTrigger,
};
use crate::common::SourceRow;

// ===== Record source =====

/// 🧺 Tables keyed by `"<database_path>/<table_name>"`.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<SourceRow>>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordSource {
    tables: BTreeMap<String, Vec<SourceRow>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &InMemorySourceConfig) -> Self {
        Self {
            tables: config.tables.clone(),
        }
    }

    /// 🏗️ Builder-style table registration, for tests that like a fluent sentence.
    pub fn with_table(mut self, database_path: &str, table_name: &str, rows: Vec<SourceRow>) -> Self {
        self.tables
            .insert(format!("{database_path}/{table_name}"), rows);
        self
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn load_table(&mut self, database_path: &str, table_name: &str) -> Result<Vec<SourceRow>> {
        Ok(self
            .tables
            .get(&format!("{database_path}/{table_name}"))
            .cloned()
            .unwrap_or_default())
    }
}

// ===== Object store =====

/// 🔒 The vault. Objects keyed by `"<bucket>/<key>"`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, String>>>,
    failing_buckets: HashSet<String>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔥 Every write to `bucket` fails from now on. For testing the sad path.
    pub fn failing_on(mut self, bucket: &str) -> Self {
        self.failing_buckets.insert(bucket.to_string());
        self
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .await
            .get(&format!("{bucket}/{key}"))
            .cloned()
    }

    /// Every stored `"<bucket>/<key>"`, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&mut self, bucket: &str, key: &str, body: &str) -> Result<()> {
        if self.failing_buckets.contains(bucket) {
            bail!("💀 Access Denied on bucket '{bucket}'. The bouncer checked the list twice.");
        }
        self.objects
            .lock()
            .await
            .insert(format!("{bucket}/{key}"), body.to_string());
        Ok(())
    }
}

// ===== Parameter store =====

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct InMemoryParameterConfig {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryParameterStore {
    values: BTreeMap<String, String>,
}

impl InMemoryParameterStore {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .with_context(|| format!("💀 ParameterNotFound: '{name}'"))
    }
}

// ===== Transfer trigger =====

#[derive(Debug, Default, Clone)]
pub struct InMemoryTransferTrigger {
    requests: Arc<Mutex<Vec<TransferRequest>>>,
    started: Arc<AtomicUsize>,
    refuse: bool,
}

impl InMemoryTransferTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔥 Every transfer is rejected.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub async fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TransferTrigger for InMemoryTransferTrigger {
    async fn start_file_transfer(&mut self, request: &TransferRequest) -> Result<TransferReceipt> {
        if self.refuse {
            bail!(
                "💀 Connector '{}' said no. Connectors are allowed to have boundaries.",
                request.connector_id
            );
        }
        self.requests.lock().await.push(request.clone());
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransferReceipt {
            transfer_id: format!("t-{n:04}"),
        })
    }
}

// ===== Error stream =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub stream_arn: String,
    pub partition_key: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryErrorStream {
    records: Arc<Mutex<Vec<StreamRecord>>>,
    refuse: bool,
}

impl InMemoryErrorStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub async fn records(&self) -> Vec<StreamRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ErrorStream for InMemoryErrorStream {
    async fn put_record(
        &mut self,
        stream_arn: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<()> {
        if self.refuse {
            bail!("💀 ProvisionedThroughputExceeded on '{stream_arn}'. The stream is full of feelings.");
        }
        self.records.lock().await.push(StreamRecord {
            stream_arn: stream_arn.to_string(),
            partition_key: partition_key.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }
}
