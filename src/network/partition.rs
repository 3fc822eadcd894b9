//! Named partitions of stored responses.
//!
//! Entries inside a partition remember the order they were written in;
//! [`PartitionStore::keys`] returns them oldest first, which is what image
//! trimming relies on. Writing an existing key again moves it to the end.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use super::request::ResponseSnapshot;
use crate::cache::mutex_lock;

const SOURCE: &str = "network::partition";
const ENTRY_SUFFIX: &str = ".json";
const META_SUFFIX: &str = ".meta";

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("partition storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid partition name `{0}`")]
    InvalidName(String),
}

#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), PartitionError>;

    async fn get(&self, name: &str, key: &str) -> Result<Option<ResponseSnapshot>, PartitionError>;

    /// Store `response` under `key`, creating the partition on demand.
    async fn put(
        &self,
        name: &str,
        key: &str,
        response: &ResponseSnapshot,
    ) -> Result<(), PartitionError>;

    async fn delete(&self, name: &str, key: &str) -> Result<bool, PartitionError>;

    /// Keys of a partition, oldest write first. Unknown partitions are empty.
    async fn keys(&self, name: &str) -> Result<Vec<String>, PartitionError>;

    async fn partition_names(&self) -> Result<Vec<String>, PartitionError>;

    async fn delete_partition(&self, name: &str) -> Result<bool, PartitionError>;
}

#[derive(Default)]
struct MemoryPartition {
    next_seq: u64,
    entries: HashMap<String, (u64, ResponseSnapshot)>,
}

/// Process-local partitions, lost on restart.
#[derive(Default)]
pub struct MemoryPartitions {
    partitions: Mutex<BTreeMap<String, MemoryPartition>>,
}

impl MemoryPartitions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitions {
    async fn open(&self, name: &str) -> Result<(), PartitionError> {
        mutex_lock(&self.partitions, SOURCE, "open")
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<ResponseSnapshot>, PartitionError> {
        Ok(mutex_lock(&self.partitions, SOURCE, "get")
            .get(name)
            .and_then(|partition| partition.entries.get(key))
            .map(|(_, response)| response.clone()))
    }

    async fn put(
        &self,
        name: &str,
        key: &str,
        response: &ResponseSnapshot,
    ) -> Result<(), PartitionError> {
        let mut partitions = mutex_lock(&self.partitions, SOURCE, "put");
        let partition = partitions.entry(name.to_string()).or_default();
        let seq = partition.next_seq;
        partition.next_seq += 1;
        partition
            .entries
            .insert(key.to_string(), (seq, response.clone()));
        Ok(())
    }

    async fn delete(&self, name: &str, key: &str) -> Result<bool, PartitionError> {
        Ok(mutex_lock(&self.partitions, SOURCE, "delete")
            .get_mut(name)
            .is_some_and(|partition| partition.entries.remove(key).is_some()))
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, PartitionError> {
        let partitions = mutex_lock(&self.partitions, SOURCE, "keys");
        let Some(partition) = partitions.get(name) else {
            return Ok(Vec::new());
        };
        let mut ordered: Vec<_> = partition
            .entries
            .iter()
            .map(|(key, (seq, _))| (*seq, key.clone()))
            .collect();
        ordered.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(ordered.into_iter().map(|(_, key)| key).collect())
    }

    async fn partition_names(&self) -> Result<Vec<String>, PartitionError> {
        Ok(mutex_lock(&self.partitions, SOURCE, "names")
            .keys()
            .cloned()
            .collect())
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, PartitionError> {
        Ok(mutex_lock(&self.partitions, SOURCE, "delete_partition")
            .remove(name)
            .is_some())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    response: ResponseSnapshot,
}

/// Listing record kept next to each entry so ordering never needs the body.
#[derive(Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    seq: u64,
}

/// Partitions persisted as directories of JSON entries under a root.
///
/// Each partition is a directory named after it. An entry is a pair of files
/// named by the SHA-256 of its key: `<digest>.json` holds the response and
/// `<digest>.meta` holds the key and its sequence number. Sequence numbers
/// come from the wall clock so ordering survives restarts.
pub struct FsPartitions {
    root: PathBuf,
    last_seq: AtomicU64,
}

impl FsPartitions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> Result<PathBuf, PartitionError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PartitionError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn entry_paths(&self, name: &str, key: &str) -> Result<(PathBuf, PathBuf), PartitionError> {
        let dir = self.partition_dir(name)?;
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        Ok((
            dir.join(format!("{digest}{ENTRY_SUFFIX}")),
            dir.join(format!("{digest}{META_SUFFIX}")),
        ))
    }

    fn next_seq(&self) -> u64 {
        let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos()).unwrap_or(0);
        let mut last = self.last_seq.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_seq
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<T>, PartitionError> {
        match tokio::fs::read(path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_atomic(path: &Path, raw: Vec<u8>) -> Result<(), PartitionError> {
        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, raw).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }

    async fn remove_if_present(path: &Path) -> Result<bool, PartitionError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl PartitionStore for FsPartitions {
    async fn open(&self, name: &str) -> Result<(), PartitionError> {
        tokio::fs::create_dir_all(self.partition_dir(name)?).await?;
        Ok(())
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<ResponseSnapshot>, PartitionError> {
        let (entry_path, _) = self.entry_paths(name, key)?;
        Ok(Self::read_json::<StoredEntry>(&entry_path)
            .await?
            .filter(|entry| entry.key == key)
            .map(|entry| entry.response))
    }

    async fn put(
        &self,
        name: &str,
        key: &str,
        response: &ResponseSnapshot,
    ) -> Result<(), PartitionError> {
        self.open(name).await?;
        let (entry_path, meta_path) = self.entry_paths(name, key)?;
        let meta = EntryMeta {
            key: key.to_string(),
            seq: self.next_seq(),
        };
        let entry = StoredEntry {
            key: key.to_string(),
            response: response.clone(),
        };

        // Meta first: an orphaned meta is still listed, so trimming can remove it.
        Self::write_atomic(&meta_path, serde_json::to_vec(&meta)?).await?;
        Self::write_atomic(&entry_path, serde_json::to_vec(&entry)?).await
    }

    async fn delete(&self, name: &str, key: &str) -> Result<bool, PartitionError> {
        let (entry_path, meta_path) = self.entry_paths(name, key)?;
        let entry_removed = Self::remove_if_present(&entry_path).await?;
        let meta_removed = Self::remove_if_present(&meta_path).await?;
        Ok(entry_removed || meta_removed)
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, PartitionError> {
        let dir = self.partition_dir(name)?;
        let mut listing = match tokio::fs::read_dir(&dir).await {
            Ok(listing) => listing,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut ordered = Vec::new();
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            if !path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(META_SUFFIX))
            {
                continue;
            }
            match Self::read_json::<EntryMeta>(&path).await {
                Ok(Some(meta)) => ordered.push((meta.seq, meta.key)),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable cache entry");
                }
            }
        }
        ordered.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(ordered.into_iter().map(|(_, key)| key).collect())
    }

    async fn partition_names(&self) -> Result<Vec<String>, PartitionError> {
        let mut listing = match tokio::fs::read_dir(&self.root).await {
            Ok(listing) => listing,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(item) = listing.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = item.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, PartitionError> {
        match tokio::fs::remove_dir_all(self.partition_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
