//! Test storage implementations with operation tracing.
//!
//! Provides in-memory storage that records all operations for test assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use strata_core::error::{Error, Result};
use strata_core::storage::{ObjectMeta, StorageBackend, WritePrecondition, WriteResult};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone)]
pub enum StorageOp {
    /// Get operation.
    Get {
        /// Path that was read.
        path: String,
    },
    /// Head operation (metadata only).
    Head {
        /// Path that was checked.
        path: String,
    },
    /// Put operation.
    Put {
        /// Path that was written.
        path: String,
        /// Size of data written.
        size: usize,
        /// Precondition used.
        precondition: WritePrecondition,
    },
    /// Delete operation.
    Delete {
        /// Path that was deleted.
        path: String,
    },
    /// List operation.
    List {
        /// Prefix that was listed.
        prefix: String,
    },
}

impl StorageOp {
    /// True for operations that change stored data.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Put { .. } | Self::Delete { .. })
    }
}

/// In-memory storage backend with operation tracing.
///
/// Records all operations for later assertion in tests. Clones share state,
/// so a test can keep one handle while a job owns another.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryBackend {
    data: Arc<Mutex<HashMap<String, StoredObject>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_paths: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl TracingMemoryBackend {
    /// Creates a new empty tracing storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns recorded puts and deletes.
    #[must_use]
    pub fn mutations(&self) -> Vec<StorageOp> {
        self.operations()
            .into_iter()
            .filter(StorageOp::is_mutation)
            .collect()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for the given path prefix.
    pub fn inject_failure(&self, path: impl Into<String>) {
        self.fail_paths.lock().expect("lock").push(path.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_paths.lock().expect("lock").clear();
    }

    /// Returns all stored paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.data.lock().expect("lock").keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Returns the stored bytes of every object, keyed by path.
    ///
    /// Two equal snapshots mean nothing was written in between.
    #[must_use]
    pub fn contents(&self) -> Vec<(String, Bytes)> {
        let mut contents: Vec<(String, Bytes)> = self
            .data
            .lock()
            .expect("lock")
            .iter()
            .map(|(path, obj)| (path.clone(), obj.data.clone()))
            .collect();
        contents.sort_by(|a, b| a.0.cmp(&b.0));
        contents
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, path: &str) -> Result<()> {
        let fail_paths = self.fail_paths.lock().expect("lock");
        if fail_paths.iter().any(|p| path.starts_with(p)) {
            return Err(Error::Internal {
                message: format!("Injected failure for path: {path}"),
            });
        }
        Ok(())
    }
}

fn meta(path: &str, obj: &StoredObject) -> ObjectMeta {
    ObjectMeta {
        path: path.to_string(),
        size: obj.data.len() as u64,
        version: obj.version.to_string(),
        last_modified: Some(obj.last_modified),
    }
}

#[async_trait::async_trait]
impl StorageBackend for TracingMemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.check_failure(path)?;
        self.record(StorageOp::Get {
            path: path.to_string(),
        });

        let data = self.data.lock().expect("lock");
        data.get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.check_failure(path)?;
        self.record(StorageOp::Head {
            path: path.to_string(),
        });

        let data = self.data.lock().expect("lock");
        Ok(data.get(path).map(|o| meta(path, o)))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        self.check_failure(path)?;
        self.record(StorageOp::Put {
            path: path.to_string(),
            size: data.len(),
            precondition: precondition.clone(),
        });

        let mut store = self.data.lock().expect("lock");
        let existing = store.get(path);

        match &precondition {
            WritePrecondition::None => {}
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = existing {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match existing {
                    Some(obj) if obj.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: obj.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }

        let new_version = existing.map_or(1, |o| o.version + 1);
        store.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::Delete {
            path: path.to_string(),
        });

        self.data.lock().expect("lock").remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.check_failure(prefix)?;
        self.record(StorageOp::List {
            prefix: prefix.to_string(),
        });

        let data = self.data.lock().expect("lock");
        Ok(data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| meta(k, v))
            .collect())
    }
}
