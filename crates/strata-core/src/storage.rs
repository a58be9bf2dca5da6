//! Storage backend abstraction for lake tables (S3, local filesystem, memory).
//!
//! Tables are persisted as immutable objects. The only coordination primitive
//! the table layer needs from a backend is a conditional write: a commit that
//! loses a race observes `WriteResult::PreconditionFailed` instead of silently
//! clobbering another writer's snapshot.
//!
//! The version token is an opaque `String` so backends can expose whatever
//! they natively track (numeric generations, `ETag`s, object versions).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt as _;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, UpdateVersion};
use url::Url;

use crate::error::{Error, Result};

/// Precondition for conditional writes.
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if object does not exist.
    DoesNotExist,
    /// Write only if object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns current version token.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path relative to the backend root.
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Opaque object version token.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for object storage.
///
/// Paths are `/`-separated and relative to the backend root.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if precondition not met.
    /// Never returns error for precondition failure - that's a normal result.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes an object.
    ///
    /// Succeeds even if object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// Results are returned in arbitrary order; callers sort when they care.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: self.data.len() as u64,
            version: self.version.to_string(),
            last_modified: Some(self.last_modified),
        }
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;

        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
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
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );
        drop(objects);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| obj.meta(path))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(path).map(|obj| obj.meta(path)))
    }
}

/// Storage backend over any [`object_store::ObjectStore`].
///
/// `DoesNotExist` maps to `PutMode::Create`, which every store used here
/// (local filesystem, S3 with conditional puts, memory) honours atomically.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    root: StorePath,
}

impl ObjectStoreBackend {
    /// Wraps an existing object store, rooting all paths at `root`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, root: StorePath) -> Self {
        Self { store, root }
    }

    /// Creates a backend over a local directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or canonicalized.
    pub fn local(dir: impl AsRef<std::path::Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::storage_with_source(format!("cannot create {}", dir.display()), e)
        })?;
        let store = LocalFileSystem::new_with_prefix(dir).map_err(|e| {
            Error::storage_with_source(format!("cannot open {}", dir.display()), e)
        })?;
        Ok(Self::new(Arc::new(store), StorePath::default()))
    }

    /// Creates a backend from a storage URL (`file://`, `s3://`, `memory://`).
    ///
    /// `options` carries backend configuration such as credentials and region
    /// (e.g. `aws_access_key_id`); nothing is read from the process environment.
    /// A value without a scheme is treated as a local directory, and `file://`
    /// URLs may carry relative paths (`file://./lake`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or names an unsupported scheme.
    pub fn from_url<I, K, V>(raw: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        if let Some(path) = raw.strip_prefix("file://") {
            return Self::local(path);
        }
        let Ok(url) = Url::parse(raw) else {
            return Self::local(raw);
        };
        let (store, root) = object_store::parse_url_opts(&url, options)
            .map_err(|e| Error::storage_with_source(format!("unsupported storage url {raw}"), e))?;
        Ok(Self::new(Arc::from(store), root))
    }

    fn location(&self, path: &str) -> StorePath {
        let root = self.root.as_ref();
        if root.is_empty() {
            StorePath::from(path)
        } else {
            StorePath::from(format!("{root}/{path}"))
        }
    }

    fn relative(&self, location: &StorePath) -> String {
        let full = location.as_ref();
        let root = self.root.as_ref();
        if root.is_empty() {
            return full.to_string();
        }
        full.strip_prefix(root)
            .map_or(full, |rest| rest.trim_start_matches('/'))
            .to_string()
    }

    fn to_meta(&self, meta: object_store::ObjectMeta) -> ObjectMeta {
        ObjectMeta {
            path: self.relative(&meta.location),
            size: u64::try_from(meta.size).unwrap_or(u64::MAX),
            version: meta.e_tag.or(meta.version).unwrap_or_default(),
            last_modified: Some(meta.last_modified),
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = self.location(path);
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::NotFound(format!("object not found: {path}")));
            }
            Err(e) => return Err(Error::storage_with_source(format!("get {path}"), e)),
        };
        result
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source(format!("read {path}"), e))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mode = match precondition {
            WritePrecondition::DoesNotExist => PutMode::Create,
            WritePrecondition::MatchesVersion(version) => PutMode::Update(UpdateVersion {
                e_tag: Some(version),
                version: None,
            }),
            WritePrecondition::None => PutMode::Overwrite,
        };
        let options = PutOptions {
            mode,
            ..PutOptions::default()
        };

        let location = self.location(path);
        match self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await
        {
            Ok(result) => Ok(WriteResult::Success {
                version: result.e_tag.or(result.version).unwrap_or_default(),
            }),
            Err(
                object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. },
            ) => {
                let current_version = self
                    .head(path)
                    .await?
                    .map(|meta| meta.version)
                    .unwrap_or_default();
                Ok(WriteResult::PreconditionFailed { current_version })
            }
            Err(e) => Err(Error::storage_with_source(format!("put {path}"), e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match self.store.delete(&self.location(path)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::storage_with_source(format!("delete {path}"), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        // Listing works on whole path segments; filter the remainder locally.
        let dir = prefix.rsplit_once('/').map_or("", |(dir, _)| dir);
        let dir_location = self.location(dir);
        let listed: Vec<object_store::ObjectMeta> = self
            .store
            .list(Some(&dir_location))
            .try_collect()
            .await
            .map_err(|e| Error::storage_with_source(format!("list {prefix}"), e))?;

        Ok(listed
            .into_iter()
            .map(|meta| self.to_meta(meta))
            .filter(|meta| meta.path.starts_with(prefix))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        match self.store.head(&self.location(path)).await {
            Ok(meta) => Ok(Some(self.to_meta(meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage_with_source(format!("head {path}"), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        let result = backend
            .put("test/file.txt", data.clone(), WritePrecondition::None)
            .await
            .expect("put should succeed");

        assert!(matches!(result, WriteResult::Success { ref version } if version == "1"));

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_precondition_does_not_exist() {
        let backend = MemoryBackend::new();

        let result = backend
            .put(
                "new.txt",
                Bytes::from("data"),
                WritePrecondition::DoesNotExist,
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put(
                "new.txt",
                Bytes::from("data2"),
                WritePrecondition::DoesNotExist,
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
        assert_eq!(backend.get("new.txt").await.unwrap(), Bytes::from("data"));
    }

    #[tokio::test]
    async fn test_precondition_matches_version() {
        let backend = MemoryBackend::new();

        let result = backend
            .put("gen.txt", Bytes::from("v1"), WritePrecondition::None)
            .await
            .expect("should succeed");
        let WriteResult::Success {
            version: first_version,
        } = result
        else {
            panic!("expected success");
        };

        let result = backend
            .put(
                "gen.txt",
                Bytes::from("v2"),
                WritePrecondition::MatchesVersion(first_version.clone()),
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put(
                "gen.txt",
                Bytes::from("v3"),
                WritePrecondition::MatchesVersion(first_version),
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_list_with_prefix_and_delete() {
        let backend = MemoryBackend::new();

        for path in ["a/1.txt", "a/2.txt", "b/1.txt"] {
            backend
                .put(path, Bytes::from("x"), WritePrecondition::None)
                .await
                .unwrap();
        }

        assert_eq!(backend.list("a/").await.unwrap().len(), 2);
        assert_eq!(backend.list("b/").await.unwrap().len(), 1);

        backend.delete("a/1.txt").await.expect("delete");
        backend.delete("a/1.txt").await.expect("delete is idempotent");
        assert!(backend.head("a/1.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_object_store_create_only_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = ObjectStoreBackend::local(dir.path()).expect("backend");

        let first = backend
            .put(
                "gold/t/_versions/0.parquet",
                Bytes::from("one"),
                WritePrecondition::DoesNotExist,
            )
            .await
            .expect("put");
        assert!(matches!(first, WriteResult::Success { .. }));

        let second = backend
            .put(
                "gold/t/_versions/0.parquet",
                Bytes::from("two"),
                WritePrecondition::DoesNotExist,
            )
            .await
            .expect("put");
        assert!(matches!(second, WriteResult::PreconditionFailed { .. }));

        let listed = backend.list("gold/t/_versions/").await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "gold/t/_versions/0.parquet");
        assert_eq!(
            backend.get("gold/t/_versions/0.parquet").await.unwrap(),
            Bytes::from("one")
        );
    }

    #[tokio::test]
    async fn test_local_object_store_missing_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = ObjectStoreBackend::local(dir.path()).expect("backend");

        assert!(backend.head("nope").await.unwrap().is_none());
        assert!(backend.get("nope").await.unwrap_err().is_not_found());
        assert!(backend.list("nothing/here/").await.unwrap().is_empty());
        backend.delete("nope").await.expect("delete missing is ok");
    }

    #[tokio::test]
    async fn test_from_url_memory_scheme() {
        let backend =
            ObjectStoreBackend::from_url("memory:///lake", Vec::<(String, String)>::new())
                .expect("memory url");
        backend
            .put("t/a", Bytes::from("x"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        let listed = backend.list("t/").await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "t/a");
    }

    #[tokio::test]
    async fn test_from_url_file_scheme_uses_local_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("file://{}", dir.path().join("lake").display());
        let backend =
            ObjectStoreBackend::from_url(&url, Vec::<(String, String)>::new()).expect("file url");
        backend
            .put("t/a", Bytes::from("x"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        assert!(dir.path().join("lake/t/a").exists());
    }
}
