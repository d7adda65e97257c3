//! Catalog persistence.
//!
//! A [`CatalogStore`] holds one [`EndpointCatalog`] per service and replaces
//! it as a whole, so a reader never sees a mix of old and new endpoints.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::catalog::EndpointCatalog;
use crate::error::{Result, StorageError};
use crate::record::ServiceRecord;

/// Storage contract for service catalogs.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Store `catalog`, replacing the service's previous catalog atomically.
    async fn replace_service(&self, catalog: EndpointCatalog) -> Result<()>;

    /// Load a service catalog.
    async fn load_service(&self, service: &str) -> Result<Option<EndpointCatalog>>;

    /// Whether a catalog exists for `service`.
    async fn contains_service(&self, service: &str) -> Result<bool> {
        Ok(self.load_service(service).await?.is_some())
    }

    /// Delete a service catalog. Returns whether one existed.
    async fn remove_service(&self, service: &str) -> Result<bool>;

    /// Names of all stored services, sorted.
    async fn list_services(&self) -> Result<Vec<String>>;
}

/// Keeps catalogs in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    services: RwLock<BTreeMap<String, EndpointCatalog>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn replace_service(&self, catalog: EndpointCatalog) -> Result<()> {
        let service = catalog.service().to_string();
        self.services.write().await.insert(service, catalog);
        Ok(())
    }

    async fn load_service(&self, service: &str) -> Result<Option<EndpointCatalog>> {
        Ok(self.services.read().await.get(service).cloned())
    }

    async fn contains_service(&self, service: &str) -> Result<bool> {
        Ok(self.services.read().await.contains_key(service))
    }

    async fn remove_service(&self, service: &str) -> Result<bool> {
        Ok(self.services.write().await.remove(service).is_some())
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        Ok(self.services.read().await.keys().cloned().collect())
    }
}

/// Stores each service catalog as `<root>/<service>.json`.
///
/// Files are written to a temporary sibling and renamed into place.
#[derive(Debug)]
pub struct JsonCatalogStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCatalogStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", root.display())))?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn service_path(&self, service: &str) -> Result<PathBuf> {
        let valid = !service.is_empty()
            && !service.starts_with('.')
            && !service.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StorageError::InvalidServiceName(service.to_string()).into());
        }
        Ok(self.root.join(format!("{service}.json")))
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn replace_service(&self, catalog: EndpointCatalog) -> Result<()> {
        let path = self.service_path(catalog.service())?;
        let content = serde_json::to_string_pretty(&catalog.to_record())?;

        let _guard = self.write_lock.lock().await;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

        info!(
            "Stored catalog {} ({} endpoints)",
            catalog.service(),
            catalog.len()
        );
        Ok(())
    }

    async fn load_service(&self, service: &str) -> Result<Option<EndpointCatalog>> {
        let path = self.service_path(service)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFile(format!("{}: {e}", path.display())).into());
            }
        };

        let record: ServiceRecord = serde_json::from_str(&content)?;
        debug!("Loaded catalog {service} from {}", path.display());
        EndpointCatalog::from_record(record).map(Some)
    }

    async fn contains_service(&self, service: &str) -> Result<bool> {
        let path = self.service_path(service)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())).into())
    }

    async fn remove_service(&self, service: &str) -> Result<bool> {
        let path = self.service_path(service)?;

        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed catalog {service}");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFile(format!("{}: {e}", path.display())).into()),
        }
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", self.root.display())))?;

        let mut services = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ReadFile(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    services.push(stem.to_string());
                }
            }
        }

        services.sort();
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::record::Endpoint;
    use apiscout_openapi::ServiceInfo;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn catalog(service: &str, paths: &[&str]) -> EndpointCatalog {
        let endpoints = paths
            .iter()
            .enumerate()
            .map(|(i, path)| Endpoint {
                service: service.to_string(),
                path: path.to_string(),
                method: "get".to_string(),
                summary: format!("summary {i}"),
                description: String::new(),
                parameters: Vec::new(),
                definition: "{}".to_string(),
                embedding: Some(vec![i as f32 + 0.5, 1.0 / 3.0]),
            })
            .collect();

        let info = ServiceInfo {
            name: service.to_string(),
            version: "1.0".to_string(),
            ..ServiceInfo::default()
        };
        EndpointCatalog::new(info, "test-model", endpoints).unwrap()
    }

    async fn exercise(store: &dyn CatalogStore) {
        assert_eq!(store.load_service("slack").await.unwrap(), None);
        assert!(!store.contains_service("slack").await.unwrap());

        assert_ok!(store.replace_service(catalog("slack", &["/a", "/b"])).await);
        assert_ok!(store.replace_service(catalog("github", &["/repos"])).await);
        assert_eq!(store.list_services().await.unwrap(), vec!["github", "slack"]);

        assert_ok!(store.replace_service(catalog("slack", &["/c"])).await);
        let loaded = store.load_service("slack").await.unwrap().unwrap();
        assert_eq!(loaded, catalog("slack", &["/c"]));

        assert!(store.remove_service("slack").await.unwrap());
        assert!(!store.remove_service("slack").await.unwrap());
        assert_eq!(store.list_services().await.unwrap(), vec!["github"]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryCatalogStore::new()).await;
    }

    #[tokio::test]
    async fn test_json_store() {
        let temp_dir = TempDir::new().unwrap();
        exercise(&JsonCatalogStore::new(temp_dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_json_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = JsonCatalogStore::new(temp_dir.path()).await.unwrap();
            store.replace_service(catalog("petstore", &["/pets"])).await.unwrap();
        }

        let store = JsonCatalogStore::new(temp_dir.path()).await.unwrap();
        assert_eq!(
            store.load_service("petstore").await.unwrap(),
            Some(catalog("petstore", &["/pets"]))
        );
        assert!(!temp_dir.path().join("petstore.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_path_like_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonCatalogStore::new(temp_dir.path()).await.unwrap();

        for name in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                assert_err!(store.load_service(name).await),
                CatalogError::Storage(StorageError::InvalidServiceName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_json_store_reports_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonCatalogStore::new(temp_dir.path()).await.unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();

        assert!(matches!(
            store.load_service("broken").await,
            Err(CatalogError::Serialization(_))
        ));
    }
}
