use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::snapshot::CatalogSnapshot;

/// Source of catalog data.
pub trait CatalogProvider: Send + Sync {
    /// Identifies the data source. Cache entries are kept per source.
    fn source(&self) -> String;

    /// Changes whenever the served data changes.
    fn version(&self) -> u64;

    fn snapshot(&self) -> Result<CatalogSnapshot>;
}

/// Serves a fixed snapshot.
#[derive(Debug, Clone)]
pub struct StaticCatalogProvider {
    name: String,
    version: u64,
    snapshot: CatalogSnapshot,
}

impl StaticCatalogProvider {
    pub fn new(name: impl Into<String>, version: u64, snapshot: CatalogSnapshot) -> Self {
        Self {
            name: name.into(),
            version,
            snapshot,
        }
    }
}

impl CatalogProvider for StaticCatalogProvider {
    fn source(&self) -> String {
        format!("static:{}", self.name)
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Serves a snapshot stored as JSON on disk. The version is the file's
/// modification time in seconds.
#[derive(Debug, Clone)]
pub struct JsonFileCatalogProvider {
    path: PathBuf,
}

impl JsonFileCatalogProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CatalogProvider for JsonFileCatalogProvider {
    fn source(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn version(&self) -> u64 {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn snapshot(&self) -> Result<CatalogSnapshot> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            CatalogError::Provider(format!("failed to read {}: {e}", self.path.display()))
        })?;
        CatalogSnapshot::from_json_str(&json)
    }
}

#[derive(Debug)]
struct CachedCatalog {
    version: u64,
    catalog: Arc<Catalog>,
}

/// Keeps the most recently linked catalog of each provider source and
/// rebuilds it when that provider reports a new version.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: RwLock<BTreeMap<String, CachedCatalog>>,
}

static GLOBAL_CACHE: Lazy<CatalogCache> = Lazy::new(CatalogCache::new);

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache.
    pub fn global() -> &'static CatalogCache {
        &GLOBAL_CACHE
    }

    pub fn get(&self, provider: &dyn CatalogProvider) -> Result<Arc<Catalog>> {
        let source = provider.source();
        let version = provider.version();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = entries.get(&source) {
                if cached.version == version {
                    return Ok(Arc::clone(&cached.catalog));
                }
            }
        }

        let catalog = Arc::new(Catalog::from_snapshot(provider.snapshot()?)?);
        log::debug!("Catalog cache loaded {source} version {version}");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                source,
                CachedCatalog {
                    version,
                    catalog: Arc::clone(&catalog),
                },
            );
        Ok(catalog)
    }

    pub fn cached_version(&self, provider: &dyn CatalogProvider) -> Option<u64> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider.source())
            .map(|c| c.version)
    }

    pub fn invalidate(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
