//! Lazy, dependency-ordered service initialization.
//!
//! The outliner needs the catalog, so the two stores come up in order:
//!
//! ```text
//! NotStarted ─► CatalogLoading ─► OutlinerLoading ─► Ready
//!                    │                   │
//!          (error: default catalog)      └─► Failed { step, message }
//! ```
//!
//! [`InitializationCoordinator::ensure_ready`] is single-flight: the first
//! caller runs the work while concurrent callers queue on the same lock and
//! then read the memoized outcome. Every caller gets the same `Arc` store
//! instances, or the same [`InitError`].
//!
//! The work runs in its own task. A caller that is dropped mid-load only
//! stops waiting; the load continues and its outcome is memoized for the
//! next caller.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::catalog::MaterialCatalogStore;
use crate::config::StorageConfig;
use crate::error::{InitError, InitStep};
use crate::outliner::ElementOutlinerStore;

// ═══════════════════════════════════════════════════════════════════════
// Loader seam
// ═══════════════════════════════════════════════════════════════════════

/// Builds and loads the two stores.
///
/// [`FileServiceLoader`] is the production implementation; tests substitute
/// loaders that count, delay or fail.
#[async_trait]
pub trait ServiceLoader: Send + Sync {
    async fn load_catalog(&self) -> Result<Arc<MaterialCatalogStore>>;

    /// In-memory default catalog used when [`load_catalog`](Self::load_catalog) fails.
    fn fallback_catalog(&self) -> Result<Arc<MaterialCatalogStore>>;

    async fn load_outliner(
        &self,
        catalog: Arc<MaterialCatalogStore>,
    ) -> Result<Arc<ElementOutlinerStore>>;
}

/// Loads both stores from the configured data directory.
#[derive(Debug, Clone)]
pub struct FileServiceLoader {
    storage: StorageConfig,
}

impl FileServiceLoader {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ServiceLoader for FileServiceLoader {
    async fn load_catalog(&self) -> Result<Arc<MaterialCatalogStore>> {
        let store = MaterialCatalogStore::new(self.storage.materials_path())?;
        store.load().await;
        Ok(Arc::new(store))
    }

    fn fallback_catalog(&self) -> Result<Arc<MaterialCatalogStore>> {
        Ok(Arc::new(MaterialCatalogStore::with_defaults(
            self.storage.materials_path(),
        )?))
    }

    async fn load_outliner(
        &self,
        catalog: Arc<MaterialCatalogStore>,
    ) -> Result<Arc<ElementOutlinerStore>> {
        let store = ElementOutlinerStore::new(self.storage.elements_path(), catalog)?;
        store.load().await;
        Ok(Arc::new(store))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Coordinator
// ═══════════════════════════════════════════════════════════════════════

/// Both stores, ready for use.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<MaterialCatalogStore>,
    pub outliner: Arc<ElementOutlinerStore>,
}

/// Observable initialization progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    NotStarted,
    CatalogLoading,
    OutlinerLoading,
    Ready,
    Failed { step: InitStep, message: String },
}

pub struct InitializationCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    loader: Box<dyn ServiceLoader>,
    outcome: Mutex<Option<Result<Services, InitError>>>,
    catalog: OnceLock<Arc<MaterialCatalogStore>>,
    outliner: OnceLock<Arc<ElementOutlinerStore>>,
    state: watch::Sender<InitState>,
}

impl InitializationCoordinator {
    pub fn new(loader: impl ServiceLoader + 'static) -> Self {
        let (state, _) = watch::channel(InitState::NotStarted);
        Self {
            inner: Arc::new(CoordinatorInner {
                loader: Box::new(loader),
                outcome: Mutex::new(None),
                catalog: OnceLock::new(),
                outliner: OnceLock::new(),
                state,
            }),
        }
    }

    pub fn from_storage(storage: StorageConfig) -> Self {
        Self::new(FileServiceLoader::new(storage))
    }

    /// Initialize both stores once and return them.
    ///
    /// Safe to call from any number of tasks; only the first does the work.
    /// Must be called from within a Tokio runtime.
    pub async fn ensure_ready(&self) -> Result<Services, InitError> {
        self.settle(false).await
    }

    /// Re-run initialization after a failure.
    ///
    /// Steps that already succeeded are kept, so after an outliner failure
    /// only the outliner is loaded again. A successful outcome is returned
    /// unchanged.
    pub async fn retry(&self) -> Result<Services, InitError> {
        self.settle(true).await
    }

    async fn settle(&self, retry: bool) -> Result<Services, InitError> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.settle(retry).await })
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "initialization task did not complete");
                Err(InitError::Interrupted {
                    message: e.to_string(),
                })
            })
    }

    pub fn state(&self) -> InitState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<InitState> {
        self.inner.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == InitState::Ready
    }

    /// The catalog, once its step has finished (loaded or defaulted).
    ///
    /// Stays available when the outliner step fails afterwards.
    pub fn catalog(&self) -> Option<Arc<MaterialCatalogStore>> {
        self.inner.catalog.get().cloned()
    }

    /// The outliner, once it has loaded.
    pub fn outliner(&self) -> Option<Arc<ElementOutlinerStore>> {
        self.inner.outliner.get().cloned()
    }
}

impl CoordinatorInner {
    async fn settle(&self, retry: bool) -> Result<Services, InitError> {
        let mut outcome = self.outcome.lock().await;
        match outcome.as_ref() {
            Some(Ok(services)) => return Ok(services.clone()),
            Some(Err(err)) if !retry => return Err(err.clone()),
            Some(Err(_)) => tracing::info!("retrying initialization"),
            None => {}
        }
        let result = self.run().await;
        *outcome = Some(result.clone());
        result
    }

    async fn run(&self) -> Result<Services, InitError> {
        let catalog = match self.catalog.get() {
            Some(catalog) => catalog.clone(),
            None => {
                self.set_state(InitState::CatalogLoading);
                let catalog = match self.load_catalog().await {
                    Ok(catalog) => catalog,
                    Err(err) => {
                        self.set_state(InitState::Failed {
                            step: InitStep::Catalog,
                            message: err.to_string(),
                        });
                        return Err(err);
                    }
                };
                self.catalog.get_or_init(|| catalog).clone()
            }
        };

        self.set_state(InitState::OutlinerLoading);
        match self.loader.load_outliner(catalog.clone()).await {
            Ok(outliner) => {
                let outliner = self.outliner.get_or_init(|| outliner).clone();
                self.set_state(InitState::Ready);
                tracing::info!(
                    materials = catalog.len(),
                    elements = outliner.len(),
                    "services ready"
                );
                Ok(Services { catalog, outliner })
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "element outliner failed to load");
                let err = InitError::outliner(&e);
                self.set_state(InitState::Failed {
                    step: InitStep::Outliner,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn load_catalog(&self) -> Result<Arc<MaterialCatalogStore>, InitError> {
        match self.loader.load_catalog().await {
            Ok(catalog) => Ok(catalog),
            Err(e) => {
                tracing::error!(
                    error = %format!("{:#}", e),
                    "material catalog failed to load; using default catalog"
                );
                self.loader
                    .fallback_catalog()
                    .map_err(|e| InitError::catalog(&e))
            }
        }
    }

    fn set_state(&self, state: InitState) {
        tracing::debug!(state = ?state, "initialization state changed");
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::config::SuiteConfig;

    /// Wraps the file loader, counting calls and failing on demand.
    struct CountingLoader {
        inner: FileServiceLoader,
        catalog_calls: Arc<AtomicUsize>,
        outliner_calls: Arc<AtomicUsize>,
        fail_catalog: bool,
        outliner_failures: usize,
    }

    impl CountingLoader {
        fn new(tmp: &TempDir) -> Self {
            Self {
                inner: FileServiceLoader::new(SuiteConfig::with_data_dir(tmp.path()).storage),
                catalog_calls: Arc::new(AtomicUsize::new(0)),
                outliner_calls: Arc::new(AtomicUsize::new(0)),
                fail_catalog: false,
                outliner_failures: 0,
            }
        }
    }

    #[async_trait]
    impl ServiceLoader for CountingLoader {
        async fn load_catalog(&self) -> Result<Arc<MaterialCatalogStore>> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_catalog {
                anyhow::bail!("catalog storage offline");
            }
            self.inner.load_catalog().await
        }

        fn fallback_catalog(&self) -> Result<Arc<MaterialCatalogStore>> {
            self.inner.fallback_catalog()
        }

        async fn load_outliner(
            &self,
            catalog: Arc<MaterialCatalogStore>,
        ) -> Result<Arc<ElementOutlinerStore>> {
            let call = self.outliner_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call < self.outliner_failures {
                anyhow::bail!("elements volume not mounted");
            }
            self.inner.load_outliner(catalog).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_initialization() {
        let tmp = TempDir::new().unwrap();
        let loader = CountingLoader::new(&tmp);
        let catalog_calls = loader.catalog_calls.clone();
        let outliner_calls = loader.outliner_calls.clone();
        let coordinator = InitializationCoordinator::new(loader);

        let (a, b, c) = tokio::join!(
            coordinator.ensure_ready(),
            coordinator.ensure_ready(),
            coordinator.ensure_ready()
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.catalog, &b.catalog));
        assert!(Arc::ptr_eq(&b.catalog, &c.catalog));
        assert!(Arc::ptr_eq(&a.outliner, &c.outliner));
        assert!(Arc::ptr_eq(a.outliner.catalog(), &a.catalog));
        assert_eq!(coordinator.state(), InitState::Ready);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_restart_initialization() {
        let tmp = TempDir::new().unwrap();
        let loader = CountingLoader::new(&tmp);
        let catalog_calls = loader.catalog_calls.clone();
        let outliner_calls = loader.outliner_calls.clone();
        let coordinator = Arc::new(InitializationCoordinator::new(loader));

        let c = coordinator.clone();
        let first = tokio::spawn(async move { c.ensure_ready().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let c = coordinator.clone();
        let second = tokio::spawn(async move { c.ensure_ready().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        first.abort();

        let services = second.await.unwrap().unwrap();

        assert_eq!(catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&coordinator.outliner().unwrap(), &services.outliner));
        assert!(coordinator.is_ready());
    }

    #[tokio::test]
    async fn test_later_callers_get_memoized_services() {
        let tmp = TempDir::new().unwrap();
        let loader = CountingLoader::new(&tmp);
        let catalog_calls = loader.catalog_calls.clone();
        let coordinator = InitializationCoordinator::new(loader);

        let first = coordinator.ensure_ready().await.unwrap();
        let second = coordinator.ensure_ready().await.unwrap();

        assert_eq!(catalog_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.outliner, &second.outliner));
        assert!(Arc::ptr_eq(
            &coordinator.outliner().unwrap(),
            &first.outliner
        ));
    }

    #[tokio::test]
    async fn test_catalog_failure_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let mut loader = CountingLoader::new(&tmp);
        loader.fail_catalog = true;
        let outliner_calls = loader.outliner_calls.clone();
        let coordinator = InitializationCoordinator::new(loader);

        let services = coordinator.ensure_ready().await.unwrap();

        assert_eq!(
            services.catalog.len(),
            crate::catalog::default_materials().len()
        );
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_ready());
    }

    #[tokio::test]
    async fn test_outliner_failure_reaches_every_caller() {
        let tmp = TempDir::new().unwrap();
        let mut loader = CountingLoader::new(&tmp);
        loader.outliner_failures = usize::MAX;
        let outliner_calls = loader.outliner_calls.clone();
        let coordinator = InitializationCoordinator::new(loader);

        let (a, b) = tokio::join!(coordinator.ensure_ready(), coordinator.ensure_ready());
        let (a, b) = (a.err().unwrap(), b.err().unwrap());

        assert_eq!(a, b);
        assert_eq!(a.step(), Some(InitStep::Outliner));
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.catalog().is_some());
        assert!(coordinator.outliner().is_none());
        assert!(matches!(
            coordinator.state(),
            InitState::Failed { step: InitStep::Outliner, .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_reloads_only_the_outliner() {
        let tmp = TempDir::new().unwrap();
        let mut loader = CountingLoader::new(&tmp);
        loader.outliner_failures = 1;
        let catalog_calls = loader.catalog_calls.clone();
        let outliner_calls = loader.outliner_calls.clone();
        let coordinator = InitializationCoordinator::new(loader);

        assert!(coordinator.ensure_ready().await.is_err());
        let catalog_before = coordinator.catalog().unwrap();

        let services = coordinator.retry().await.unwrap();

        assert_eq!(catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&services.catalog, &catalog_before));
        assert!(coordinator.ensure_ready().await.is_ok());
        assert!(coordinator.retry().await.is_ok());
        assert_eq!(outliner_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_state_is_observable() {
        let tmp = TempDir::new().unwrap();
        let coordinator = InitializationCoordinator::new(CountingLoader::new(&tmp));
        let mut rx = coordinator.watch_state();
        assert_eq!(*rx.borrow(), InitState::NotStarted);
        assert!(coordinator.catalog().is_none());

        coordinator.ensure_ready().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), InitState::Ready);
    }

    #[tokio::test]
    async fn test_file_loader_cold_start() {
        let tmp = TempDir::new().unwrap();
        let storage = SuiteConfig::with_data_dir(tmp.path().join("data")).storage;
        let coordinator = InitializationCoordinator::from_storage(storage.clone());

        let services = coordinator.ensure_ready().await.unwrap();

        assert!(!services.catalog.is_empty());
        assert!(services.outliner.is_empty());
        assert!(storage.materials_path().exists());
        assert!(storage.elements_path().exists());
    }
}
