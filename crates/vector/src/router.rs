//! Backend selection with graceful degradation
//!
//! The router picks a tier on first use and delegates every operation to
//! it. Selection order: environment override, preferred tier, fallback
//! chain, then the in-memory tier, each step taken only if that tier's
//! probe succeeds and the tier starts. Selection runs once under a mutex
//! and is memoized.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vecroute_common::{AppConfig, Result, VecRouteError, BACKEND_OVERRIDE_ENV};

use crate::backend::{BackendKind, VectorBackend};
use crate::memory::MemoryBackend;
use crate::metric::DistanceMetric;
use crate::persistent::PersistentLogBackend;
use crate::sql::{NativeOperator, SqlBackendConfig, SqlExecutor, SqlNativeBackend};
use crate::store::{FileRecordStore, RecordStore};
use crate::types::{Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput};

/// Result of a tier availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub available: bool,
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Embedding dimension
    pub dimension: usize,

    /// Distance metric
    pub metric: DistanceMetric,

    /// Key namespace for the persistent log tier
    pub namespace: String,

    /// Tier tried right after the environment override
    pub preferred: Option<BackendKind>,

    /// Tiers tried in order after the preferred one
    pub fallback_chain: Vec<BackendKind>,

    /// Environment variable naming an override tier, if overrides are honored
    pub override_var: Option<String>,

    /// Directory for a file record store
    pub store_path: Option<PathBuf>,

    /// SQL engine connection URL
    ///
    /// Only gates the SQL-native probe. The injected [`SqlExecutor`] owns
    /// the connection and is expected to have been built from this URL.
    pub database_url: Option<String>,

    /// SQL schema layout
    pub sql: SqlBackendConfig,
}

impl RouterSettings {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            namespace: "vectors".to_string(),
            preferred: None,
            fallback_chain: Vec::new(),
            override_var: Some(BACKEND_OVERRIDE_ENV.to_string()),
            store_path: None,
            database_url: None,
            sql: SqlBackendConfig::default(),
        }
    }

    /// Typed settings from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let preferred = config
            .preferred_backend
            .as_deref()
            .map(str::parse::<BackendKind>)
            .transpose()?;
        let fallback_chain = config
            .fallback_chain
            .iter()
            .map(|name| name.parse::<BackendKind>())
            .collect::<Result<Vec<BackendKind>>>()?;

        Ok(Self {
            dimension: config.dimension,
            metric: config.metric.parse()?,
            namespace: config.namespace.clone(),
            preferred,
            fallback_chain,
            override_var: Some(config.backend_override_var.clone()),
            store_path: config.store_path.clone(),
            database_url: config.database_url.clone(),
            sql: SqlBackendConfig::from_config(config),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_preferred(mut self, kind: BackendKind) -> Self {
        self.preferred = Some(kind);
        self
    }

    pub fn with_fallback_chain(mut self, chain: Vec<BackendKind>) -> Self {
        self.fallback_chain = chain;
        self
    }

    pub fn with_override_var(mut self, var: Option<String>) -> Self {
        self.override_var = var;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_sql_config(mut self, sql: SqlBackendConfig) -> Self {
        self.sql = sql;
        self
    }
}

struct Selection {
    kind: BackendKind,
    backend: Arc<dyn VectorBackend>,
}

/// Lazily selecting, delegating backend
pub struct VectorRouter {
    settings: RouterSettings,
    record_store: Option<Arc<dyn RecordStore>>,
    sql_executor: Option<Arc<dyn SqlExecutor>>,
    selection: Mutex<Option<Selection>>,
}

impl VectorRouter {
    pub fn new(settings: RouterSettings) -> Self {
        Self {
            settings,
            record_store: None,
            sql_executor: None,
            selection: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(RouterSettings::from_config(config)?))
    }

    /// Provide the record store used by the persistent log tier
    pub fn with_record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    /// Provide the client used by the SQL-native tier
    pub fn with_sql_executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.sql_executor = Some(executor);
        self
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Check whether `kind` could be constructed right now
    pub fn probe(&self, kind: BackendKind) -> ProbeOutcome {
        match kind {
            BackendKind::Memory => ProbeOutcome::available(),
            BackendKind::PersistentLog => {
                if self.record_store.is_some() || self.settings.store_path.is_some() {
                    ProbeOutcome::available()
                } else {
                    ProbeOutcome::unavailable("no record store provided and no store path configured")
                }
            }
            BackendKind::SqlNative => {
                if self.settings.database_url.is_none() {
                    return ProbeOutcome::unavailable("database URL not configured");
                }
                if self.sql_executor.is_none() {
                    return ProbeOutcome::unavailable("no SQL executor provided");
                }
                if let Err(e) = NativeOperator::for_metric(self.settings.metric) {
                    return ProbeOutcome::unavailable(e.to_string());
                }
                if let Err(e) = self.settings.sql.validate() {
                    return ProbeOutcome::unavailable(e.to_string());
                }
                ProbeOutcome::available()
            }
        }
    }

    pub fn probe_all(&self) -> Vec<(BackendKind, ProbeOutcome)> {
        BackendKind::ALL
            .iter()
            .map(|kind| (*kind, self.probe(*kind)))
            .collect()
    }

    fn env_override(&self) -> Option<BackendKind> {
        let var = self.settings.override_var.as_deref()?;
        let raw = std::env::var(var).ok().filter(|v| !v.trim().is_empty())?;
        match raw.parse() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("Ignoring {}={}: {}", var, raw, e);
                None
            }
        }
    }

    /// Tiers to try, in selection order, ending with memory
    fn candidates(&self) -> Vec<(BackendKind, &'static str)> {
        self.env_override()
            .map(|kind| (kind, "environment override"))
            .into_iter()
            .chain(self.settings.preferred.map(|kind| (kind, "preferred")))
            .chain(
                self.settings
                    .fallback_chain
                    .iter()
                    .map(|kind| (*kind, "fallback chain")),
            )
            .chain(std::iter::once((BackendKind::Memory, "last resort")))
            .collect()
    }

    /// Tier the selection procedure would pick right now, judged by probes alone
    pub fn resolve_kind(&self) -> BackendKind {
        for (kind, step) in self.candidates() {
            let outcome = self.probe(kind);
            if outcome.available {
                return kind;
            }
            debug!(
                "{} backend unavailable ({}): {}",
                kind,
                step,
                outcome.reason.unwrap_or_default()
            );
        }
        BackendKind::Memory
    }

    /// First candidate that probes available and builds
    ///
    /// Build and replay failures are treated like failed probes.
    async fn select(&self) -> Selection {
        for (kind, step) in self.candidates() {
            let outcome = self.probe(kind);
            if !outcome.available {
                warn!(
                    "{} backend unavailable ({}): {}",
                    kind,
                    step,
                    outcome.reason.unwrap_or_default()
                );
                continue;
            }
            match self.build(kind).await {
                Ok(backend) => {
                    info!("Selected {} backend ({})", kind, step);
                    return Selection { kind, backend };
                }
                Err(e) => warn!("{} backend failed to start ({}): {}", kind, step, e),
            }
        }

        let RouterSettings {
            dimension, metric, ..
        } = self.settings;
        Selection {
            kind: BackendKind::Memory,
            backend: Arc::new(MemoryBackend::new(dimension, metric)),
        }
    }

    async fn build(&self, kind: BackendKind) -> Result<Arc<dyn VectorBackend>> {
        let RouterSettings {
            dimension, metric, ..
        } = self.settings;

        match kind {
            BackendKind::Memory => Ok(Arc::new(MemoryBackend::new(dimension, metric))),
            BackendKind::PersistentLog => {
                let store: Arc<dyn RecordStore> = match (&self.record_store, &self.settings.store_path) {
                    (Some(store), _) => store.clone(),
                    (None, Some(path)) => Arc::new(FileRecordStore::open(path.clone()).await?),
                    (None, None) => {
                        return Err(VecRouteError::unavailable(kind.as_str(), "no record store"))
                    }
                };
                let backend = PersistentLogBackend::new(
                    store,
                    self.settings.namespace.clone(),
                    dimension,
                    metric,
                );
                backend.replay().await?;
                Ok(Arc::new(backend))
            }
            BackendKind::SqlNative => {
                let executor = self
                    .sql_executor
                    .clone()
                    .ok_or_else(|| VecRouteError::unavailable(kind.as_str(), "no SQL executor"))?;
                Ok(Arc::new(SqlNativeBackend::new(
                    executor,
                    self.settings.sql.clone(),
                    dimension,
                    metric,
                )?))
            }
        }
    }

    /// Selected backend, selecting (and replaying) on first use
    pub async fn backend(&self) -> Result<Arc<dyn VectorBackend>> {
        let mut selection = self.selection.lock().await;
        if let Some(current) = selection.as_ref() {
            return Ok(current.backend.clone());
        }

        let selected = self.select().await;
        let backend = selected.backend.clone();
        *selection = Some(selected);
        Ok(backend)
    }

    /// Tier currently selected, if any
    pub async fn selected_kind(&self) -> Option<BackendKind> {
        self.selection.lock().await.as_ref().map(|s| s.kind)
    }

    /// Switch to `kind` regardless of the memoized selection
    ///
    /// Fails with `Unavailable` when the probe fails; the prior selection
    /// is kept on any failure.
    pub async fn force_backend(&self, kind: BackendKind) -> Result<()> {
        let outcome = self.probe(kind);
        if !outcome.available {
            return Err(VecRouteError::unavailable(
                kind.as_str(),
                outcome.reason.unwrap_or_default(),
            ));
        }

        let mut selection = self.selection.lock().await;
        let backend = self.build(kind).await?;
        *selection = Some(Selection { kind, backend });

        info!("Forced {} backend", kind);
        Ok(())
    }

    /// Drop the memoized selection; the next operation selects again
    pub async fn reset(&self) {
        if let Some(previous) = self.selection.lock().await.take() {
            debug!("Router reset (was {})", previous.kind);
        }
    }
}

#[async_trait]
impl VectorBackend for VectorRouter {
    fn dimension(&self) -> usize {
        self.settings.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.settings.metric
    }

    async fn add(
        &self,
        id: &str,
        vector: VectorInput,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        self.backend().await?.add(id, vector, metadata).await
    }

    async fn add_batch(&self, entries: Vec<VectorEntry>) -> Result<Vec<String>> {
        self.backend().await?.add_batch(entries).await
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        self.backend().await?.remove(id).await
    }

    async fn clear(&self) -> Result<usize> {
        self.backend().await?.clear().await
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        self.backend().await?.get(id).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.backend().await?.search(query).await
    }

    async fn count(&self) -> Result<usize> {
        self.backend().await?.count().await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.backend().await?.exists(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{SqlRow, SqlValue};
    use crate::store::MemoryRecordStore;

    /// Executor answering every query with a single count row
    struct CountingRows(i64);

    #[async_trait]
    impl SqlExecutor for CountingRows {
        async fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<SqlRow>> {
            Ok(vec![SqlRow::new().with("count", SqlValue::Int(self.0))])
        }

        async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
            Ok(0)
        }
    }

    fn settings() -> RouterSettings {
        RouterSettings::new(4, DistanceMetric::Cosine).with_override_var(None)
    }

    #[test]
    fn test_probes() {
        let router = VectorRouter::new(settings());
        assert!(router.probe(BackendKind::Memory).available);
        assert!(!router.probe(BackendKind::PersistentLog).available);

        let sql = router.probe(BackendKind::SqlNative);
        assert!(!sql.available);
        assert_eq!(sql.reason.as_deref(), Some("database URL not configured"));

        let with_path = VectorRouter::new(settings().with_store_path("/tmp/unused"));
        assert!(with_path.probe(BackendKind::PersistentLog).available);
    }

    #[test]
    fn test_resolve_defaults_to_memory() {
        let router = VectorRouter::new(
            settings().with_fallback_chain(vec![BackendKind::SqlNative, BackendKind::PersistentLog]),
        );
        assert_eq!(router.resolve_kind(), BackendKind::Memory);
    }

    #[test]
    fn test_from_config() {
        let mut config = AppConfig::default();
        config.dimension = 8;
        config.metric = "l2".to_string();
        config.preferred_backend = Some("persistent".to_string());
        config.fallback_chain = vec!["sql".to_string(), "memory".to_string()];

        let settings = RouterSettings::from_config(&config).unwrap();
        assert_eq!(settings.dimension, 8);
        assert_eq!(settings.metric, DistanceMetric::Euclidean);
        assert_eq!(settings.preferred, Some(BackendKind::PersistentLog));
        assert_eq!(
            settings.fallback_chain,
            vec![BackendKind::SqlNative, BackendKind::Memory]
        );

        config.fallback_chain = vec!["redis".to_string()];
        assert!(RouterSettings::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_lazy_selection_and_reset() {
        let store = Arc::new(MemoryRecordStore::new());
        let router = VectorRouter::new(settings().with_preferred(BackendKind::PersistentLog))
            .with_record_store(store.clone());

        assert_eq!(router.selected_kind().await, None);
        router.add("a", vec![1.0, 0.0, 0.0, 0.0].into(), None).await.unwrap();
        assert_eq!(router.selected_kind().await, Some(BackendKind::PersistentLog));
        assert_eq!(store.len().await, 1);

        router.reset().await;
        assert_eq!(router.selected_kind().await, None);

        // reselection replays the store before the first operation
        assert_eq!(router.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_force_unavailable_keeps_selection() {
        let router = VectorRouter::new(settings());
        router.add("a", vec![0.0, 1.0, 0.0, 0.0].into(), None).await.unwrap();
        assert_eq!(router.selected_kind().await, Some(BackendKind::Memory));

        let err = router.force_backend(BackendKind::SqlNative).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(router.selected_kind().await, Some(BackendKind::Memory));
        assert!(router.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_sql_tier_needs_url_executor_and_operator() {
        let chain = vec![BackendKind::SqlNative];

        let no_url = VectorRouter::new(settings().with_fallback_chain(chain.clone()))
            .with_sql_executor(Arc::new(CountingRows(3)));
        assert_eq!(no_url.resolve_kind(), BackendKind::Memory);

        let manhattan = VectorRouter::new(
            RouterSettings::new(4, DistanceMetric::Manhattan)
                .with_override_var(None)
                .with_database_url("postgres://localhost/db")
                .with_fallback_chain(chain.clone()),
        )
        .with_sql_executor(Arc::new(CountingRows(3)));
        assert!(!manhattan.probe(BackendKind::SqlNative).available);

        let router = VectorRouter::new(
            settings()
                .with_database_url("postgres://localhost/db")
                .with_fallback_chain(chain),
        )
        .with_sql_executor(Arc::new(CountingRows(3)));
        assert_eq!(router.count().await.unwrap(), 3);
        assert_eq!(router.selected_kind().await, Some(BackendKind::SqlNative));
    }

    #[tokio::test]
    async fn test_failed_start_falls_through_to_next_tier() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("not_a_dir");
        std::fs::write(&not_a_dir, b"plain file").unwrap();

        let router = VectorRouter::new(
            settings()
                .with_store_path(&not_a_dir)
                .with_fallback_chain(vec![BackendKind::PersistentLog, BackendKind::Memory]),
        );
        assert!(router.probe(BackendKind::PersistentLog).available);

        router.add("a", vec![1.0, 0.0, 0.0, 0.0].into(), None).await.unwrap();
        assert_eq!(router.count().await.unwrap(), 1);
        assert_eq!(router.selected_kind().await, Some(BackendKind::Memory));

        // an explicit switch still reports the failure and keeps the selection
        assert!(router.force_backend(BackendKind::PersistentLog).await.is_err());
        assert_eq!(router.selected_kind().await, Some(BackendKind::Memory));
    }

    #[tokio::test]
    async fn test_cold_start_from_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let make = || {
            VectorRouter::new(
                settings()
                    .with_namespace("notes")
                    .with_store_path(dir.path())
                    .with_preferred(BackendKind::PersistentLog),
            )
        };

        let writer = make();
        writer.add("a", vec![1.0, 0.0, 0.0, 0.0].into(), None).await.unwrap();
        writer.add("b", vec![0.0, 1.0, 0.0, 0.0].into(), None).await.unwrap();
        drop(writer);

        let reader = make();
        let results = reader
            .search(&SearchQuery::new(vec![0.0, 1.0, 0.0, 0.0]).with_limit(1))
            .await
            .unwrap();
        assert_eq!(reader.selected_kind().await, Some(BackendKind::PersistentLog));
        assert_eq!(results[0].id, "b");
        assert_eq!(reader.count().await.unwrap(), 2);
    }
}
