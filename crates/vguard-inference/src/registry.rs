//! Model registry and lifecycle manager.
//!
//! The registry owns every loaded model. Structure changes (load/unload) are
//! serialized per model id on an async lock; predictions run concurrently on
//! the blocking pool against immutable backends.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vguard_models::{BackendKind, ModelDescriptor};

use crate::backend::{InferenceBackend, ModelInput, ModelOutput};
use crate::error::{InferenceError, InferenceResult};
use crate::factory::BackendFactory;
use crate::metrics;

/// Default idle time after which non-default models are unloaded.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// Accuracy samples retained for the rolling accuracy rate.
const ACCURACY_WINDOW: usize = 1000;

/// Options for [`ModelRegistry::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Loaded as part of startup
    pub high_priority: bool,
}

/// Outcome of a load call.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    /// Zero when the model was already loaded
    pub load_time: Duration,
    pub memory_estimate_mb: u64,
    pub backend: BackendKind,
}

/// Options for [`ModelRegistry::predict`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictOptions {
    /// Externally measured accuracy of this prediction, if known
    pub accuracy: Option<f64>,
}

/// Outcome of a prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub output: ModelOutput,
    pub inference_time: Duration,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub backend: BackendKind,
}

/// Per-model statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub inference_count: u64,
    pub total_inference_time_ms: f64,
    pub average_inference_time_ms: f64,
    pub last_used: DateTime<Utc>,
    pub loaded_at: DateTime<Utc>,
    pub memory_estimate_mb: u64,
    pub backend: BackendKind,
}

/// Aggregate registry metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryMetrics {
    pub total_inferences: u64,
    pub average_inference_time_ms: f64,
    /// Mean of reported accuracies, if any were reported
    pub accuracy_rate: Option<f64>,
    /// Sum of estimates over loaded models
    pub memory_estimate_mb: u64,
    pub models_loaded: usize,
}

/// Catalog entry with load state.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableModel {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    pub is_loaded: bool,
    pub stats: Option<ModelStats>,
}

/// Registry health summary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub models_loaded: usize,
    pub total_models: usize,
    pub is_initialized: bool,
    pub last_optimization: Option<DateTime<Utc>>,
}

struct UsageClock {
    instant: Instant,
    at: DateTime<Utc>,
}

/// A model held by the registry.
pub struct LoadedModel {
    descriptor: ModelDescriptor,
    backend: Arc<dyn InferenceBackend>,
    backend_kind: BackendKind,
    loaded_at: DateTime<Utc>,
    inference_count: AtomicU64,
    total_inference_us: AtomicU64,
    last_used: Mutex<UsageClock>,
}

impl LoadedModel {
    fn new(descriptor: ModelDescriptor, backend: Arc<dyn InferenceBackend>) -> Self {
        let now = Utc::now();
        Self {
            backend_kind: backend.kind(),
            descriptor,
            backend,
            loaded_at: now,
            inference_count: AtomicU64::new(0),
            total_inference_us: AtomicU64::new(0),
            last_used: Mutex::new(UsageClock {
                instant: Instant::now(),
                at: now,
            }),
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    fn record_inference(&self, elapsed: Duration) {
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.total_inference_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if let Ok(mut clock) = self.last_used.lock() {
            clock.instant = Instant::now();
            clock.at = Utc::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .map(|clock| clock.instant.elapsed())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ModelStats {
        let count = self.inference_count.load(Ordering::Relaxed);
        let total_ms = self.total_inference_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let last_used = self
            .last_used
            .lock()
            .map(|clock| clock.at)
            .unwrap_or(self.loaded_at);

        ModelStats {
            inference_count: count,
            total_inference_time_ms: total_ms,
            average_inference_time_ms: if count > 0 { total_ms / count as f64 } else { 0.0 },
            last_used,
            loaded_at: self.loaded_at,
            memory_estimate_mb: self.descriptor.memory_estimate_mb(),
            backend: self.backend_kind,
        }
    }
}

/// Registry of catalog models and their loaded backends.
pub struct ModelRegistry {
    catalog: HashMap<String, ModelDescriptor>,
    factory: Arc<dyn BackendFactory>,
    models: RwLock<HashMap<String, Arc<LoadedModel>>>,
    load_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    idle_threshold: Duration,
    total_inferences: AtomicU64,
    total_inference_us: AtomicU64,
    accuracy_scores: Mutex<VecDeque<f64>>,
    initialized: AtomicBool,
    last_optimization: Mutex<Option<DateTime<Utc>>>,
}

impl ModelRegistry {
    /// Create a registry over `catalog`; nothing is loaded yet.
    pub fn new(catalog: Vec<ModelDescriptor>, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            catalog: catalog.into_iter().map(|d| (d.id.clone(), d)).collect(),
            factory,
            models: RwLock::new(HashMap::new()),
            load_locks: AsyncMutex::new(HashMap::new()),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            total_inferences: AtomicU64::new(0),
            total_inference_us: AtomicU64::new(0),
            accuracy_scores: Mutex::new(VecDeque::new()),
            initialized: AtomicBool::new(false),
            last_optimization: Mutex::new(None),
        }
    }

    /// Set the idle time after which `optimize` evicts non-default models.
    pub fn with_idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = threshold;
        self
    }

    /// Catalog descriptor for an id.
    pub fn descriptor(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.catalog.get(model_id)
    }

    /// Loaded model for an id, if any.
    pub fn loaded(&self, model_id: &str) -> Option<Arc<LoadedModel>> {
        self.models
            .read()
            .ok()
            .and_then(|models| models.get(model_id).cloned())
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.loaded(model_id).is_some()
    }

    fn loaded_count(&self) -> usize {
        self.models.read().map(|m| m.len()).unwrap_or(0)
    }

    async fn load_lock(&self, model_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.load_locks.lock().await;
        locks
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Load a catalog model. Idempotent: an already-loaded model returns a
    /// zero load time. Concurrent loads of one id create a single backend.
    pub async fn load(&self, model_id: &str, options: LoadOptions) -> InferenceResult<LoadResult> {
        let descriptor = self
            .catalog
            .get(model_id)
            .cloned()
            .ok_or_else(|| InferenceError::ModelNotFound(model_id.to_string()))?;

        let lock = self.load_lock(model_id).await;
        let _guard = lock.lock().await;

        if let Some(model) = self.loaded(model_id) {
            debug!(model_id, "Model already loaded");
            return Ok(LoadResult {
                load_time: Duration::ZERO,
                memory_estimate_mb: descriptor.memory_estimate_mb(),
                backend: model.backend_kind(),
            });
        }

        let start = Instant::now();
        let factory = Arc::clone(&self.factory);
        let create_descriptor = descriptor.clone();
        let backend = tokio::task::spawn_blocking(move || factory.create(&create_descriptor))
            .await
            .map_err(|e| InferenceError::internal(format!("Model load task failed: {}", e)))??;

        let model = Arc::new(LoadedModel::new(descriptor.clone(), backend));
        let backend_kind = model.backend_kind();
        let models_loaded = {
            let mut models = self
                .models
                .write()
                .map_err(|_| InferenceError::internal("Registry lock poisoned"))?;
            models.insert(model_id.to_string(), model);
            models.len()
        };
        metrics::set_models_loaded(models_loaded);

        let load_time = start.elapsed();
        info!(
            model_id,
            backend = %backend_kind,
            high_priority = options.high_priority,
            load_time_ms = load_time.as_millis() as u64,
            "Model loaded"
        );

        Ok(LoadResult {
            load_time,
            memory_estimate_mb: descriptor.memory_estimate_mb(),
            backend: backend_kind,
        })
    }

    /// Unload a model, releasing its backend.
    pub async fn unload(&self, model_id: &str) -> InferenceResult<()> {
        self.unload_if(model_id, |_| true).await.map(|_| ())
    }

    /// Unload under the per-id lock if `should_unload` still holds for the
    /// loaded model. Returns whether the model was removed.
    async fn unload_if<P>(&self, model_id: &str, should_unload: P) -> InferenceResult<bool>
    where
        P: FnOnce(&LoadedModel) -> bool,
    {
        if !self.catalog.contains_key(model_id) {
            return Err(InferenceError::ModelNotFound(model_id.to_string()));
        }

        let lock = self.load_lock(model_id).await;
        let _guard = lock.lock().await;

        let (removed, models_loaded) = {
            let mut models = self
                .models
                .write()
                .map_err(|_| InferenceError::internal("Registry lock poisoned"))?;
            let current = models
                .get(model_id)
                .ok_or_else(|| InferenceError::ModelNotLoaded(model_id.to_string()))?;
            if !should_unload(current) {
                return Ok(false);
            }
            (models.remove(model_id), models.len())
        };

        if let Some(model) = removed {
            model.backend.release();
        }
        metrics::set_models_loaded(models_loaded);

        info!(model_id, "Model unloaded");
        Ok(true)
    }

    /// Run inference on a loaded model.
    pub async fn predict(
        &self,
        model_id: &str,
        input: ModelInput,
        options: PredictOptions,
    ) -> InferenceResult<PredictionResult> {
        let model = self
            .loaded(model_id)
            .ok_or_else(|| InferenceError::ModelNotLoaded(model_id.to_string()))?;

        let backend = Arc::clone(&model.backend);
        let start = Instant::now();
        let output = tokio::task::spawn_blocking(move || backend.predict(&input))
            .await
            .map_err(|e| InferenceError::internal(format!("Inference task failed: {}", e)))??;
        let inference_time = start.elapsed();

        model.record_inference(inference_time);
        self.total_inferences.fetch_add(1, Ordering::Relaxed);
        self.total_inference_us
            .fetch_add(inference_time.as_micros() as u64, Ordering::Relaxed);
        if let Some(accuracy) = options.accuracy {
            self.record_accuracy(accuracy);
        }
        metrics::record_inference(model_id, model.backend_kind(), inference_time.as_secs_f64());

        Ok(PredictionResult {
            output,
            inference_time,
            timestamp: Utc::now(),
            model_id: model_id.to_string(),
            backend: model.backend_kind(),
        })
    }

    fn record_accuracy(&self, accuracy: f64) {
        if let Ok(mut scores) = self.accuracy_scores.lock() {
            if scores.len() == ACCURACY_WINDOW {
                scores.pop_front();
            }
            scores.push_back(accuracy);
        }
    }

    /// Unload non-default models idle longer than the idle threshold.
    /// Returns the ids that were unloaded.
    pub async fn optimize(&self) -> Vec<String> {
        let idle: Vec<String> = match self.models.read() {
            Ok(models) => models
                .iter()
                .filter(|(_, m)| !m.descriptor.is_default && m.idle_for() > self.idle_threshold)
                .map(|(id, _)| id.clone())
                .collect(),
            Err(_) => Vec::new(),
        };

        let mut unloaded = Vec::new();
        for model_id in idle {
            // A predict may have touched the model since the scan.
            let threshold = self.idle_threshold;
            match self.unload_if(&model_id, |m| m.idle_for() > threshold).await {
                Ok(true) => unloaded.push(model_id),
                Ok(false) => debug!(model_id = %model_id, "Model used since idle scan, keeping"),
                // Raced with an explicit unload
                Err(InferenceError::ModelNotLoaded(_)) => {}
                Err(e) => warn!(model_id = %model_id, error = %e, "Failed to unload idle model"),
            }
        }

        if let Ok(mut last) = self.last_optimization.lock() {
            *last = Some(Utc::now());
        }
        unloaded
    }

    /// Aggregate metrics snapshot.
    pub fn metrics(&self) -> RegistryMetrics {
        let total = self.total_inferences.load(Ordering::Relaxed);
        let total_ms = self.total_inference_us.load(Ordering::Relaxed) as f64 / 1000.0;

        let (memory_estimate_mb, models_loaded) = self
            .models
            .read()
            .map(|models| {
                (
                    models.values().map(|m| m.descriptor.memory_estimate_mb()).sum(),
                    models.len(),
                )
            })
            .unwrap_or((0, 0));

        let accuracy_rate = self.accuracy_scores.lock().ok().and_then(|scores| {
            (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
        });

        RegistryMetrics {
            total_inferences: total,
            average_inference_time_ms: if total > 0 { total_ms / total as f64 } else { 0.0 },
            accuracy_rate,
            memory_estimate_mb,
            models_loaded,
        }
    }

    /// Load every default model. Failures are logged and skipped.
    /// Returns the ids that ended up loaded.
    pub async fn initialize(&self) -> Vec<String> {
        if self.initialized.load(Ordering::Acquire) {
            return self.loaded_ids();
        }

        let mut defaults: Vec<&ModelDescriptor> =
            self.catalog.values().filter(|d| d.is_default).collect();
        defaults.sort_by(|a, b| a.id.cmp(&b.id));

        for descriptor in defaults {
            let options = LoadOptions {
                high_priority: true,
            };
            if let Err(e) = self.load(&descriptor.id, options).await {
                warn!(model_id = %descriptor.id, error = %e, "Failed to load default model");
            }
        }

        self.initialized.store(true, Ordering::Release);
        info!(models_loaded = self.loaded_count(), "Model registry initialized");
        self.loaded_ids()
    }

    fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .models
            .read()
            .map(|models| models.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// The catalog with load state, sorted by id.
    pub fn available_models(&self) -> Vec<AvailableModel> {
        let mut models: Vec<AvailableModel> = self
            .catalog
            .values()
            .map(|descriptor| {
                let loaded = self.loaded(&descriptor.id);
                AvailableModel {
                    descriptor: descriptor.clone(),
                    is_loaded: loaded.is_some(),
                    stats: loaded.map(|m| m.stats()),
                }
            })
            .collect();
        models.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        models
    }

    /// Statistics of a loaded model.
    pub fn model_stats(&self, model_id: &str) -> Option<ModelStats> {
        self.loaded(model_id).map(|m| m.stats())
    }

    pub fn health_check(&self) -> HealthStatus {
        let healthy = self.models.read().is_ok();
        HealthStatus {
            status: if healthy { "healthy" } else { "unhealthy" },
            models_loaded: self.loaded_count(),
            total_models: self.catalog.len(),
            is_initialized: self.initialized.load(Ordering::Acquire),
            last_optimization: self.last_optimization.lock().ok().and_then(|l| *l),
        }
    }

    /// Run `optimize` every `interval` until `shutdown` flips to true.
    pub fn spawn_maintenance(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let unloaded = self.optimize().await;
                        if !unloaded.is_empty() {
                            info!(count = unloaded.len(), "Maintenance unloaded idle models");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Model maintenance stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        builtin_catalog, ANOMALY_DETECTION_MODEL, FACE_RECOGNITION_MODEL, OBJECT_DETECTION_MODEL,
    };
    use crate::synthetic::SyntheticBackend;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl BackendFactory for CountingFactory {
        fn create(&self, descriptor: &ModelDescriptor) -> InferenceResult<Arc<dyn InferenceBackend>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(SyntheticBackend::new(descriptor.kind)))
        }
    }

    fn registry() -> (Arc<ModelRegistry>, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::default());
        let registry = ModelRegistry::new(builtin_catalog(Path::new("/nonexistent")), factory.clone());
        (Arc::new(registry), factory)
    }

    fn input() -> ModelInput {
        ModelInput::new(vec![0.5; 416 * 416 * 3], 416, 416, 3).unwrap()
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let (registry, factory) = registry();

        let first = registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        let second = registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await.unwrap();

        assert!(first.load_time > Duration::ZERO);
        assert_eq!(second.load_time, Duration::ZERO);
        assert_eq!(first.memory_estimate_mb, 3);
        assert_eq!(second.backend, BackendKind::Synthetic);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_create_one_backend() {
        let (registry, factory) = registry();

        let a = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await })
        };
        let b = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(a.load_time == Duration::ZERO || b.load_time == Duration::ZERO);
        assert_eq!(registry.metrics().models_loaded, 1);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let (registry, _) = registry();
        let err = registry.load("nope", LoadOptions::default()).await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn test_unload_unloaded_model() {
        let (registry, _) = registry();
        let err = registry.unload(OBJECT_DETECTION_MODEL).await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotLoaded(_)));

        registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        registry.unload(OBJECT_DETECTION_MODEL).await.unwrap();
        assert!(!registry.is_loaded(OBJECT_DETECTION_MODEL));
    }

    #[tokio::test]
    async fn test_unload_outside_catalog() {
        let (registry, _) = registry();
        let err = registry.unload("nope").await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
        assert!(registry.load_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_unload_skips_model_used_since_scan() {
        let (registry, _) = registry();
        registry.load(ANOMALY_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        registry
            .predict(ANOMALY_DETECTION_MODEL, input(), PredictOptions::default())
            .await
            .unwrap();

        let threshold = Duration::from_secs(60);
        let removed = registry
            .unload_if(ANOMALY_DETECTION_MODEL, |m| m.idle_for() > threshold)
            .await
            .unwrap();
        assert!(!removed);
        assert!(registry.is_loaded(ANOMALY_DETECTION_MODEL));
    }

    #[tokio::test]
    async fn test_predict_updates_counters() {
        let (registry, _) = registry();

        let err = registry
            .predict(OBJECT_DETECTION_MODEL, input(), PredictOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotLoaded(_)));

        registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        for _ in 0..3 {
            let result = registry
                .predict(
                    OBJECT_DETECTION_MODEL,
                    input(),
                    PredictOptions { accuracy: Some(0.9) },
                )
                .await
                .unwrap();
            assert_eq!(result.backend, BackendKind::Synthetic);
            assert_eq!(result.model_id, OBJECT_DETECTION_MODEL);
            assert!(matches!(result.output, ModelOutput::Objects(_)));
        }

        let stats = registry.model_stats(OBJECT_DETECTION_MODEL).unwrap();
        assert_eq!(stats.inference_count, 3);

        let metrics = registry.metrics();
        assert_eq!(metrics.total_inferences, 3);
        assert_eq!(metrics.models_loaded, 1);
        assert!((metrics.accuracy_rate.unwrap() - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_optimize_keeps_default_models() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ModelRegistry::new(builtin_catalog(Path::new("/nonexistent")), factory)
            .with_idle_threshold(Duration::ZERO);

        registry.load(OBJECT_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        registry.load(ANOMALY_DETECTION_MODEL, LoadOptions::default()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let unloaded = registry.optimize().await;
        assert_eq!(unloaded, vec![ANOMALY_DETECTION_MODEL.to_string()]);
        assert!(registry.is_loaded(OBJECT_DETECTION_MODEL));
        assert!(registry.health_check().last_optimization.is_some());
    }

    #[tokio::test]
    async fn test_initialize_loads_defaults() {
        let (registry, _) = registry();
        let loaded = registry.initialize().await;
        assert_eq!(
            loaded,
            vec![FACE_RECOGNITION_MODEL.to_string(), OBJECT_DETECTION_MODEL.to_string()]
        );

        let health = registry.health_check();
        assert_eq!(health.status, "healthy");
        assert!(health.is_initialized);
        assert_eq!(health.total_models, 4);

        let available = registry.available_models();
        assert_eq!(available.len(), 4);
        assert_eq!(available.iter().filter(|m| m.is_loaded).count(), 2);
    }

    #[tokio::test]
    async fn test_maintenance_stops_on_shutdown() {
        let (registry, _) = registry();
        let (tx, rx) = watch::channel(false);
        let handle = registry.clone().spawn_maintenance(Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(registry.health_check().last_optimization.is_some());
    }
}
