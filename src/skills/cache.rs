use super::catalog::Catalog;
use super::front_matter::{split_front_matter, FrontMatter};
use super::store::DocumentStore;
use crate::error::SkillError;
use crate::telemetry::{TraceEvent, TraceKind, TraceSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

/// Level 2: full instructions for one skill
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDocument {
    pub name: String,
    pub body: String,
    pub front_matter: FrontMatter,
}

/// Level 3: supplementary document scoped to one skill
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDocument {
    pub capability: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    Capability,
    Reference,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadRecord {
    pub kind: LoadKind,
    pub capability: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
    pub cache_hit: bool,
}

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Where skill documents live. Each run opens its own `SkillCache` from it,
/// so nothing loaded for one parcel is served to another.
#[derive(Clone)]
pub struct SkillSource {
    store: Arc<dyn DocumentStore>,
    manifest_path: PathBuf,
}

impl SkillSource {
    pub fn new(store: Arc<dyn DocumentStore>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            manifest_path: manifest_path.into(),
        }
    }

    pub fn open(&self, sink: Arc<dyn TraceSink>) -> SkillCache {
        SkillCache::new(self.store.clone(), self.manifest_path.clone(), sink)
    }
}

/// Run-scoped, progressive-disclosure loader for skills.
///
/// Every key is loaded at most once, even when several stages ask for it at
/// the same moment: callers share a `OnceCell` per key and wait for the
/// winning load. Failed loads leave the slot empty.
pub struct SkillCache {
    store: Arc<dyn DocumentStore>,
    manifest_path: PathBuf,
    sink: Arc<dyn TraceSink>,
    catalog: OnceCell<Arc<Catalog>>,
    capabilities: Mutex<HashMap<String, Slot<CapabilityDocument>>>,
    references: Mutex<HashMap<(String, String), Slot<ReferenceDocument>>>,
    audit: Mutex<Vec<LoadRecord>>,
}

impl SkillCache {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        manifest_path: impl Into<PathBuf>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            store,
            manifest_path: manifest_path.into(),
            sink,
            catalog: OnceCell::new(),
            capabilities: Mutex::new(HashMap::new()),
            references: Mutex::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
        }
    }

    pub async fn resolve_catalog(&self) -> Result<Arc<Catalog>, SkillError> {
        self.catalog
            .get_or_try_init(|| async {
                let start = Instant::now();
                let result = self.read_catalog().await;
                let name = self.manifest_path.display().to_string();
                self.sink.record(match &result {
                    Ok(_) => TraceEvent::ok(TraceKind::CatalogLoad, name, start.elapsed()),
                    Err(e) => TraceEvent::failed(
                        TraceKind::CatalogLoad,
                        name,
                        start.elapsed(),
                        e.to_string(),
                    ),
                });
                result.map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }

    pub async fn load_capability(
        &self,
        name: &str,
    ) -> Result<Arc<CapabilityDocument>, SkillError> {
        let slot = slot_for(&self.capabilities, name.to_string());
        let start = Instant::now();
        let fetched = AtomicBool::new(false);

        let result = slot
            .get_or_try_init(|| async {
                fetched.store(true, Ordering::Relaxed);
                self.fetch_capability(name).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        self.note_load(
            LoadKind::Capability,
            name,
            None,
            start,
            result.as_ref().err(),
            !fetched.load(Ordering::Relaxed),
        );
        result
    }

    pub async fn load_reference(
        &self,
        capability: &str,
        reference: &str,
    ) -> Result<Arc<ReferenceDocument>, SkillError> {
        let slot = slot_for(
            &self.references,
            (capability.to_string(), reference.to_string()),
        );
        let start = Instant::now();
        let fetched = AtomicBool::new(false);

        let result = slot
            .get_or_try_init(|| async {
                fetched.store(true, Ordering::Relaxed);
                self.fetch_reference(capability, reference)
                    .await
                    .map(Arc::new)
            })
            .await
            .map(Arc::clone);

        self.note_load(
            LoadKind::Reference,
            capability,
            Some(reference),
            start,
            result.as_ref().err(),
            !fetched.load(Ordering::Relaxed),
        );
        result
    }

    /// Successful loads in the order they were served
    pub fn audit_trail(&self) -> Vec<LoadRecord> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn read_catalog(&self) -> Result<Catalog, SkillError> {
        let content = self
            .store
            .read(&self.manifest_path)
            .await
            .map_err(|source| SkillError::Io {
                path: self.store.locate(&self.manifest_path),
                source,
            })?
            .ok_or_else(|| SkillError::CatalogNotFound(self.store.locate(&self.manifest_path)))?;

        let catalog = Catalog::parse(&content)?;
        debug!(
            "Loaded skills catalog v{} with {} entries",
            catalog.version,
            catalog.entries().len()
        );
        Ok(catalog)
    }

    async fn fetch_capability(&self, name: &str) -> Result<CapabilityDocument, SkillError> {
        let catalog = self.resolve_catalog().await?;
        let entry = catalog
            .get(name)
            .ok_or_else(|| SkillError::UnknownCapability(name.to_string()))?;

        let content = self
            .store
            .read(&entry.storage_path)
            .await
            .map_err(|source| SkillError::Io {
                path: self.store.locate(&entry.storage_path),
                source,
            })?
            .ok_or_else(|| SkillError::DocumentNotFound {
                skill: name.to_string(),
                path: self.store.locate(&entry.storage_path),
            })?;

        let (front_matter, body) = split_front_matter(&content);
        debug!("Loaded skill {} ({} bytes)", name, body.len());
        Ok(CapabilityDocument {
            name: name.to_string(),
            body,
            front_matter,
        })
    }

    async fn fetch_reference(
        &self,
        capability: &str,
        reference: &str,
    ) -> Result<ReferenceDocument, SkillError> {
        let catalog = self.resolve_catalog().await?;
        let entry = catalog
            .get(capability)
            .ok_or_else(|| SkillError::UnknownCapability(capability.to_string()))?;

        let not_found = || SkillError::ReferenceNotFound {
            skill: capability.to_string(),
            reference: reference.to_string(),
        };

        // references are plain file names inside the skill's references/ folder
        let mut components = Path::new(reference).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(not_found());
        }

        let path = entry.reference_path(reference);
        let content = self
            .store
            .read(&path)
            .await
            .map_err(|source| SkillError::Io {
                path: self.store.locate(&path),
                source,
            })?
            .ok_or_else(not_found)?;

        Ok(ReferenceDocument {
            capability: capability.to_string(),
            name: reference.to_string(),
            content,
        })
    }

    fn note_load(
        &self,
        kind: LoadKind,
        capability: &str,
        reference: Option<&str>,
        start: Instant,
        error: Option<&SkillError>,
        cache_hit: bool,
    ) {
        let trace_kind = match kind {
            LoadKind::Capability => TraceKind::CapabilityLoad,
            LoadKind::Reference => TraceKind::ReferenceLoad,
        };
        let name = match reference {
            Some(r) => format!("{}/{}", capability, r),
            None => capability.to_string(),
        };

        match error {
            Some(e) => {
                self.sink.record(TraceEvent::failed(
                    trace_kind,
                    name,
                    start.elapsed(),
                    e.to_string(),
                ));
            }
            None => {
                // hits are served from memory and not reported as loads
                if !cache_hit {
                    let tokens = match kind {
                        LoadKind::Capability => self
                            .catalog
                            .get()
                            .and_then(|catalog| catalog.get(capability))
                            .map(|entry| entry.token_estimate),
                        LoadKind::Reference => None,
                    };
                    self.sink.record(
                        TraceEvent::ok(trace_kind, name, start.elapsed()).with_tokens(tokens),
                    );
                }
                self.audit
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(LoadRecord {
                        kind,
                        capability: capability.to_string(),
                        reference: reference.map(str::to_string),
                        at: Utc::now(),
                        cache_hit,
                    });
            }
        }
    }
}

fn slot_for<K, T>(map: &Mutex<HashMap<K, Slot<T>>>, key: K) -> Slot<T>
where
    K: std::hash::Hash + Eq,
{
    map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_default()
        .clone()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::telemetry::{MetricsSink, NoopSink};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    pub const MANIFEST: &str = r#"
version: "1.0"
updated: "2025-01-10"
total_skills: 5
skills:
  - name: zoning-analysis
    description: Zoning district lookup and dimensional standards
    path: skills/zoning-analysis/SKILL.md
    category: zoning
    priority: 1
    tokens_estimate: 1500
    references: [malabar-zoning.md]
  - name: property-valuation
    description: ARV, comparable sales and max bid
    path: skills/property-valuation/SKILL.md
    category: valuation
    priority: 2
    tokens_estimate: 1200
  - name: permit-lookup
    description: Permit history and code violations
    path: skills/permit-lookup/SKILL.md
    category: permits
    priority: 2
    tokens_estimate: 800
  - name: envelope-development
    description: 3D building envelope
    path: skills/envelope-development/SKILL.md
    category: visualization
    priority: 3
    tokens_estimate: 2000
  - name: sun-analysis
    description: Sun and shadow analysis
    path: skills/sun-analysis/SKILL.md
    category: visualization
    priority: 3
    tokens_estimate: 900
"#;

    /// In-memory store that counts reads and can stall them.
    #[derive(Default)]
    pub struct MemoryStore {
        pub docs: HashMap<PathBuf, String>,
        pub reads: AtomicUsize,
        pub delay: Duration,
    }

    impl MemoryStore {
        pub fn with_skills() -> Self {
            let mut docs = HashMap::new();
            docs.insert(
                PathBuf::from("skills/skills-manifest.yaml"),
                MANIFEST.to_string(),
            );
            for name in [
                "zoning-analysis",
                "property-valuation",
                "permit-lookup",
                "envelope-development",
                "sun-analysis",
            ] {
                docs.insert(
                    PathBuf::from(format!("skills/{}/SKILL.md", name)),
                    format!("---\nname: {}\n---\n# {}\n\nInstructions.", name, name),
                );
            }
            docs.insert(
                PathBuf::from("skills/zoning-analysis/references/malabar-zoning.md"),
                "Malabar LDC table".to_string(),
            );
            docs.insert(
                PathBuf::from("skills/zoning-analysis/references/unlisted.md"),
                "Not in manifest".to_string(),
            );
            Self {
                docs,
                ..Self::default()
            }
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn read(&self, path: &Path) -> std::io::Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.docs.get(path).cloned())
        }
    }

    pub fn source_over(store: Arc<MemoryStore>) -> SkillSource {
        SkillSource::new(store, "skills/skills-manifest.yaml")
    }

    pub fn cache_over(store: Arc<MemoryStore>) -> SkillCache {
        source_over(store).open(Arc::new(NoopSink))
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let store = Arc::new(MemoryStore::with_skills());
        let cache = cache_over(store.clone());

        let first = cache.load_capability("zoning-analysis").await.unwrap();
        let reads_after_first = store.reads();
        let second = cache.load_capability("zoning-analysis").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.reads(), reads_after_first);
        // manifest + document
        assert_eq!(reads_after_first, 2);
        assert_eq!(first.body, "# zoning-analysis\n\nInstructions.");
        assert_eq!(
            first
                .front_matter
                .get("name")
                .and_then(serde_yaml::Value::as_str),
            Some("zoning-analysis")
        );

        let trail = cache.audit_trail();
        assert_eq!(trail.len(), 2);
        assert!(!trail[0].cache_hit);
        assert!(trail[1].cache_hit);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_loads_once() {
        let mut store = MemoryStore::with_skills();
        store.delay = Duration::from_millis(20);
        let store = Arc::new(store);
        let cache = Arc::new(cache_over(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load_capability("sun-analysis").await })
            })
            .collect();

        let mut docs = Vec::new();
        for handle in handles {
            docs.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(store.reads(), 2);
        assert!(docs.iter().all(|d| Arc::ptr_eq(d, &docs[0])));
        let misses = cache
            .audit_trail()
            .iter()
            .filter(|r| !r.cache_hit)
            .count();
        assert_eq!(misses, 1);
    }

    #[tokio::test]
    async fn test_unknown_capability() {
        let cache = cache_over(Arc::new(MemoryStore::with_skills()));
        let err = cache.load_capability("tax-lookup").await.unwrap_err();
        assert!(matches!(err, SkillError::UnknownCapability(ref n) if n == "tax-lookup"));
        assert!(cache.audit_trail().is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        let cache = cache_over(Arc::new(MemoryStore::default()));
        assert!(matches!(
            cache.resolve_catalog().await,
            Err(SkillError::CatalogNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_parsed_once() {
        let store = Arc::new(MemoryStore::with_skills());
        let cache = cache_over(store.clone());
        let a = cache.resolve_catalog().await.unwrap();
        let b = cache.resolve_catalog().await.unwrap();
        cache.load_capability("permit-lookup").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_cached() {
        let mut store = MemoryStore::with_skills();
        store
            .docs
            .remove(&PathBuf::from("skills/permit-lookup/SKILL.md"));
        let store = Arc::new(store);
        let cache = cache_over(store.clone());

        for _ in 0..2 {
            assert!(matches!(
                cache.load_capability("permit-lookup").await,
                Err(SkillError::DocumentNotFound { .. })
            ));
        }
        // manifest once, document attempted twice
        assert_eq!(store.reads(), 3);
    }

    #[tokio::test]
    async fn test_reference_loading() {
        let store = Arc::new(MemoryStore::with_skills());
        let cache = cache_over(store.clone());

        let doc = cache
            .load_reference("zoning-analysis", "malabar-zoning.md")
            .await
            .unwrap();
        assert_eq!(doc.content, "Malabar LDC table");
        let again = cache
            .load_reference("zoning-analysis", "malabar-zoning.md")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&doc, &again));
        assert_eq!(store.reads(), 2);

        // declared list is advisory
        let unlisted = cache
            .load_reference("zoning-analysis", "unlisted.md")
            .await
            .unwrap();
        assert_eq!(unlisted.content, "Not in manifest");
    }

    #[tokio::test]
    async fn test_reference_errors() {
        let cache = cache_over(Arc::new(MemoryStore::with_skills()));
        assert!(matches!(
            cache.load_reference("nope", "x.md").await,
            Err(SkillError::UnknownCapability(_))
        ));
        assert!(matches!(
            cache.load_reference("sun-analysis", "missing.md").await,
            Err(SkillError::ReferenceNotFound { .. })
        ));
        assert!(matches!(
            cache
                .load_reference("zoning-analysis", "../permit-lookup/SKILL.md")
                .await,
            Err(SkillError::ReferenceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_loads_reported_to_sink() {
        let metrics = Arc::new(MetricsSink::default());
        let cache = SkillCache::new(
            Arc::new(MemoryStore::with_skills()),
            "skills/skills-manifest.yaml",
            metrics.clone(),
        );
        cache.load_capability("zoning-analysis").await.unwrap();
        cache.load_capability("zoning-analysis").await.unwrap();
        let _ = cache.load_capability("ghost").await;

        assert_eq!(metrics.stats("zoning-analysis").loads, 1);
        assert_eq!(metrics.stats("ghost").errors, 1);
    }

    #[tokio::test]
    async fn test_token_estimates_follow_first_loads() {
        let metrics = Arc::new(MetricsSink::default());
        let cache = source_over(Arc::new(MemoryStore::with_skills())).open(metrics.clone());
        cache.load_capability("zoning-analysis").await.unwrap();
        cache.load_capability("zoning-analysis").await.unwrap();
        cache.load_capability("permit-lookup").await.unwrap();
        cache
            .load_reference("zoning-analysis", "malabar-zoning.md")
            .await
            .unwrap();

        // 1500 + 800; the hit and the reference add nothing
        assert_eq!(metrics.summary().total_tokens, 2300);
    }
}
