//! Integration tests for multi-run documentation generation over a file store.
//!
//! Each test simulates several generator runs against one project directory.
//! A run builds a fresh `CacheContext`, wraps the project's entities, renders
//! them through the cache, and finishes with the end-of-run sweep.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docforge_cache::{
    maintenance, CacheContext, CacheError, CacheableEntity, CacheableMethodSpec, CachedEntity,
    CancelToken, DependencyFingerprint, DurableStore, EntityType, SweepEntity,
};
use docforge_common::{Clock, ContentHash, ManualClock, Timestamp};
use docforge_config::{load_config_from_str, CacheConfig};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper: a method entity whose dependencies are source files
// ---------------------------------------------------------------------------

/// A documented method whose fingerprint is the content hash of each source
/// file it depends on.
struct MethodDoc {
    identity: String,
    sources: Vec<PathBuf>,
    fingerprint: DependencyFingerprint,
    renders: Arc<AtomicUsize>,
}

fn fingerprint_of(sources: &[PathBuf]) -> Result<DependencyFingerprint, CacheError> {
    sources
        .iter()
        .map(|path| {
            let content = fs::read(path).map_err(|e| CacheError::Dependency {
                entity: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let name = path.file_name().map(|n| n.to_string_lossy().to_string());
            Ok(format!(
                "{}:{}",
                name.unwrap_or_default(),
                ContentHash::from_bytes(&content)
            ))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(DependencyFingerprint::new)
}

impl MethodDoc {
    fn load(identity: &str, sources: &[PathBuf], renders: &Arc<AtomicUsize>) -> Self {
        Self {
            identity: identity.to_string(),
            sources: sources.to_vec(),
            fingerprint: fingerprint_of(sources).unwrap(),
            renders: Arc::clone(renders),
        }
    }

    fn render(&self, heading_level: u8) -> String {
        self.renders.fetch_add(1, Ordering::SeqCst);
        format!("{} {}", "#".repeat(heading_level as usize), self.identity)
    }
}

impl CacheableEntity for MethodDoc {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn dependencies(&self) -> Result<DependencyFingerprint, CacheError> {
        Ok(self.fingerprint.clone())
    }

    fn reload_dependencies(&self) -> Result<DependencyFingerprint, CacheError> {
        fingerprint_of(&self.sources)
    }
}

impl EntityType for MethodDoc {
    const TYPE_NAME: &'static str = "MethodDoc";
    const METHODS: &'static [&'static str] = &["render", "summary"];
}

// ---------------------------------------------------------------------------
// Helper: project layout and runs
// ---------------------------------------------------------------------------

struct Project {
    dir: TempDir,
    clock: Arc<ManualClock>,
    renders: Arc<AtomicUsize>,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        Self {
            dir,
            clock: Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000))),
            renders: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write_source(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root().join("src").join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn context(&self, config: &CacheConfig) -> Arc<CacheContext> {
        let context = CacheContext::open(self.root(), config)
            .unwrap()
            .with_clock(Arc::clone(&self.clock) as Arc<dyn Clock>);
        Arc::new(context)
    }

    fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

fn specs() -> Vec<CacheableMethodSpec> {
    vec![CacheableMethodSpec::new("render").with_ttl(Duration::from_secs(60))]
}

fn wrap(
    context: &Arc<CacheContext>,
    project: &Project,
    identity: &str,
    sources: &[PathBuf],
) -> CachedEntity<MethodDoc> {
    let entity = MethodDoc::load(identity, sources, &project.renders);
    context.wrap("MethodDocWrapper", &specs(), entity).unwrap()
}

fn render(entity: &CachedEntity<MethodDoc>) -> String {
    entity
        .call("render", &[serde_json::json!(2)], |m| m.render(2))
        .unwrap()
}

fn finish(context: &CacheContext, entities: &[&CachedEntity<MethodDoc>]) -> usize {
    let sweep: Vec<&dyn SweepEntity> = entities.iter().map(|e| *e as &dyn SweepEntity).collect();
    context
        .update_cache(&sweep, &CancelToken::new())
        .unwrap()
        .flushed
}

// ===========================================================================
// Runs
// ===========================================================================

#[test]
fn second_run_serves_from_disk() {
    let project = Project::new();
    let sources = vec![
        project.write_source("Kernel.php", "class Kernel {}"),
        project.write_source("Bundle.php", "class Bundle {}"),
    ];
    let config = CacheConfig::default();

    let ctx = project.context(&config);
    let boot = wrap(&ctx, &project, "App\\Kernel::boot", &sources);
    assert_eq!(render(&boot), "## App\\Kernel::boot");
    assert_eq!(finish(&ctx, &[&boot]), 1);
    assert_eq!(project.renders(), 1);

    let ctx = project.context(&config);
    let boot = wrap(&ctx, &project, "App\\Kernel::boot", &sources);
    assert_eq!(render(&boot), "## App\\Kernel::boot");
    assert_eq!(project.renders(), 1);
    assert_eq!(finish(&ctx, &[&boot]), 0);
}

#[test]
fn edited_dependency_invalidates_entity() {
    let project = Project::new();
    let sources = vec![
        project.write_source("Kernel.php", "class Kernel {}"),
        project.write_source("Bundle.php", "class Bundle {}"),
    ];
    let config = CacheConfig::default();

    let ctx = project.context(&config);
    let boot = wrap(&ctx, &project, "App\\Kernel::boot", &sources);
    render(&boot);
    finish(&ctx, &[&boot]);

    project.write_source("Bundle.php", "class Bundle { public function boot() {} }");

    // The sweep notices the change and records the new fingerprint.
    let ctx = project.context(&config);
    let boot = wrap(&ctx, &project, "App\\Kernel::boot", &sources);
    let report = ctx
        .update_cache(&[&boot as &dyn SweepEntity], &CancelToken::new())
        .unwrap();
    assert_eq!(report.reloaded, 1);
    assert_eq!(report.flushed, 1);

    // Next run: fresh fingerprint, but the old value is gone.
    let ctx = project.context(&config);
    let boot = wrap(&ctx, &project, "App\\Kernel::boot", &sources);
    render(&boot);
    render(&boot);
    assert_eq!(project.renders(), 2);
    let report = ctx
        .update_cache(&[&boot as &dyn SweepEntity], &CancelToken::new())
        .unwrap();
    assert_eq!(report.reloaded, 0);
    assert_eq!(report.flushed, 1);
}

#[test]
fn values_expire_across_runs() {
    let project = Project::new();
    let sources = vec![
        project.write_source("A.php", "a"),
        project.write_source("B.php", "b"),
    ];
    let config = CacheConfig::default();

    let ctx = project.context(&config);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    finish(&ctx, &[&entity]);

    project.clock.advance(Duration::from_secs(30));
    let ctx = project.context(&config);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    assert_eq!(project.renders(), 1);
    finish(&ctx, &[&entity]);

    project.clock.advance(Duration::from_secs(120));
    let ctx = project.context(&config);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    assert_eq!(project.renders(), 2);
}

#[test]
fn format_version_bump_orphans_old_buckets() {
    let project = Project::new();
    let sources = vec![
        project.write_source("A.php", "a"),
        project.write_source("B.php", "b"),
    ];

    let v6 = load_config_from_str("[project]\nname = \"docs\"\n").unwrap().cache;
    let ctx = project.context(&v6);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    finish(&ctx, &[&entity]);

    let v7 = load_config_from_str("[project]\nname = \"docs\"\n\n[cache]\nformat_version = \"v7\"\n")
        .unwrap()
        .cache;
    let ctx = project.context(&v7);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    assert_eq!(project.renders(), 2);
    finish(&ctx, &[&entity]);

    let durable = ctx.store().durable();
    let histogram = maintenance::version_histogram(durable.as_ref()).unwrap();
    assert_eq!(histogram.get("v6"), Some(&1));
    assert_eq!(histogram.get("v7"), Some(&1));

    assert_eq!(maintenance::collect_garbage(durable.as_ref(), "v7").unwrap(), 1);
    assert_eq!(durable.keys().unwrap(), vec!["v7_App\\A::run"]);
}

#[test]
fn single_dependency_entity_is_never_persisted() {
    let project = Project::new();
    let sources = vec![project.write_source("Root.php", "root")];
    let config = CacheConfig::default();

    let ctx = project.context(&config);
    let root = wrap(&ctx, &project, "App\\Root::run", &sources);
    render(&root);
    render(&root);
    assert_eq!(project.renders(), 2);
    let report = ctx
        .update_cache(&[&root as &dyn SweepEntity], &CancelToken::new())
        .unwrap();

    // The sweep records the fingerprint, but values are still never stored.
    assert_eq!(report.reloaded, 1);
    let ctx = project.context(&config);
    let root = wrap(&ctx, &project, "App\\Root::run", &sources);
    render(&root);
    assert_eq!(project.renders(), 3);
}

#[test]
fn parallel_sweep_over_many_entities() {
    let project = Project::new();
    let sources = vec![
        project.write_source("A.php", "a"),
        project.write_source("B.php", "b"),
    ];
    let config = CacheConfig {
        parallel: true,
        ..CacheConfig::default()
    };

    let ctx = project.context(&config);
    let entities: Vec<CachedEntity<MethodDoc>> = (0..32)
        .map(|i| wrap(&ctx, &project, &format!("App\\A::m{i}"), &sources))
        .collect();
    for entity in entities.iter().step_by(2) {
        render(entity);
    }
    let refs: Vec<&CachedEntity<MethodDoc>> = entities.iter().collect();
    assert_eq!(finish(&ctx, &refs), 32);
    assert_eq!(ctx.proxies().builds(), 1);

    let durable = ctx.store().durable();
    assert_eq!(durable.keys().unwrap().len(), 32);
}

#[test]
fn concurrent_wrapping_builds_one_proxy() {
    let project = Project::new();
    let sources = vec![
        project.write_source("A.php", "a"),
        project.write_source("B.php", "b"),
    ];
    let ctx = project.context(&CacheConfig::default());

    std::thread::scope(|s| {
        for i in 0..8 {
            let ctx = &ctx;
            let project = &project;
            let sources = &sources;
            s.spawn(move || {
                let entity = wrap(ctx, project, &format!("App\\A::t{i}"), sources);
                render(&entity);
                render(&entity);
            });
        }
    });

    assert_eq!(ctx.proxies().builds(), 1);
    assert_eq!(project.renders(), 8);
    assert_eq!(ctx.store().stats().dirty, 8);
}

#[test]
fn disabled_cache_writes_nothing() {
    let project = Project::new();
    let sources = vec![
        project.write_source("A.php", "a"),
        project.write_source("B.php", "b"),
    ];
    let config = CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    };

    let ctx = project.context(&config);
    let entity = wrap(&ctx, &project, "App\\A::run", &sources);
    render(&entity);
    render(&entity);
    assert_eq!(project.renders(), 2);
    assert_eq!(finish(&ctx, &[&entity]), 0);
    assert!(!project.root().join(&config.dir).exists());
}
