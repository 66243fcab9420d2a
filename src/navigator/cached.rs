//! TTL cache in front of another navigator.
//!
//! Read results are cached per operation and absolute path. Errors are never
//! cached. Entries expire after the configured TTL; an expired entry counts
//! as a miss. Every mutation first invalidates the touched path, its
//! subtree, its parent's entries and every cached tree, then delegates.
//!
//! Changes made behind the cache's back (another process, or direct use of
//! the inner navigator) are served stale until the TTL runs out. The same
//! holds for a fragment mounted at more than one path: a mutation through
//! one mount invalidates that mount only, so cached reads under the other
//! mount stay stale until they expire or [`CachedNavigator::clear`] runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::Navigator;
use crate::config::NodeDefinition;
use crate::defaults::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::error::{Error, Result};
use crate::node::{Node, NodeStatus, TreeView};
use crate::path;

/// Tunables for [`CachedNavigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    /// Maximum number of entries. `0` disables caching.
    pub capacity: usize,
    /// Purge expired entries in the background at this interval.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
            sweep_interval: None,
        }
    }
}

impl CacheSettings {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Node(Option<Node>),
    Children(Vec<Node>),
    Tree(TreeView),
    Status(NodeStatus),
    Lazy(bool),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

type Entries = Arc<RwLock<HashMap<String, CacheEntry>>>;

fn lock_entries(entries: &Entries) -> Result<RwLockWriteGuard<'_, HashMap<String, CacheEntry>>> {
    entries.write().map_err(|_| Error::LockPoisoned {
        context: "navigator cache".to_string(),
    })
}

fn purge(map: &mut HashMap<String, CacheEntry>, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_, entry| entry.expires_at > now);
    before - map.len()
}

fn node_key(target: &str) -> String {
    format!("node:{}", target)
}

fn children_key(target: &str) -> String {
    format!("children:{}", target)
}

fn tree_key(target: &str, depth: Option<usize>) -> String {
    match depth {
        Some(depth) => format!("tree:{}:{}", target, depth),
        None => format!("tree:{}:-1", target),
    }
}

fn status_key(target: &str) -> String {
    format!("status:{}", target)
}

fn lazy_key(target: &str) -> String {
    format!("lazy:{}", target)
}

/// Whether `candidate` is `target` or lies below it.
fn within(candidate: &str, target: &str) -> bool {
    path::is_root(target)
        || candidate == target
        || candidate
            .strip_prefix(target)
            .is_some_and(|rest| rest.starts_with('/'))
}

struct Sweeper {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    fn spawn(entries: Entries, interval: Duration) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Ok(mut map) = entries.write() {
                        let purged = purge(&mut map, Instant::now());
                        if purged > 0 {
                            trace!("Swept {} expired cache entries", purged);
                        }
                    }
                }
                _ => break,
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A [`Navigator`] caching the reads of another one.
pub struct CachedNavigator {
    inner: Arc<dyn Navigator>,
    settings: CacheSettings,
    entries: Entries,
    hits: AtomicU64,
    misses: AtomicU64,
    _sweeper: Option<Sweeper>,
}

impl CachedNavigator {
    pub fn new(inner: Arc<dyn Navigator>, settings: CacheSettings) -> Self {
        let entries: Entries = Arc::new(RwLock::new(HashMap::new()));
        let sweeper = settings
            .sweep_interval
            .map(|interval| Sweeper::spawn(Arc::clone(&entries), interval));
        Self {
            inner,
            settings,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            _sweeper: sweeper,
        }
    }

    pub fn inner(&self) -> &Arc<dyn Navigator> {
        &self.inner
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        lock_entries(&self.entries)?.clear();
        Ok(())
    }

    /// Drop expired entries; returns how many were dropped.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut map = lock_entries(&self.entries)?;
        Ok(purge(&mut map, Instant::now()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn absolute(&self, target: &str) -> Result<String> {
        Ok(path::resolve(&self.inner.current_path()?, target))
    }

    fn lookup(&self, key: &str) -> Result<Option<CachedValue>> {
        let map = self.entries.read().map_err(|_| Error::LockPoisoned {
            context: "navigator cache".to_string(),
        })?;
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn store(&self, key: String, value: CachedValue) -> Result<()> {
        if self.settings.capacity == 0 {
            return Ok(());
        }
        let now = Instant::now();
        let mut map = lock_entries(&self.entries)?;
        if !map.contains_key(&key) && map.len() >= self.settings.capacity {
            purge(&mut map, now);
            if map.len() >= self.settings.capacity {
                let oldest = map
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    trace!("Evicting cache entry {}", oldest);
                    map.remove(&oldest);
                }
            }
        }
        map.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.settings.ttl,
            },
        );
        Ok(())
    }

    /// Drop everything a mutation of `target` could make stale.
    fn invalidate(&self, target: &str) -> Result<()> {
        let parent = path::parent(target);
        let parent_keys: Vec<String> = parent
            .iter()
            .flat_map(|p| [node_key(p), children_key(p), status_key(p)])
            .collect();

        let mut map = lock_entries(&self.entries)?;
        let before = map.len();
        map.retain(|key, _| {
            if parent_keys.contains(key) {
                return false;
            }
            match key.split_once(':') {
                Some(("tree", _)) => false,
                Some((_, cached_path)) => !within(cached_path, target),
                None => true,
            }
        });
        debug!(
            "Invalidated {} cache entries for {}",
            before - map.len(),
            target
        );
        Ok(())
    }
}

impl Navigator for CachedNavigator {
    fn current_path(&self) -> Result<String> {
        self.inner.current_path()
    }

    fn navigate(&self, target: &str) -> Result<String> {
        let target = self.absolute(target)?;
        self.invalidate(&target)?;
        self.inner.navigate(&target)
    }

    fn get_node(&self, target: &str) -> Result<Option<Node>> {
        let target = self.absolute(target)?;
        let key = node_key(&target);
        if let Some(CachedValue::Node(node)) = self.lookup(&key)? {
            return Ok(node);
        }
        let node = self.inner.get_node(&target)?;
        self.store(key, CachedValue::Node(node.clone()))?;
        Ok(node)
    }

    fn list_children(&self, target: &str) -> Result<Vec<Node>> {
        let target = self.absolute(target)?;
        let key = children_key(&target);
        if let Some(CachedValue::Children(children)) = self.lookup(&key)? {
            return Ok(children);
        }
        let children = self.inner.list_children(&target)?;
        self.store(key, CachedValue::Children(children.clone()))?;
        Ok(children)
    }

    fn get_tree(&self, target: &str, depth: Option<usize>) -> Result<TreeView> {
        let target = self.absolute(target)?;
        let key = tree_key(&target, depth);
        if let Some(CachedValue::Tree(tree)) = self.lookup(&key)? {
            return Ok(tree);
        }
        let tree = self.inner.get_tree(&target, depth)?;
        self.store(key, CachedValue::Tree(tree.clone()))?;
        Ok(tree)
    }

    fn get_node_status(&self, target: &str) -> Result<NodeStatus> {
        let target = self.absolute(target)?;
        let key = status_key(&target);
        if let Some(CachedValue::Status(status)) = self.lookup(&key)? {
            return Ok(status);
        }
        let status = self.inner.get_node_status(&target)?;
        self.store(key, CachedValue::Status(status.clone()))?;
        Ok(status)
    }

    fn refresh_status(&self, target: &str) -> Result<()> {
        let target = self.absolute(target)?;
        self.invalidate(&target)?;
        self.inner.refresh_status(&target)
    }

    fn is_lazy(&self, target: &str) -> Result<bool> {
        let target = self.absolute(target)?;
        let key = lazy_key(&target);
        if let Some(CachedValue::Lazy(lazy)) = self.lookup(&key)? {
            return Ok(lazy);
        }
        let lazy = self.inner.is_lazy(&target)?;
        self.store(key, CachedValue::Lazy(lazy))?;
        Ok(lazy)
    }

    fn trigger_lazy_load(&self, target: &str) -> Result<()> {
        let target = self.absolute(target)?;
        self.invalidate(&target)?;
        self.inner.trigger_lazy_load(&target)
    }

    fn add_child(&self, parent: &str, definition: NodeDefinition) -> Result<Node> {
        let parent = self.absolute(parent)?;
        self.invalidate(&path::join(&parent, &definition.name))?;
        self.inner.add_child(&parent, definition)
    }

    fn remove_child(&self, parent: &str, name: &str) -> Result<()> {
        let parent = self.absolute(parent)?;
        self.invalidate(&path::join(&parent, name))?;
        self.inner.remove_child(&parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, FetchPolicy};
    use crate::navigator::MemoryNavigator;

    fn setup(settings: CacheSettings) -> (Arc<MemoryNavigator>, CachedNavigator) {
        let fragment = config::parse(
            "nodes:\n  - name: api\n    url: https://example.com/api.git\n    fetch: lazy\n",
        )
        .unwrap();
        let inner = Arc::new(MemoryNavigator::from_config(&fragment).unwrap());
        let cached = CachedNavigator::new(inner.clone(), settings);
        (inner, cached)
    }

    #[test]
    fn test_within() {
        assert!(within("/a", "/a"));
        assert!(within("/a/b", "/a"));
        assert!(!within("/ab", "/a"));
        assert!(within("/anything", "/"));
    }

    #[test]
    fn test_tree_key_distinguishes_depths() {
        assert_ne!(tree_key("/a", None), tree_key("/a", Some(1)));
        assert_eq!(tree_key("/a", Some(2)), "tree:/a:2");
    }

    #[test]
    fn test_repeated_reads_hit() {
        let (_inner, cached) = setup(CacheSettings::default());
        cached.get_node("/api").unwrap();
        cached.get_node("/api").unwrap();
        assert_eq!(cached.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_relative_and_absolute_share_entries() {
        let (_inner, cached) = setup(CacheSettings::default());
        cached.get_node("api").unwrap();
        cached.get_node("/api").unwrap();
        assert_eq!(cached.stats().hits, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let (_inner, cached) = setup(CacheSettings::default());
        assert!(cached.get_node_status("/").is_err());
        assert!(cached.get_node_status("/").is_err());
        assert!(cached.is_empty());
    }

    #[test]
    fn test_mutation_through_cache_is_never_stale() {
        let (_inner, cached) = setup(CacheSettings::default());
        assert_eq!(cached.list_children("/").unwrap().len(), 1);
        let tree = cached.get_tree("/", None).unwrap();
        assert!(!tree.status("/api").unwrap().cloned);

        cached
            .add_child(
                "/",
                NodeDefinition::repository("web", "https://example.com/web.git")
                    .with_fetch(FetchPolicy::Lazy),
            )
            .unwrap();
        assert_eq!(cached.list_children("/").unwrap().len(), 2);

        cached.trigger_lazy_load("/api").unwrap();
        let tree = cached.get_tree("/", None).unwrap();
        assert!(tree.status("/api").unwrap().cloned);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_inner_changes_are_stale_until_ttl() {
        let (inner, cached) =
            setup(CacheSettings::default().with_ttl(Duration::from_millis(50)));
        assert!(cached.is_lazy("/api").unwrap());

        inner.trigger_lazy_load("/api").unwrap();
        assert!(cached.is_lazy("/api").unwrap());

        thread::sleep(Duration::from_millis(120));
        assert!(!cached.is_lazy("/api").unwrap());
    }

    #[test]
    fn test_capacity_evicts_nearest_expiry() {
        let (_inner, cached) = setup(CacheSettings {
            capacity: 2,
            ..CacheSettings::default()
        });
        cached.get_node("/").unwrap();
        thread::sleep(Duration::from_millis(2));
        cached.get_node("/api").unwrap();
        cached.list_children("/").unwrap();
        assert_eq!(cached.len(), 2);

        // The first entry was evicted, so reading it again misses.
        let misses = cached.stats().misses;
        cached.get_node("/").unwrap();
        assert_eq!(cached.stats().misses, misses + 1);
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let (_inner, cached) = setup(CacheSettings {
            capacity: 0,
            ..CacheSettings::default()
        });
        cached.get_node("/api").unwrap();
        cached.get_node("/api").unwrap();
        assert!(cached.is_empty());
        assert_eq!(cached.stats().hits, 0);
    }

    #[test]
    fn test_purge_expired() {
        let (_inner, cached) =
            setup(CacheSettings::default().with_ttl(Duration::from_millis(10)));
        cached.get_node("/api").unwrap();
        cached.list_children("/").unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(cached.purge_expired().unwrap(), 2);
        assert!(cached.is_empty());
    }

    #[test]
    fn test_background_sweeper_purges() {
        let (_inner, cached) = setup(CacheSettings {
            ttl: Duration::from_millis(10),
            capacity: 16,
            sweep_interval: Some(Duration::from_millis(10)),
        });
        cached.get_node("/api").unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(cached.is_empty());
    }

    #[test]
    fn test_navigate_clears_entries_for_target() {
        let (_inner, cached) = setup(CacheSettings::default());
        assert!(cached.is_lazy("/api").unwrap());
        cached.get_node("/").unwrap();

        cached.navigate("/api").unwrap();
        assert!(!cached.is_lazy("/api").unwrap());
        assert_eq!(cached.current_path().unwrap(), "/api");
    }
}
