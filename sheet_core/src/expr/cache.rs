//! Least-recently-used cache of compiled formulas

use super::parser::Expr;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Default number of compiled formulas kept around
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug)]
struct CacheEntry {
    expr: Arc<Expr>,
    /// Recency stamp; larger is more recent
    stamp: u64,
}

/// Fixed-capacity LRU keyed by trimmed formula text
///
/// `order` maps recency stamps back to keys so the least recently used entry
/// is always the first one.
#[derive(Debug)]
pub struct ExpressionCache {
    capacity: usize,
    clock: u64,
    entries: HashMap<String, CacheEntry>,
    order: BTreeMap<u64, String>,
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ExpressionCache {
    pub fn with_capacity(capacity: usize) -> Self {
        ExpressionCache {
            capacity,
            clock: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Fetch a compiled formula, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<Arc<Expr>> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, key.to_string());
        Some(Arc::clone(&entry.expr))
    }

    /// Store a compiled formula, evicting the least recently used on overflow
    pub fn insert(&mut self, key: String, expr: Arc<Expr>) {
        if self.capacity == 0 {
            return;
        }
        let stamp = self.tick();
        if let Some(old) = self.entries.insert(key.clone(), CacheEntry { expr, stamp }) {
            self.order.remove(&old.stamp);
        }
        self.order.insert(stamp, key);

        while self.entries.len() > self.capacity {
            let Some((_, evicted)) = self.order.pop_first() else {
                break;
            };
            trace!(formula = %evicted, "evicting compiled formula");
            self.entries.remove(&evicted);
        }
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<&str> {
        self.order.values().map(String::as_str).collect()
    }
}
