//! Lazily filled, generation-tagged storage for evaluated patches.
//!
//! # Layout
//! The cache holds one table per vertex time step and one per user buffer.
//! A table has `slots` entries per primitive, where `slots` is the number of
//! interpolation slots the source buffer needs (see
//! [`slot_count()`](crate::buffer::slot_count)). Slot `s` of primitive `p`
//! lives at entry `slots * p + s`.
//!
//! # Staleness
//! Two counters drive invalidation. The *level* generation is what entries
//! are tagged with: an entry is valid iff its tag equals the current level
//! generation. The *topology* generation only ever advances together with
//! the level generation and tells consumers that the half-edge structure was
//! rebuilt.
//!
//! # Concurrency
//! Every entry sits behind its own [`RwLock`]. A hit only takes the read
//! lock. A miss takes the write lock, checks the tag again and either
//! returns what a racing thread just published or runs the engine and
//! publishes tag and patch together. Readers therefore see the old entry or
//! the new one, never a mix.
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, PoisonError, RwLock,
};

use crate::{Error, Result};

/// Addresses one table of a [`PatchCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    /// The table of vertex time step `n`.
    Vertex(usize),
    /// The table of user buffer `n`.
    User(usize),
}

#[derive(Debug)]
struct CacheEntry<P> {
    tag: u64,
    patch: Option<Arc<P>>,
}

impl<P> Default for CacheEntry<P> {
    fn default() -> Self {
        Self {
            tag: 0,
            patch: None,
        }
    }
}

#[derive(Debug)]
struct Table<P> {
    slots: usize,
    entries: Vec<RwLock<CacheEntry<P>>>,
}

impl<P> Table<P> {
    fn new(primitives: usize, slots: usize) -> Self {
        Self {
            slots,
            entries: (0..primitives * slots).map(|_| RwLock::default()).collect(),
        }
    }
}

/// Cache statistics for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Fetches answered from a valid entry.
    pub hits: usize,
    /// Fetches that ran the engine.
    pub misses: usize,
    /// Engine runs that failed.
    pub failures: usize,
    /// Entries whose tag matches the current level generation.
    pub valid_entries: usize,
    /// Entries over all tables.
    pub entries: usize,
}

impl CacheStats {
    /// Returns the hit rate as a value between 0.0 and 1.0, or 0.0 if
    /// nothing was fetched yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if 0 == total {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Evaluated patches of one mesh, created lazily on first access per
/// generation.
///
/// The cache is `Sync` when `P` is; any number of threads may
/// [`fetch()`](PatchCache::fetch) through a shared reference.
#[derive(Debug)]
pub struct PatchCache<P> {
    primitives: usize,
    vertex_tables: Vec<Table<P>>,
    user_tables: Vec<Table<P>>,
    level_generation: AtomicU64,
    topology_generation: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
    failures: AtomicUsize,
}

impl<P> Default for PatchCache<P> {
    fn default() -> Self {
        Self::new(0, &[], &[])
    }
}

impl<P> PatchCache<P> {
    /// Creates a cache for `primitives` primitives.
    ///
    /// # Arguments
    ///
    /// * `vertex_slots` - Interpolation slots per primitive, one entry per
    ///   vertex time step.
    /// * `user_slots` - Interpolation slots per primitive, one entry per user
    ///   buffer. Use `0` for an unset buffer.
    pub fn new(primitives: usize, vertex_slots: &[usize], user_slots: &[usize]) -> Self {
        Self {
            primitives,
            vertex_tables: vertex_slots
                .iter()
                .map(|&slots| Table::new(primitives, slots))
                .collect(),
            user_tables: user_slots
                .iter()
                .map(|&slots| Table::new(primitives, slots))
                .collect(),
            // Fresh entries carry tag 0 and are stale from the start.
            level_generation: AtomicU64::new(1),
            topology_generation: AtomicU64::new(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn primitives(&self) -> usize {
        self.primitives
    }

    /// Returns the interpolation slots per primitive of `table`.
    pub fn slots(&self, table: CacheTable) -> Result<usize> {
        self.table(table).map(|table| table.slots)
    }

    #[inline]
    pub fn level_generation(&self) -> u64 {
        self.level_generation.load(Ordering::Acquire)
    }

    #[inline]
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation.load(Ordering::Acquire)
    }

    /// Marks every entry stale while keeping the topology generation.
    ///
    /// Used when only tessellation levels changed.
    pub fn invalidate_levels_only(&self) {
        let generation = self.level_generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Patch cache level generation advanced to {}.", generation);
    }

    /// Marks every entry stale and advances the topology generation.
    pub fn invalidate_topology(&self) {
        let topology = self.topology_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let level = self.level_generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "Patch cache topology generation advanced to {} (level generation {}).",
            topology,
            level
        );
    }

    /// Resizes the tables after the mesh changed shape.
    ///
    /// Tables whose primitive and slot counts are unchanged keep their entries
    /// so stale patches can still be recycled; all others start over empty.
    pub fn reset_layout(&mut self, primitives: usize, vertex_slots: &[usize], user_slots: &[usize]) {
        let keep_entries = self.primitives == primitives;
        self.primitives = primitives;

        let resize = |tables: &mut Vec<Table<P>>, slots: &[usize]| {
            tables.truncate(slots.len());
            for (index, &count) in slots.iter().enumerate() {
                match tables.get_mut(index) {
                    Some(table) if keep_entries && table.slots == count => {}
                    Some(table) => *table = Table::new(primitives, count),
                    None => tables.push(Table::new(primitives, count)),
                }
            }
        };
        resize(&mut self.vertex_tables, vertex_slots);
        resize(&mut self.user_tables, user_slots);

        log::debug!(
            "Patch cache laid out for {} primitives, {} vertex and {} user table(s).",
            primitives,
            vertex_slots.len(),
            user_slots.len()
        );
    }

    /// Returns the patch of `(table, primitive, slot)`, running `make` on a
    /// miss.
    ///
    /// `make` receives the stale patch of the entry if no reader still holds
    /// it. When `make` fails the entry stays stale, the error is returned and
    /// the next fetch of the entry tries again.
    pub fn fetch<F>(&self, table: CacheTable, primitive: usize, slot: usize, make: F) -> Result<Arc<P>>
    where
        F: FnOnce(Option<P>) -> Result<P>,
    {
        let entry = self.entry(table, primitive, slot)?;
        let generation = self.level_generation();

        {
            let entry = entry.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(patch) = entry.patch.as_ref().filter(|_| generation == entry.tag) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(patch));
            }
        }

        let mut entry = entry.write().unwrap_or_else(PoisonError::into_inner);
        // The generation may have moved on while we waited, and another
        // thread may have refreshed the entry for it.
        let generation = self.level_generation();
        if let Some(patch) = entry.patch.as_ref().filter(|_| generation == entry.tag) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(patch));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "Patch cache miss: {:?}, primitive {}, slot {}, generation {}.",
            table,
            primitive,
            slot,
            generation
        );

        let recycled = entry
            .patch
            .take()
            .and_then(|patch| Arc::try_unwrap(patch).ok());

        match make(recycled) {
            Ok(patch) => {
                let patch = Arc::new(patch);
                entry.patch = Some(Arc::clone(&patch));
                entry.tag = generation;
                Ok(patch)
            }
            Err(error) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Returns `true` if `(table, primitive, slot)` holds a patch of the
    /// current generation.
    pub fn is_valid(&self, table: CacheTable, primitive: usize, slot: usize) -> bool {
        self.entry(table, primitive, slot).is_ok_and(|entry| {
            let entry = entry.read().unwrap_or_else(PoisonError::into_inner);
            entry.patch.is_some() && self.level_generation() == entry.tag
        })
    }

    pub fn stats(&self) -> CacheStats {
        let generation = self.level_generation();
        let (valid_entries, entries) = self
            .vertex_tables
            .iter()
            .chain(&self.user_tables)
            .flat_map(|table| &table.entries)
            .fold((0, 0), |(valid, total), entry| {
                let entry = entry.read().unwrap_or_else(PoisonError::into_inner);
                let is_valid = entry.patch.is_some() && generation == entry.tag;
                (valid + usize::from(is_valid), total + 1)
            });

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            valid_entries,
            entries,
        }
    }

    /// Resets the hit, miss and failure counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }

    fn table(&self, table: CacheTable) -> Result<&Table<P>> {
        match table {
            CacheTable::Vertex(time_step) => {
                self.vertex_tables
                    .get(time_step)
                    .ok_or(Error::TimeStepOutOfRange {
                        time_step,
                        time_steps: self.vertex_tables.len(),
                    })
            }
            CacheTable::User(buffer) => self
                .user_tables
                .get(buffer)
                .filter(|table| 0 < table.slots)
                .ok_or(Error::UserBufferNotSet(buffer)),
        }
    }

    fn entry(&self, table: CacheTable, primitive: usize, slot: usize) -> Result<&RwLock<CacheEntry<P>>> {
        let table = self.table(table)?;
        Error::check_index(primitive, self.primitives)?;
        if table.slots <= slot {
            return Err(Error::SlotOutOfRange {
                slot,
                slots: table.slots,
            });
        }
        Ok(&table.entries[table.slots * primitive + slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_addressed_by_primitive_and_slot() {
        let cache = PatchCache::<usize>::new(3, &[2], &[]);
        for primitive in 0..3 {
            for slot in 0..2 {
                let patch = cache
                    .fetch(CacheTable::Vertex(0), primitive, slot, |_| Ok(2 * primitive + slot))
                    .unwrap();
                assert_eq!(*patch, 2 * primitive + slot);
            }
        }
        assert_eq!(cache.stats().valid_entries, 6);
        assert!(matches!(
            cache.fetch(CacheTable::Vertex(0), 0, 2, |_| Ok(0)),
            Err(Error::SlotOutOfRange { slot: 2, slots: 2 })
        ));
        assert!(matches!(
            cache.fetch(CacheTable::User(0), 0, 0, |_| Ok(0)),
            Err(Error::UserBufferNotSet(0))
        ));
    }

    #[test]
    fn unchanged_tables_survive_a_layout_reset() {
        let mut cache = PatchCache::<Vec<f32>>::new(2, &[1], &[0]);
        cache
            .fetch(CacheTable::Vertex(0), 1, 0, |_| Ok(vec![1.0; 4]))
            .unwrap();

        cache.invalidate_topology();
        cache.reset_layout(2, &[1], &[1]);

        let mut recycled = None;
        cache
            .fetch(CacheTable::Vertex(0), 1, 0, |stale| {
                recycled = stale;
                Ok(vec![2.0; 4])
            })
            .unwrap();
        assert_eq!(recycled, Some(vec![1.0; 4]));
        assert_eq!(cache.slots(CacheTable::User(0)).unwrap(), 1);
    }
}
