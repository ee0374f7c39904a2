//! Extraction plan caching.
//!
//! Building a plan walks the slot declarations of a type and validates their
//! positions. The result only depends on the type, so it is built once and
//! shared by every later dispatch on a subject of that type.
//!
//! ## Cache Strategy
//!
//! - **Key**: `TypeId` of the subject's concrete type
//! - **Value**: `Arc<ExtractionPlan>`, immutable once inserted
//! - **Size**: unbounded; the number of entries is bounded by the number of
//!   visitable types in the program
//! - **Eviction**: none
//! - **Races**: two threads may build the same plan concurrently. The first
//!   insert wins; the other build is discarded and its caller uses the winner.
//!   A failed build inserts nothing.

use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::errors::MalformedDataType;
use crate::extraction::plan::ExtractionPlan;
use crate::extraction::{Subject, Visitable};

/// Process-wide plan cache, for engines that opt into sharing plans
static GLOBAL: Lazy<Arc<PlanCache>> = Lazy::new(|| Arc::new(PlanCache::new()));

/// Concurrent map from data type to its extraction plan.
///
/// Uses DashMap for lock-free reads once a plan is present. Readers see either
/// no entry or a fully built plan.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: DashMap<TypeId, Arc<ExtractionPlan>>,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide cache
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the cached plan for `ty`, if one has been built
    pub fn get(&self, ty: TypeId) -> Option<Arc<ExtractionPlan>> {
        self.plans.get(&ty).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the plan of `subject`'s type, building it on first use
    pub fn get_or_build(&self, subject: &dyn Subject) -> Result<Arc<ExtractionPlan>, MalformedDataType> {
        self.resolve(subject.subject_type().id(), || subject.extraction_plan())
    }

    /// Builds and caches the plan of `T` ahead of any dispatch
    pub fn prepare<T: Visitable>(&self) -> Result<Arc<ExtractionPlan>, MalformedDataType> {
        self.resolve(TypeId::of::<T>(), ExtractionPlan::build::<T>)
    }

    fn resolve(
        &self,
        ty: TypeId,
        build: impl FnOnce() -> Result<ExtractionPlan, MalformedDataType>,
    ) -> Result<Arc<ExtractionPlan>, MalformedDataType> {
        if let Some(plan) = self.get(ty) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(plan);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        // Built outside the map so no shard lock is held while slots are declared
        let built = Arc::new(build()?);
        let plan = Arc::clone(self.plans.entry(ty).or_insert_with(|| Arc::clone(&built)).value());

        if Arc::ptr_eq(&plan, &built) {
            debug!("Cached extraction plan for {} ({} entries)", plan.subject(), self.plans.len());
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("Discarded concurrently built plan for {}", plan.subject());
        }

        Ok(plan)
    }

    /// Returns the current number of cached plans
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Returns true if no plan has been cached
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Returns current cache statistics
    pub fn stats(&self) -> PlanCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        PlanCacheStats {
            size: self.plans.len(),
            hits,
            misses,
            discarded: self.discarded.load(Ordering::Relaxed),
            hit_rate: if total == 0 { None } else { Some(hits as f64 / total as f64) },
        }
    }
}

/// Plan cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCacheStats {
    /// Current number of entries
    pub size: usize,

    /// Lookups answered from the cache
    pub hits: u64,

    /// Lookups that had to build a plan (including failed builds)
    pub misses: u64,

    /// Builds that lost an insertion race
    pub discarded: u64,

    /// Hit rate, once any lookup happened
    pub hit_rate: Option<f64>,
}
