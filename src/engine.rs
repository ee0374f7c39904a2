//! Visit engine: resolves and invokes one handler operation per dispatch.
//!
//! The engine owns the handler table of one visit and shares an extraction
//! plan cache. Dispatch is:
//!
//! 1. fetch or build the plan of the subject's runtime type
//! 2. extract the subject and its slot values into a per-thread buffer
//! 3. look up the plan's dispatch key in the handler table
//! 4. invoke the resolved operation with the extracted values
//!
//! An engine is immutable after construction apart from its metrics and the
//! plan cache, so it can be shared freely between threads.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::config::{CollisionPolicy, EngineConfig};
use crate::deferred::{DeferredVisit, PendingVisit};
use crate::errors::{DispatchError, EngineInitError, MalformedDataType};
use crate::extraction::buffer::ExtractionBuffer;
use crate::extraction::plan::ExtractionPlan;
use crate::extraction::{Subject, Visitable};
use crate::handlers::VisitHandler;
use crate::handlers::table::HandlerTable;
use crate::metrics::EngineMetrics;
use crate::plan_cache::PlanCache;

/// Dispatches subjects to the operations `H` registered for one visit,
/// each returning `R`
pub struct VisitEngine<H, R> {
    table: HandlerTable<H, R>,
    plans: Arc<PlanCache>,
    config: EngineConfig,
    metrics: EngineMetrics,
}

impl<H: VisitHandler, R: 'static> VisitEngine<H, R> {
    /// Builds an engine for `visit` with the default configuration
    pub fn new(visit: &str) -> Result<Self, EngineInitError> {
        Self::builder(visit).build()
    }

    pub fn builder(visit: &str) -> EngineBuilder<H, R> {
        EngineBuilder::new(visit)
    }
}

impl<H, R> VisitEngine<H, R> {
    /// Selects the operation matching `subject` and invokes it on `handler`
    pub fn dispatch(&self, handler: &H, subject: &dyn Subject) -> Result<R, DispatchError> {
        self.metrics.record_dispatch();
        let outcome = self.resolve_and_invoke(handler, subject);
        self.metrics.record_outcome(&outcome);
        outcome
    }

    fn resolve_and_invoke(&self, handler: &H, subject: &dyn Subject) -> Result<R, DispatchError> {
        let plan = self.plans.get_or_build(subject)?;

        let mut buffer = if self.config.reuse_buffers {
            ExtractionBuffer::acquire(plan.value_count())
        } else {
            ExtractionBuffer::unpooled(plan.value_count())
        };
        plan.extract_into(subject, &mut buffer)?;

        let key = plan.key();
        let operation = self.table.lookup(key).ok_or_else(|| DispatchError::NoMatchingHandler {
            visit: self.table.visit().to_string(),
            key: key.clone(),
        })?;

        trace!("Dispatching {} to `{}` for visit '{}'", key, operation.name(), self.table.visit());

        operation.invoke(handler, self.table.visit(), buffer.values())
    }

    /// Dispatches every subject on the rayon pool.
    ///
    /// Results are returned in input order.
    pub fn dispatch_par(&self, handler: &H, subjects: &[Arc<dyn Subject>]) -> Vec<Result<R, DispatchError>>
    where
        H: Sync,
        R: Send,
    {
        debug!("Dispatching {} subjects in parallel for visit '{}'", subjects.len(), self.table.visit());

        subjects
            .par_iter()
            .map(|subject| self.dispatch(handler, subject.as_ref()))
            .collect()
    }

    /// Packages one dispatch as a unit of work to run elsewhere.
    ///
    /// The returned [`DeferredVisit`] runs the dispatch once; its result is
    /// delivered to the [`PendingVisit`].
    pub fn defer(self: &Arc<Self>, handler: Arc<H>, subject: Arc<dyn Subject>) -> (DeferredVisit<H, R>, PendingVisit<R>) {
        DeferredVisit::new(Arc::clone(self), handler, subject)
    }

    pub fn table(&self) -> &HandlerTable<H, R> {
        &self.table
    }

    pub fn plan_cache(&self) -> &Arc<PlanCache> {
        &self.plans
    }

    pub fn visit_name(&self) -> &str {
        self.table.visit()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

impl<H, R> fmt::Display for VisitEngine<H, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<VisitEngine for {}#{}>", self.table.handler(), self.table.visit())
    }
}

impl<H, R> fmt::Debug for VisitEngine<H, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

type Prepare = fn(&PlanCache) -> Result<Arc<ExtractionPlan>, MalformedDataType>;

/// Configures and builds a [`VisitEngine`]
pub struct EngineBuilder<H, R> {
    visit: String,
    config: EngineConfig,
    plans: Option<Arc<PlanCache>>,
    prepared: Vec<Prepare>,
    _engine: PhantomData<fn() -> (H, R)>,
}

impl<H: VisitHandler, R: 'static> EngineBuilder<H, R> {
    pub fn new(visit: &str) -> Self {
        Self {
            visit: visit.to_string(),
            config: EngineConfig::default(),
            plans: None,
            prepared: Vec::new(),
            _engine: PhantomData,
        }
    }

    /// Replaces the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn reuse_buffers(mut self, reuse: bool) -> Self {
        self.config.reuse_buffers = reuse;
        self
    }

    /// Shares `plans` with other engines instead of owning a fresh cache
    pub fn plan_cache(mut self, plans: Arc<PlanCache>) -> Self {
        self.plans = Some(plans);
        self
    }

    /// Uses the process-wide [`PlanCache::global`]
    pub fn shared_plan_cache(self) -> Self {
        self.plan_cache(PlanCache::global())
    }

    /// Builds and validates the plan of `T` when the engine is built.
    ///
    /// A malformed `T` then fails construction with
    /// [`EngineInitError::MalformedSubject`] instead of failing its first
    /// dispatch.
    pub fn prepare<T: Visitable>(mut self) -> Self {
        self.prepared.push(PlanCache::prepare::<T>);
        self
    }

    pub fn build(self) -> Result<VisitEngine<H, R>, EngineInitError> {
        let table = HandlerTable::build(&self.visit, self.config.collision_policy)?;
        let plans = self.plans.unwrap_or_default();

        for prepare in &self.prepared {
            let plan = prepare(&plans)?;
            debug!("Prepared {} for {}#{}", plan.key(), table.handler(), table.visit());
        }

        info!(
            "Visit engine ready for {}#{}: {} operations, {} prepared types",
            table.handler(),
            table.visit(),
            table.len(),
            self.prepared.len()
        );

        Ok(VisitEngine {
            table,
            plans,
            config: self.config,
            metrics: EngineMetrics::new(),
        })
    }
}
