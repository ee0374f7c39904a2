//! Visit engines shared between threads, rayon batches and deferred visits

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use multivisit::{DispatchError, PlanCache, Slots, Subject, VisitEngine, VisitHandler, Visitable, VisitingMethods};

struct Fresh {
    id: u64,
}

impl Visitable for Fresh {
    fn slots(slots: &mut Slots<Self>) {
        slots.stored(0, "id", |fresh| &fresh.id);
    }
}

struct Doubler;

impl Doubler {
    fn double(&self, _fresh: &Fresh, id: &u64) -> Result<u64, DispatchError> {
        Ok(id * 2)
    }

    fn explode(&self, _fresh: &Fresh, id: &u64) -> Result<u64, DispatchError> {
        panic!("fresh subject {id} exploded");
    }
}

impl VisitHandler for Doubler {
    fn visiting_methods(methods: &mut VisitingMethods<Self>) {
        methods.visit("double").method("double", Self::double);
        methods.visit("explode").method("explode", Self::explode);
    }
}

#[test]
fn test_concurrent_first_dispatch_caches_one_plan() {
    let engine: Arc<VisitEngine<Doubler, u64>> =
        Arc::new(VisitEngine::new("double").expect("Doubler has a double visit"));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2u64)
        .map(|id| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.dispatch(&Doubler, &Fresh { id })
            })
        })
        .collect();

    let results: Vec<u64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes").expect("dispatch succeeds"))
        .collect();
    assert_eq!(results, vec![0, 2]);

    let stats = engine.plan_cache().stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits + stats.misses, 2);
    assert!(stats.discarded <= 1);
}

#[test]
fn test_parallel_batch_keeps_input_order() {
    let subjects: Vec<Arc<dyn Subject>> = (1..=64).map(tree).collect();
    let sums = SUM.dispatch_par(&Summer, &subjects);

    assert_eq!(sums.len(), 64);
    for (leaves, sum) in (1..=64i64).zip(sums) {
        assert_eq!(sum.expect("tree sums"), leaves * (leaves + 1) / 2);
    }
}

#[test]
fn test_parallel_batch_reports_failures_per_subject() {
    let subjects: Vec<Arc<dyn Subject>> = vec![list(&["x"]), leaf(1), list(&[])];
    let lengths = LENGTH.dispatch_par(&ListVisitor, &subjects);

    assert_eq!(lengths[0].as_ref().ok(), Some(&1));
    assert!(lengths[1].as_ref().is_err_and(DispatchError::is_no_match));
    assert_eq!(lengths[2].as_ref().ok(), Some(&0));
}

#[test]
fn test_deferred_visit_runs_on_spawned_thread() {
    let (visit, pending) = SUM.defer(Arc::new(Summer), tree(10));
    let handle = visit.spawn().expect("thread spawns");

    assert_eq!(pending.wait().expect("visit completes"), 55);
    handle.join().expect("visit thread completes");
}

#[test]
fn test_unrun_deferred_visit_is_abandoned() {
    let (visit, pending) = SUM.defer(Arc::new(Summer), leaf(1));
    assert!(visit.subject().subject_type().name().ends_with("Leaf"));

    drop(visit);
    assert!(matches!(pending.wait(), Err(DispatchError::Abandoned)));
}

#[test]
fn test_panicking_deferred_visit_is_abandoned() {
    let engine: Arc<VisitEngine<Doubler, u64>> =
        Arc::new(VisitEngine::new("explode").expect("Doubler has an explode visit"));
    let subject: Arc<dyn Subject> = Arc::new(Fresh { id: 7 });

    let (visit, pending) = engine.defer(Arc::new(Doubler), subject);
    let handle = visit.spawn().expect("thread spawns");

    assert!(matches!(pending.wait(), Err(DispatchError::Abandoned)));
    assert!(handle.join().is_err());
}

#[test]
fn test_sum_splits_across_threads() {
    let summer = Arc::new(Summer);
    let left = tree(50);
    let right = tree(8);

    let total = summer.sum_node_in_parallel(&left, &right).expect("both halves sum");
    assert_eq!(total, 1275 + 36);
}

#[tokio::test]
async fn test_deferred_visit_can_be_awaited() {
    let (visit, pending) = LENGTH_ENGINE.defer(Arc::new(ListVisitor), list(&["a", "b"]));
    tokio::task::spawn_blocking(move || visit.run());

    assert_eq!(pending.await.expect("visit completes"), 2);
}

static LENGTH_ENGINE: once_cell::sync::Lazy<Arc<VisitEngine<ListVisitor, usize>>> = once_cell::sync::Lazy::new(|| {
    Arc::new(
        VisitEngine::builder("length")
            .plan_cache(PlanCache::global())
            .build()
            .expect("ListVisitor has a length visit"),
    )
});

#[test]
fn test_global_cache_is_shared_between_engines() {
    let shared: VisitEngine<ListVisitor, usize> = VisitEngine::builder("length")
        .shared_plan_cache()
        .prepare::<EmptyList>()
        .build()
        .expect("ListVisitor has a length visit");

    assert!(Arc::ptr_eq(shared.plan_cache(), LENGTH_ENGINE.plan_cache()));
    assert!(PlanCache::global().get(std::any::TypeId::of::<EmptyList>()).is_some());
}
