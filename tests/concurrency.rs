//! Concurrent first resolution of shared instances.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use wiring::prelude::*;

const THREADS: usize = 16;

static POOLS_BUILT: AtomicUsize = AtomicUsize::new(0);

#[derive(Injectable)]
#[injectable(constructors(open))]
struct Pool {
    generation: usize,
}

impl Pool {
    fn open() -> Self {
        // Widen the race window.
        thread::sleep(Duration::from_millis(20));
        Self {
            generation: POOLS_BUILT.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[derive(Debug)]
struct Metrics {
    started: usize,
}

injectable!(Metrics);

/// Resolves `&Pool` from every thread at once and returns the addresses seen.
fn race(container: &Container<'_>) -> Vec<usize> {
    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    let pool: &Pool = container.resolve().unwrap();
                    pool as *const Pool as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_concurrent_first_resolution_constructs_once() {
    common::init_tracing();
    let container = ContainerBuilder::new()
        .register::<Pool>()
        .in_singleton_scope()
        .build()
        .unwrap();

    let addresses = race(&container);

    assert_eq!(POOLS_BUILT.load(Ordering::SeqCst), 1);
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    let pool: &Pool = container.resolve().unwrap();
    assert_eq!(pool.generation, 0);
}

#[test]
fn test_process_scope_is_shared_between_containers() {
    common::init_tracing();
    static STARTED: AtomicUsize = AtomicUsize::new(0);

    let process = Arc::new(ProcessScope::new());
    let build = || {
        ContainerBuilder::new()
            .process_scope(Arc::clone(&process))
            .bind::<Metrics>()
            .to_factory(|| Metrics {
                started: STARTED.fetch_add(1, Ordering::SeqCst),
            })
            .in_process_scope()
            .build()
            .unwrap()
    };
    let api = build();
    let worker = build();

    let from_api: &Metrics = api.resolve().unwrap();
    let from_worker: &Metrics = worker.resolve().unwrap();
    assert!(std::ptr::eq(from_api, from_worker));
    assert_eq!(from_api.started, 0);

    assert_eq!(process.len(), 1);
    assert!(process.cached::<Metrics>().is_some());
    assert_eq!(api.cached_len(), 0);
    assert!(api.cached::<Metrics>().is_some());
}

#[test]
fn test_children_on_many_threads_share_parent_instance() {
    common::init_tracing();
    let parent = ContainerBuilder::new()
        .bind::<Arc<Metrics>>()
        .to_factory(|| Arc::new(Metrics { started: 7 }))
        .in_singleton_scope()
        .build()
        .unwrap();

    let seen: Vec<Arc<Metrics>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    let child = ContainerBuilder::child_of(&parent).build().unwrap();
                    child.resolve::<Arc<Metrics>>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(seen.iter().all(|metrics| Arc::ptr_eq(metrics, &seen[0])));
    assert_eq!(seen[0].started, 7);
}
