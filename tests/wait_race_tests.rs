//! Racing resolution tests (wait, wait_race, wait_cache)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;
use lazyflow::prelude::*;

/// Source of values resolving after `ms` each, recording start order.
fn timed(items: Vec<(i32, u64)>, started: Arc<Mutex<Vec<i32>>>) -> Seq<Pending<i32>> {
    Seq::from_stream_fn(move || {
        let pending: Vec<Pending<i32>> = items
            .iter()
            .map(|&(v, ms)| {
                let started = Arc::clone(&started);
                Pending::ok(async move {
                    started.lock().unwrap().push(v);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    v
                })
            })
            .collect();
        stream::iter(pending)
    })
}

#[tokio::test(start_paused = true)]
async fn test_wait_race_follows_resolution_time() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let p = pipe(timed(vec![(10, 30), (40, 5), (20, 60)], Arc::clone(&started))).then(ops::wait_race(2));
    assert_eq!(p.collect_async().await.unwrap(), vec![40, 10, 20]);
    assert_eq!(*started.lock().unwrap(), vec![10, 40, 20]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_race_of_one_preserves_source_order() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let p = pipe(timed(vec![(1, 50), (2, 10), (3, 30), (4, 1)], started)).then(ops::wait_race(1));
    assert_eq!(p.collect_async().await.unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_race_bounded_concurrency() {
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (l, p) = (Arc::clone(&live), Arc::clone(&peak));
    let src = Seq::from_stream_fn(move || {
        let pending: Vec<Pending<u64>> = (0..20u64)
            .map(|i| {
                let (live, peak) = (Arc::clone(&l), Arc::clone(&p));
                Pending::ok(async move {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1 + (i * 37) % 11)).await;
                    live.fetch_sub(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();
        stream::iter(pending)
    });
    let out = pipe(src).then(ops::wait_race(3)).collect_async().await.unwrap();
    assert_eq!(out.len(), 20);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_cache_drains_everything() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let p = pipe(timed(vec![(5, 20), (6, 10), (7, 5), (8, 1)], started)).then(ops::wait_cache(3));
    let mut out = p.collect_async().await.unwrap();
    out.sort_unstable();
    assert_eq!(out, vec![5, 6, 7, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_race_then_downstream_operators() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let p = pipe!(
        timed(vec![(3, 30), (1, 10), (2, 20)], started),
        ops::wait_race(3),
        ops::map(|v: i32, i, _| (i, v)),
        ops::to_array(),
    );
    assert_eq!(p.first_async().await.unwrap(), Some(vec![(0, 1), (1, 2), (2, 3)]));
}

#[test]
fn test_racing_in_sync_pipeline_fails_on_pull() {
    let p = pipe(Seq::from_fn(|| vec![Pending::Ready(1)])).then(ops::wait_cache(4));
    let mut it = p.iter();
    assert!(matches!(it.next(), Some(Err(PipeError::AsyncOnly { op: "wait_cache" }))));
    assert!(it.next().is_none());
}

#[test]
fn test_default_concurrency_from_config() {
    let cfg = PipeConfig::from_lookup(|k| (k == "LAZYFLOW_DEFAULT_CONCURRENCY").then(|| "8".to_string()));
    assert_eq!(cfg.default_concurrency, 8);
    assert_eq!(ops::wait_race_default::<u8>(&cfg).name(), "wait_race");
}
