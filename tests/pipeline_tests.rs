//! End-to-end pipeline composition tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use lazyflow::prelude::*;
use serde_json::{json, Value};

fn counted_source(pulls: Arc<AtomicUsize>) -> Seq<i32> {
    Seq::from_fn(move || {
        let pulls = Arc::clone(&pulls);
        (1..=9).inspect(move |_| {
            pulls.fetch_add(1, Ordering::SeqCst);
        })
    })
}

#[test]
fn test_filter_map_to_array() {
    let p = pipe!(
        Seq::from_values((1..=9).collect::<Vec<i32>>()),
        ops::filter(|v: &i32, _, _| v % 2 == 0),
        ops::map(|v: i32, _, _| json!({ "value": v })),
        ops::to_array(),
    );
    let out = p.collect().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(
        Value::Array(out[0].clone()),
        json!([{ "value": 2 }, { "value": 4 }, { "value": 6 }, { "value": 8 }])
    );
}

#[test]
fn test_building_does_not_advance_the_source() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let p = pipe(counted_source(Arc::clone(&pulls)))
        .then(ops::map(|v: i32, _, _| v * 2))
        .then(ops::split(|v: &i32, _, _| *v == 8))
        .then(ops::page(2));
    let _again = p.clone();
    assert_eq!(pulls.load(Ordering::SeqCst), 0);

    // one value needs only as many pulls as the first page requires
    let first = p.first().unwrap().unwrap();
    assert_eq!(first, vec![vec![2, 4, 6], vec![10, 12, 14, 16, 18]]);
    assert_eq!(pulls.load(Ordering::SeqCst), 9);
}

#[test]
fn test_take_limits_upstream_pulls() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let p = pipe!(
        counted_source(Arc::clone(&pulls)),
        ops::filter(|v: &i32, _, _| v % 3 == 0),
        ops::take(2),
    );
    assert_eq!(p.collect().unwrap(), vec![3, 6]);
    assert_eq!(pulls.load(Ordering::SeqCst), 6);
}

#[test]
fn test_operators_are_reusable_across_pipelines() {
    let evens = ops::filter(|v: &i32, i, _| i % 2 == 0 && *v > 0);
    let a = pipe(Seq::from_values(vec![1, 2, 3, 4])).then(evens.clone());
    let b = pipe(Seq::from_values(vec![9, 8, 7])).then(evens);
    assert_eq!(a.collect().unwrap(), vec![1, 3]);
    assert_eq!(b.collect().unwrap(), vec![9, 7]);
    // each run has its own index
    assert_eq!(a.collect().unwrap(), vec![1, 3]);
}

#[test]
fn test_iteration_state_is_shared_within_a_run_only() {
    let p = pipe!(
        Seq::from_values(vec![3, 1, 2]),
        ops::tap(|v: &i32, _, state: &IterState| {
            state.bump("sum", i64::from(*v));
        }),
        ops::map(|v: i32, _, state: &IterState| (v, state.counter("sum"))),
    );
    assert_eq!(p.collect().unwrap(), vec![(3, 3), (1, 4), (2, 6)]);
    assert_eq!(p.collect().unwrap(), vec![(3, 3), (1, 4), (2, 6)]);
}

#[test]
fn test_idempotent_termination() {
    fn drained<T: Send + 'static>(seq: &Seq<T>) -> bool {
        let mut it = seq.iter();
        while it.next().is_some() {}
        it.next().is_none() && it.next().is_none()
    }

    let src = Seq::from_values(vec![1, 2, 2, 0, 3]);
    assert!(drained(&ops::to_array().apply(src.clone())));
    assert!(drained(&ops::count().apply(src.clone())));
    assert!(drained(&ops::reduce(|a: i32, b, _, _| a + b).apply(src.clone())));
    assert!(drained(&ops::reduce(|a: i32, b, _, _| a + b).apply(Seq::empty_sync())));
    assert!(drained(&ops::split(|v: &i32, _, _| *v == 0).apply(src.clone())));
    assert!(drained(&ops::page(2).apply(src.clone())));
    assert!(drained(&ops::distinct().apply(src.clone())));
    assert!(drained(&ops::take(2).apply(src.clone())));
    assert!(drained(&ops::take_while(|v: &i32, _, _| *v > 0).apply(src.clone())));
    assert!(drained(&ops::repeat(1).apply(src.clone())));
    assert!(drained(&ops::default_empty(Item::Value(7)).apply(src.clone())));
    assert!(drained(&ops::wait::<i32>().apply(Seq::from_fn(|| vec![Pending::Ready(1)]))));
}

#[tokio::test]
async fn test_async_idempotent_termination() {
    let src = to_async(Seq::from_values(vec![4, 0, 5]));
    let outputs = vec![
        ops::split(|v: &i32, _, _| *v == 0).apply(src.clone()),
        ops::page(2).apply(src.clone()),
        ops::reduce(|a: i32, b, _, _| a.max(b)).then(ops::map(|v: i32, _, _| vec![v])).apply(src.clone()),
    ];
    for seq in outputs {
        let mut s = seq.stream();
        while s.next().await.is_some() {}
        assert!(s.next().await.is_none());
        assert!(s.next().await.is_none());
    }
}

#[tokio::test]
async fn test_sync_and_async_pipelines_agree() {
    let src = Seq::from_values(vec![5, 1, 0, 4, 4, 0, 9, 2, 0]);
    let op = ops::distinct_by(|v: &i32, _, _| *v)
        .then(ops::skip_while(|v: &i32, _, _| *v > 3))
        .then(ops::split(|v: &i32, _, _| *v == 0))
        .then(ops::flat_map(|w: Vec<i32>, i, _| Item::Seq(Seq::from_values(vec![i as i32; w.len() + 1]))))
        .then(ops::reduce_with(0, |acc: i32, v: i32, _, _| acc * 3 + v));

    let sync = pipe_sync(src.clone()).then(op.clone()).collect().unwrap();
    let asynchronous = pipe_async(src).then(op).collect_async().await.unwrap();
    assert_eq!(sync, asynchronous);
}

#[tokio::test]
async fn test_first_async_on_both_modes() {
    let p = pipe(Seq::from_values(vec!['x', 'y']));
    assert_eq!(p.first_async().await.unwrap(), Some('x'));
    let q = pipe(Seq::from_stream_fn(|| futures::stream::iter(vec!['z'])));
    assert!(q.first().is_err());
    assert_eq!(q.first_async().await.unwrap(), Some('z'));
}

#[test]
fn test_to_iterable_with_raw_puller() {
    let mut left = vec![3, 2, 1];
    let seq = to_iterable(move || Pulled::Ready(left.pop().map(Ok))).unwrap();
    let p = pipe(seq).then(ops::map(|v: i32, _, _| v * 100));
    assert_eq!(p.collect().unwrap(), vec![100, 200, 300]);
    // the raw puller was single-pass
    assert!(p.collect().unwrap().is_empty());
}

#[test]
fn test_config_from_env_lookup_drives_operators() {
    let cfg = PipeConfig::from_lookup(|k| match k {
        "LAZYFLOW_FLAT_DEPTH" => Some("2".to_string()),
        "LAZYFLOW_TRACE_PULLS" => Some("1".to_string()),
        _ => None,
    });
    let nested = Seq::from_values(vec![Nested::list(vec![
        Nested::Value(1),
        Nested::list(vec![Nested::Value(2)]),
    ])]);
    let p = pipe(nested).then(ops::flat_default(&cfg)).with_config(&cfg);
    let out: Vec<Option<i32>> = p.collect().unwrap().into_iter().map(Nested::into_value).collect();
    assert_eq!(out, vec![Some(1), Some(2)]);
}
