//! Flattening tests (flat, flat_map, spread)

use futures::stream;
use lazyflow::prelude::*;

fn text(s: &str) -> Nested<char> {
    Nested::list(s.chars().map(Nested::Value).collect())
}

fn values(items: Vec<Nested<char>>) -> String {
    items.into_iter().filter_map(Nested::into_value).collect()
}

#[test]
fn test_flat_depth_two() {
    let src = Seq::from_values(vec![
        text("one"),
        Nested::list(vec![Nested::Value('2'), Nested::Value('3'), text("45")]),
    ]);
    let p = pipe(src).then(ops::flat(2));
    assert_eq!(values(p.collect().unwrap()), "one2345");
}

#[test]
fn test_flat_passes_bare_values() {
    let src = Seq::from_values(vec![Nested::Value('a'), text("bc"), Nested::Value('d')]);
    let p = pipe(src).then(ops::flat(1));
    assert_eq!(values(p.collect().unwrap()), "abcd");
}

#[tokio::test]
async fn test_flat_mixed_modes_per_level() {
    // async outer level holding a sync level holding an async level
    let deepest = Nested::Seq(Seq::from_stream_fn(|| stream::iter(vec![Nested::Value('z')])));
    let middle = Nested::list(vec![Nested::Value('y'), deepest]);
    let src = Seq::from_stream_fn(move || stream::iter(vec![Nested::Value('x'), middle.clone()]));
    let p = pipe(src).then(ops::flat(3));
    assert_eq!(values(p.collect_async().await.unwrap()), "xyz");
}

#[test]
fn test_flat_map_spreads_in_order() {
    let p = pipe!(
        Seq::from_values(vec!["ab", "", "c"]),
        ops::flat_map(|s: &str, _, _| {
            let chars: Vec<char> = s.chars().collect();
            Item::Seq(Seq::from_values(chars))
        }),
        ops::to_array(),
    );
    assert_eq!(p.first().unwrap(), Some(vec!['a', 'b', 'c']));
}

#[test]
fn test_spread_rejects_bare_values_with_index() {
    let src = Seq::from_values(vec![Item::Seq(Seq::from_values(vec![1])), Item::Value(2)]);
    let p = pipe(src).then(ops::spread());
    let err = p.collect().unwrap_err();
    assert!(matches!(err, PipeError::NotSequence { op: "spread", index: 1 }));
    assert_eq!(err.to_string(), "spread: value at index 1 is not a sequence");
}

#[tokio::test]
async fn test_async_flat_map_accepts_async_items() {
    let p = pipe_async(Seq::from_values(vec![1u8, 2]))
        .then(ops::flat_map(|v: u8, _, _| Item::Seq(Seq::from_stream_fn(move || stream::iter(vec![v; v as usize])))));
    assert_eq!(p.collect_async().await.unwrap(), vec![1, 2, 2]);
}
