//! Windowing tests: split and page

use lazyflow::ops::{page, split, split_with, Carry, SplitOptions};
use lazyflow::prelude::*;

fn is_zero(v: &i32, _: ops::SplitIndex, _: &IterState) -> bool {
    *v == 0
}

#[test]
fn test_split_on_separator() {
    let p = pipe(Seq::from_values(vec![1, 2, 0, 3, 4, 0, 5, 6])).then(split(is_zero));
    assert_eq!(p.collect().unwrap(), vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
}

#[test]
fn test_split_window_completeness() {
    let sources: Vec<Vec<i32>> = vec![
        vec![],
        vec![0],
        vec![0, 0],
        vec![1, 0, 2, 0, 0, 3],
        vec![0, 4, 5, 0],
        vec![7, 8, 9],
    ];
    let carries = [Carry::None, Carry::Back, Carry::Forward];
    for src in sources {
        for carry_end in carries {
            let opts = SplitOptions {
                carry_end,
                ..SplitOptions::default()
            };
            let windows = pipe(Seq::from_values(src.clone()))
                .then(split_with(is_zero, opts))
                .collect()
                .unwrap();
            let mut rebuilt: Vec<i32> = windows.into_iter().flatten().collect();
            if carry_end == Carry::None {
                let dropped = src.iter().filter(|v| **v == 0).count();
                rebuilt.extend(std::iter::repeat(0).take(dropped));
                let mut expected = src.clone();
                expected.sort_unstable();
                rebuilt.sort_unstable();
                assert_eq!(rebuilt, expected, "source {src:?}");
            } else {
                assert_eq!(rebuilt, src, "source {src:?} carry {carry_end:?}");
            }
        }
    }
}

#[test]
fn test_split_toggle_with_carry_forward_start() {
    let opts = SplitOptions {
        toggle: true,
        carry_start: Carry::Forward,
        ..SplitOptions::default()
    };
    // 0 opens, 0 closes (dropped), 0 opens again
    let p = pipe(Seq::from_values(vec![9, 0, 1, 2, 0, 8, 0, 3])).then(split_with(is_zero, opts));
    assert_eq!(p.collect().unwrap(), vec![vec![0, 1, 2], vec![0, 3]]);
}

#[test]
fn test_split_trim_with_forward_carry_at_start() {
    let opts = SplitOptions {
        carry_end: Carry::Forward,
        trim: true,
        ..SplitOptions::default()
    };
    let p = pipe(Seq::from_values(vec![0, 0, 1, 0])).then(split_with(is_zero, opts));
    // the empty first window is trimmed; carried separators open the next ones
    assert_eq!(p.collect().unwrap(), vec![vec![0], vec![0, 1], vec![0]]);
}

#[test]
fn test_split_options_from_json() {
    let opts: SplitOptions = serde_json::from_value(serde_json::json!({
        "toggle": false,
        "carry_end": "forward",
        "trim": true
    }))
    .unwrap();
    assert_eq!(opts.carry_end, Carry::Forward);
    assert!(opts.trim);
}

#[test]
fn test_page_sizes() {
    let p = pipe(Seq::from_values((1..=7).collect::<Vec<u8>>())).then(page(3));
    assert_eq!(p.collect().unwrap(), vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    let empty = pipe(Seq::<u8>::empty_sync()).then(page(3));
    assert!(empty.collect().unwrap().is_empty());
}

#[test]
fn test_page_zero_is_catchable() {
    let p = pipe(Seq::from_values(vec![1, 2, 3]))
        .then(page(0))
        .catch(|e, ctx: &mut ErrorContext<Vec<i32>>| match e {
            PipeError::Config { op: "page", .. } => {
                ctx.emit(Vec::new());
                Ok(())
            }
            other => Err(other),
        });
    assert_eq!(p.collect().unwrap(), vec![Vec::<i32>::new()]);
}

#[tokio::test]
async fn test_async_split_matches_sync() {
    let src = Seq::from_values(vec![0, 1, 2, 0, 3, 0]);
    let opts = SplitOptions {
        carry_end: Carry::Back,
        ..SplitOptions::default()
    };
    let sync = pipe(src.clone()).then(split_with(is_zero, opts)).collect().unwrap();
    let asynchronous = pipe_async(src).then(split_with(is_zero, opts)).collect_async().await.unwrap();
    assert_eq!(sync, asynchronous);
    assert_eq!(sync, vec![vec![0], vec![1, 2, 0], vec![3, 0], vec![]]);
}
