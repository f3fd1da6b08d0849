use lazyflow_core::{PipeError, Result};

use crate::traits::{Operator, Stage};

/// Group values into pages of `size`; the last page may be shorter.
///
/// `size == 0` is rejected on the first pull with `PipeError::Config`.
pub fn page<T: Send + 'static>(size: usize) -> Operator<T, Vec<T>> {
    if size == 0 {
        return Operator::failing("page", PipeError::config("page", "page size must be a positive integer"));
    }
    Operator::from_stage("page", move |_state| PageStage {
        size,
        buf: Vec::new(),
        out: None,
        err: None,
    })
}

struct PageStage<T> {
    size: usize,
    buf: Vec<T>,
    out: Option<Vec<T>>,
    err: Option<PipeError>,
}

impl<T: Send + 'static> Stage<T, Vec<T>> for PageStage<T> {
    fn push(&mut self, item: Result<T>) {
        match item {
            Ok(v) => {
                self.buf.push(v);
                if self.buf.len() == self.size {
                    self.out = Some(std::mem::take(&mut self.buf));
                }
            }
            Err(e) => self.err = Some(e),
        }
    }

    fn end(&mut self) {
        if !self.buf.is_empty() {
            self.out = Some(std::mem::take(&mut self.buf));
        }
    }

    fn pop(&mut self) -> Option<Result<Vec<T>>> {
        if let Some(e) = self.err.take() {
            return Some(Err(e));
        }
        self.out.take().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyflow_core::{to_async, Seq};

    #[test]
    fn pages_with_short_tail() {
        let out = page(2).apply(Seq::from_values(vec![1, 2, 3, 4, 5]));
        assert_eq!(out.collect_sync().unwrap(), vec![vec![1, 2], vec![3, 4], vec![5]]);
        let exact = page(3).apply(Seq::from_values(vec![1, 2, 3]));
        assert_eq!(exact.collect_sync().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn empty_source_yields_nothing() {
        let out = page::<u8>(4).apply(Seq::empty_sync());
        assert!(out.collect_sync().unwrap().is_empty());
    }

    #[test]
    fn zero_size_fails_on_first_pull() {
        let op = page::<i32>(0);
        // attaching is fine
        let seq = op.apply(Seq::from_values(vec![1, 2]));
        let mut it = seq.iter();
        assert!(matches!(it.next(), Some(Err(PipeError::Config { op: "page", .. }))));
        assert!(it.next().is_none());
    }

    #[test]
    fn huge_size_is_one_page() {
        let out = page(usize::MAX).apply(Seq::from_values(vec![1u64, 2, 3]));
        assert_eq!(out.collect_sync().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn async_pages() {
        let out = page(2).apply(to_async(Seq::from_values(vec!['a', 'b', 'c'])));
        assert_eq!(out.collect_async().await.unwrap(), vec![vec!['a', 'b'], vec!['c']]);
    }
}
