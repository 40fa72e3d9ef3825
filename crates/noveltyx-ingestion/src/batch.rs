//! Chunked fan-out for batch lookups against external services.
//!
//! Every chunk gets exactly one attempt. A failed chunk leaves its ids
//! unresolved and is logged; only when every chunk fails does the call
//! itself fail with `PropagatedServiceFailure`.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use noveltyx_common::error::{NoveltyError, Result};

/// Split `ids` (deduplicated, order kept) into chunks of `chunk_size`,
/// run `call` on each with at most `concurrency` in flight, and merge the
/// per-chunk maps.
pub async fn run_chunked<T, F, Fut>(
    service: &'static str,
    ids: &[String],
    chunk_size: usize,
    concurrency: usize,
    call: F,
) -> Result<HashMap<String, T>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<HashMap<String, T>>>,
{
    let mut seen = HashSet::new();
    let unique: Vec<String> = ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }

    let chunks: Vec<Vec<String>> = unique.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect();
    let total = chunks.len();
    debug!(service, ids = unique.len(), chunks = total, "dispatching chunked lookup");

    let pending = chunks.into_iter().enumerate().map(|(i, chunk)| {
        let size = chunk.len();
        let fut = call(chunk);
        async move { (i, size, fut.await) }
    });
    let outcomes: Vec<_> = stream::iter(pending)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut merged = HashMap::new();
    let mut failed = 0usize;
    for (i, size, outcome) in outcomes {
        match outcome {
            Ok(map) => merged.extend(map),
            Err(e) => {
                failed += 1;
                warn!(service, chunk = i, size, error = %e, "chunk failed; its ids stay unresolved");
            }
        }
    }

    if failed == total {
        return Err(NoveltyError::PropagatedServiceFailure { service, chunks: total });
    }
    if failed > 0 {
        warn!(service, failed, total, "partial batch failure");
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ID:{i}")).collect()
    }

    async fn echo(chunk: Vec<String>) -> Result<HashMap<String, usize>> {
        Ok(chunk.into_iter().map(|id| (id.clone(), id.len())).collect())
    }

    #[tokio::test]
    async fn test_merge_is_independent_of_chunk_size() {
        let input = ids(57);
        let one = run_chunked("test", &input, 1, 4, echo).await.unwrap();
        let many = run_chunked("test", &input, 100, 4, echo).await.unwrap();
        let odd = run_chunked("test", &input, 7, 2, echo).await.unwrap();
        assert_eq!(one, many);
        assert_eq!(one, odd);
        assert_eq!(one.len(), 57);
    }

    #[tokio::test]
    async fn test_chunk_count() {
        let calls = AtomicUsize::new(0);
        let input = ids(250);
        run_chunked("test", &input, 100, 1, |chunk| {
            calls.fetch_add(1, Ordering::SeqCst);
            echo(chunk)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_degrades_to_unresolved() {
        let input = ids(4);
        let out = run_chunked("test", &input, 2, 1, |chunk| async move {
            if chunk.contains(&"ID:0".to_string()) {
                Err(NoveltyError::service("test", "timeout"))
            } else {
                echo(chunk).await
            }
        })
        .await
        .unwrap();
        assert!(!out.contains_key("ID:0"));
        assert!(!out.contains_key("ID:1"));
        assert!(out.contains_key("ID:2"));
        assert!(out.contains_key("ID:3"));
    }

    #[tokio::test]
    async fn test_all_chunks_failing_propagates() {
        let input = ids(3);
        let err = run_chunked("test", &input, 1, 1, |_| async {
            Err::<HashMap<String, usize>, _>(NoveltyError::service("test", "connection refused"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, NoveltyError::PropagatedServiceFailure { chunks: 3, .. }));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let calls = AtomicUsize::new(0);
        let out = run_chunked("test", &[], 10, 1, |chunk| {
            calls.fetch_add(1, Ordering::SeqCst);
            echo(chunk)
        })
        .await
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
