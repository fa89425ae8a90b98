use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tracing::debug;

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Shared claim counter for one enrichment batch.
#[derive(Debug, Default)]
pub struct WorkCursor {
    next: AtomicUsize,
}

impl WorkCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Fixed-size worker pool for per-record follow-up fetches.
#[derive(Debug, Clone, Copy)]
pub struct Enricher {
    concurrency: usize,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl Enricher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Output slot `i` always holds the result for `items[i]`. A failed item
    /// keeps its input value.
    pub async fn run<T, F, Fut, E>(&self, items: Vec<T>, enrich_fn: F) -> Vec<T>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if items.is_empty() {
            return items;
        }
        let cursor = WorkCursor::new();
        let workers = self.concurrency.min(items.len());
        let batches = join_all((0..workers).map(|worker| {
            run_worker(worker, &cursor, &items, &enrich_fn)
        }))
        .await;

        let mut slots: Vec<Option<T>> = vec![None; items.len()];
        for (idx, value) in batches.into_iter().flatten() {
            slots[idx] = Some(value);
        }
        slots
            .into_iter()
            .zip(items)
            .map(|(slot, original)| slot.unwrap_or(original))
            .collect()
    }
}

async fn run_worker<T, F, Fut, E>(
    worker: usize,
    cursor: &WorkCursor,
    items: &[T],
    enrich_fn: &F,
) -> Vec<(usize, T)>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut done = Vec::new();
    loop {
        let idx = cursor.claim();
        let Some(item) = items.get(idx) else {
            break;
        };
        match enrich_fn(item.clone()).await {
            Ok(value) => done.push((idx, value)),
            Err(err) => debug!(worker, idx, "enrichment failed, keeping original: {err}"),
        }
    }
    done
}

pub async fn enrich<T, F, Fut, E>(items: Vec<T>, enrich_fn: F, concurrency: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    Enricher::new(concurrency).run(items, enrich_fn).await
}
