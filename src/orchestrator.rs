//! Query fan-out, aggregation, and the supersede policy.
//!
//! One orchestrator owns the backend instances for the whole session.
//! Each new query replaces the previous aggregate, dispatches every
//! participating backend concurrently, and appends each backend's
//! results as its future settles — cross-backend order is arrival
//! order, never assumed. Failures stay isolated per backend.

use crate::backend::SearchBackend;
use crate::types::SearchResult;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::{Arc, Mutex};

/// The current search input, shared between the orchestrator and any
/// backend that defers work (the rate-limited geocoder re-checks it at
/// timer expiry).
#[derive(Debug, Default)]
pub struct SearchInput {
    inner: Mutex<String>,
}

impl SearchInput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, query: &str) {
        *self.inner.lock().expect("search input lock poisoned") = query.to_string();
    }

    pub fn current(&self) -> String {
        self.inner.lock().expect("search input lock poisoned").clone()
    }
}

struct SessionInner {
    aggregate: Vec<SearchResult>,
    /// Monotonically increasing query counter; completions carrying a
    /// stale generation are dropped instead of appending into the new
    /// aggregate.
    generation: u64,
    /// Restricted single-backend browsing mode.
    restricted: Option<String>,
}

/// Fans a query out to every participating backend and aggregates
/// streaming results.
pub struct SearchOrchestrator {
    backends: Vec<Arc<dyn SearchBackend>>,
    min_characters: usize,
    input: Arc<SearchInput>,
    inner: Mutex<SessionInner>,
}

impl SearchOrchestrator {
    pub fn new(
        backends: Vec<Arc<dyn SearchBackend>>,
        min_characters: usize,
        input: Arc<SearchInput>,
    ) -> Self {
        Self {
            backends,
            min_characters,
            input,
            inner: Mutex::new(SessionInner {
                aggregate: Vec::new(),
                generation: 0,
                restricted: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session lock poisoned")
    }

    pub fn backends(&self) -> &[Arc<dyn SearchBackend>] {
        &self.backends
    }

    /// Snapshot of the current aggregate.
    pub fn results(&self) -> Vec<SearchResult> {
        self.lock().aggregate.clone()
    }

    /// Enter (`Some(id)`) or leave (`None`) restricted single-backend
    /// browsing mode.
    pub fn set_restricted(&self, backend_id: Option<&str>) {
        self.lock().restricted = backend_id.map(str::to_string);
    }

    /// Run one query against every participating backend.
    ///
    /// Queries shorter than the configured minimum are not dispatched at
    /// all. The previous aggregate is superseded — replaced, never
    /// merged. Per-backend failures are logged and ignored; recognized
    /// cancellations are suppressed without logging.
    pub async fn run_search(&self, query: &str) -> Vec<SearchResult> {
        if query.chars().count() < self.min_characters {
            tracing::debug!(
                query,
                min_characters = self.min_characters,
                "query below minimum length, not dispatched"
            );
            return Vec::new();
        }

        self.input.set(query);
        let (generation, participating) = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.aggregate.clear();
            let participating: Vec<Arc<dyn SearchBackend>> = match &inner.restricted {
                Some(id) => self
                    .backends
                    .iter()
                    .filter(|backend| backend.id() == *id)
                    .cloned()
                    .collect(),
                None => self.backends.clone(),
            };
            (inner.generation, participating)
        };

        let mut settling: FuturesUnordered<_> = participating
            .into_iter()
            .map(|backend| {
                let q = query.to_string();
                async move {
                    backend.clear_search_results();
                    let outcome = backend.search(&q).await;
                    (backend.id(), outcome)
                }
            })
            .collect();

        while let Some((backend_id, outcome)) = settling.next().await {
            match outcome {
                Ok(results) => {
                    let mut inner = self.lock();
                    if inner.generation != generation {
                        tracing::trace!(backend = %backend_id, "stale results dropped");
                        continue;
                    }
                    tracing::debug!(backend = %backend_id, count = results.len(), "backend returned results");
                    for mut result in results {
                        result.index = inner.aggregate.len();
                        inner.aggregate.push(result);
                    }
                }
                Err(err) if err.is_cancellation() => {
                    // Superseded request: silence, not a failure.
                }
                Err(err) => {
                    tracing::warn!(backend = %backend_id, error = %err, "backend query failed");
                }
            }
        }

        let inner = self.lock();
        if inner.generation == generation {
            inner.aggregate.clone()
        } else {
            Vec::new()
        }
    }
}
