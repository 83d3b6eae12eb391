//! The search backend contract: shared lifecycle and request plumbing.
//!
//! Every adapter embeds a [`BackendCore`] carrying its instance id, its
//! configured event bindings, and the mutable lifecycle state (state
//! machine, cancellation handle, accumulated results). The adapters
//! themselves only supply query building, transport, and normalization.

use crate::error::Result;
use crate::types::{ConfiguredEvents, SearchResult};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a backend instance.
///
/// `Instantiated → Running → {Finished | Failed | Aborted}`; `Aborted`
/// may pre-empt `Running` at any time, and terminal states re-enter
/// `Running` on the next search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Instantiated,
    Running,
    Finished,
    Failed,
    Aborted,
}

/// How a backend executes a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// Searches already-resident local data; no network, no cancellation.
    Client,
    /// Issues one remote call per query.
    Request,
}

/// HTTP verbs used by the remote adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request payload shapes the adapters send.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Xml(String),
}

/// Data envelope returned by [`BackendCore::request_search`].
///
/// Transport failures and non-200 statuses are values here, never
/// panics — a failing backend must not take its siblings down.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// 200 response; the raw body text.
    Finished { body: String },
    /// Network failure or non-200 status.
    Failed { error: String },
    /// The request was superseded or explicitly aborted.
    Aborted,
}

struct CoreInner {
    state: BackendState,
    cancel: Option<CancellationToken>,
    /// Sequence number of the newest request; stale completions must
    /// not clobber state written by their successor.
    seq: u64,
    results: Vec<SearchResult>,
    total_count: usize,
}

/// Shared per-instance plumbing embedded by every adapter.
pub struct BackendCore {
    id: String,
    paging: PagingMode,
    events: ConfiguredEvents,
    client: Option<reqwest::Client>,
    inner: Mutex<CoreInner>,
}

impl BackendCore {
    /// Core for a remote (`Request`-paging) backend.
    pub fn remote(id: impl Into<String>, events: ConfiguredEvents, client: reqwest::Client) -> Self {
        Self::new(id, PagingMode::Request, events, Some(client))
    }

    /// Core for a local (`Client`-paging) backend.
    pub fn local(id: impl Into<String>, events: ConfiguredEvents) -> Self {
        Self::new(id, PagingMode::Client, events, None)
    }

    fn new(
        id: impl Into<String>,
        paging: PagingMode,
        events: ConfiguredEvents,
        client: Option<reqwest::Client>,
    ) -> Self {
        Self {
            id: id.into(),
            paging,
            events,
            client,
            inner: Mutex::new(CoreInner {
                state: BackendState::Instantiated,
                cancel: None,
                seq: 0,
                results: Vec::new(),
                total_count: 0,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn paging(&self) -> PagingMode {
        self.paging
    }

    pub fn events(&self) -> &ConfiguredEvents {
        &self.events
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoreInner> {
        self.inner.lock().expect("backend state lock poisoned")
    }

    pub fn state(&self) -> BackendState {
        self.lock().state
    }

    /// Re-enter `Running` at the start of a search.
    pub fn begin_search(&self) {
        self.lock().state = BackendState::Running;
    }

    /// Mark a local (client-paging) search as finished.
    pub fn finish_local(&self) {
        self.lock().state = BackendState::Finished;
    }

    /// Settle at `Failed` when a response cannot be decoded.
    pub fn mark_failed(&self) {
        self.lock().state = BackendState::Failed;
    }

    /// Whether a cancellation handle is currently stored.
    pub fn has_pending_request(&self) -> bool {
        self.lock().cancel.is_some()
    }

    /// Cancel any in-flight request, set state to `Aborted`, clear the
    /// handle.
    pub fn abort_request(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.state = BackendState::Aborted;
    }

    /// Empty the accumulated result buffer.
    pub fn clear_search_results(&self) {
        let mut inner = self.lock();
        inner.results.clear();
        inner.total_count = 0;
    }

    /// Append normalized results and grow the total-hit count.
    pub fn record_results(&self, results: &[SearchResult]) {
        let mut inner = self.lock();
        inner.results.extend_from_slice(results);
        inner.total_count += results.len();
    }

    /// Overwrite the total-hit count when the service reports more hits
    /// than it returned.
    pub fn set_total_count(&self, total: usize) {
        self.lock().total_count = total;
    }

    /// Snapshot of the accumulated results.
    pub fn results(&self) -> Vec<SearchResult> {
        self.lock().results.clone()
    }

    pub fn total_count(&self) -> usize {
        self.lock().total_count
    }

    /// Issue a remote call under a fresh cancellation handle, first
    /// cancelling any still-open handle from a previous call — at most
    /// one request is ever in flight per instance.
    ///
    /// A 200 response settles the state machine at `Finished`, anything
    /// else at `Failed`, a superseded request at `Aborted` — always as a
    /// [`RequestOutcome`] value. A stale completion (a newer request
    /// already started) leaves state and handle untouched.
    pub async fn request_search(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<RequestBody>,
    ) -> RequestOutcome {
        let Some(client) = self.client.clone() else {
            return RequestOutcome::Failed {
                error: "client-paging backend cannot issue remote requests".into(),
            };
        };

        let token = CancellationToken::new();
        let my_seq;
        {
            let mut inner = self.lock();
            if let Some(previous) = inner.cancel.take() {
                previous.cancel();
            }
            inner.cancel = Some(token.clone());
            inner.state = BackendState::Running;
            inner.seq += 1;
            my_seq = inner.seq;
        }

        tracing::trace!(backend = %self.id, url, "dispatching backend request");

        let request = match method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
        };
        let request = match body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Xml(text)) => request
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .body(text),
            None => request,
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => RequestOutcome::Aborted,
            response = request.send() => match response {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    match response.text().await {
                        Ok(body) => RequestOutcome::Finished { body },
                        Err(e) => RequestOutcome::Failed {
                            error: format!("response read failed: {e}"),
                        },
                    }
                }
                Ok(response) => RequestOutcome::Failed {
                    error: format!("status {}", response.status()),
                },
                Err(e) => RequestOutcome::Failed {
                    error: e.to_string(),
                },
            },
        };

        let mut inner = self.lock();
        if inner.seq == my_seq {
            match &outcome {
                RequestOutcome::Finished { .. } => inner.state = BackendState::Finished,
                RequestOutcome::Failed { .. } => inner.state = BackendState::Failed,
                // abort_request already moved the state machine.
                RequestOutcome::Aborted => {}
            }
            inner.cancel = None;
        }
        outcome
    }
}

/// A configured search backend instance.
///
/// The query/transport/normalization trio every adapter must supply is
/// a compile-time requirement of this trait; the shared lifecycle
/// operations are provided through the embedded [`BackendCore`].
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// The shared per-instance plumbing.
    fn core(&self) -> &BackendCore;

    /// Configuration type tag this instance was built from.
    fn backend_type(&self) -> &'static str;

    /// Run one query and return the normalized results.
    ///
    /// # Errors
    ///
    /// [`crate::SearchError::Cancelled`] when superseded,
    /// [`crate::SearchError::Http`]/[`crate::SearchError::Parse`] on
    /// transport or decode failures — all isolated per backend by the
    /// orchestrator.
    async fn search(&self, input: &str) -> Result<Vec<SearchResult>>;

    /// Instance id (type tag, suffixed for duplicates).
    fn id(&self) -> String {
        self.core().id().to_string()
    }

    fn paging(&self) -> PagingMode {
        self.core().paging()
    }

    fn state(&self) -> BackendState {
        self.core().state()
    }

    fn abort_request(&self) {
        self.core().abort_request();
    }

    fn clear_search_results(&self) {
        self.core().clear_search_results();
    }
}
