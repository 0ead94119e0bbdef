//! Latest-wins query slot.
//!
//! A [`QuerySlot`] owns the state of one derived query. It keeps at most
//! one fetch in flight: accepting a new request cancels the outstanding
//! fetch and switches the slot to [`QueryResult::Loading`] before the new
//! fetch is spawned. Every fetch is tagged with a sequence number drawn
//! from a per-slot counter that is never reused, and a response is applied
//! only while its sequence number is still the one in flight. A superseded
//! response can therefore never overwrite newer state, whatever order the
//! network delivers them in.
//!
//! State changes are published through a [`watch`] channel so a
//! presentation layer can follow the slot without polling, and each
//! settled fetch is reported on the [`EventBus`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use mmm_core::error::ClientError;
use mmm_core::query::{QueryRequest, SlotKey};
use mmm_events::{EventBus, EventKind, SlotOutcome};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Produces the fetch for a request. Called once per issued request.
pub type Fetcher<P, T> =
    Arc<dyn Fn(QueryRequest<P>) -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Observable state of a slot.
#[derive(Debug, PartialEq)]
pub enum QueryResult<T> {
    Idle,
    Loading,
    Ready(Arc<T>),
    Failed(ClientError),
}

impl<T> QueryResult<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn ready(&self) -> Option<&Arc<T>> {
        match self {
            Self::Ready(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Loading => Self::Loading,
            Self::Ready(payload) => Self::Ready(Arc::clone(payload)),
            Self::Failed(err) => Self::Failed(err.clone()),
        }
    }
}

/// Snapshot published on every state change.
#[derive(Debug)]
pub struct SlotView<P, T> {
    /// The request the result belongs to; `None` while idle.
    pub request: Option<QueryRequest<P>>,
    pub result: QueryResult<T>,
    /// Latest sequence number issued by the slot.
    pub seq: u64,
}

impl<P: Clone, T> Clone for SlotView<P, T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            result: self.result.clone(),
            seq: self.seq,
        }
    }
}

/// What a call to [`QuerySlot::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A fetch was spawned with this sequence number.
    Started(u64),
    /// An equivalent request was already loading or ready.
    Unchanged,
    /// The gate was closed; the slot is idle.
    Gated,
}

// ---------------------------------------------------------------------------
// QuerySlot
// ---------------------------------------------------------------------------

struct InFlight {
    seq: u64,
    cancel: CancellationToken,
}

struct SlotState<P, T> {
    /// Highest sequence number issued so far.
    last_seq: u64,
    request: Option<QueryRequest<P>>,
    result: QueryResult<T>,
    in_flight: Option<InFlight>,
}

struct Shared<P, T> {
    key: SlotKey,
    state: Mutex<SlotState<P, T>>,
    view: watch::Sender<SlotView<P, T>>,
    events: Option<Arc<EventBus>>,
}

/// One independently superseding unit of derived-query state.
///
/// Cloning yields another handle to the same slot. Requests must be issued
/// from within a Tokio runtime.
pub struct QuerySlot<P, T> {
    shared: Arc<Shared<P, T>>,
    fetcher: Fetcher<P, T>,
}

impl<P, T> Clone for QuerySlot<P, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

impl<P, T> fmt::Debug for QuerySlot<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySlot")
            .field("key", &self.shared.key)
            .finish_non_exhaustive()
    }
}

impl<P, T> QuerySlot<P, T>
where
    P: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(key: SlotKey, fetcher: Fetcher<P, T>) -> Self {
        Self::build(key, fetcher, None)
    }

    /// Create a slot that reports settled fetches on `events`.
    pub fn with_events(key: SlotKey, fetcher: Fetcher<P, T>, events: Arc<EventBus>) -> Self {
        Self::build(key, fetcher, Some(events))
    }

    fn build(key: SlotKey, fetcher: Fetcher<P, T>, events: Option<Arc<EventBus>>) -> Self {
        let (view, _) = watch::channel(SlotView {
            request: None,
            result: QueryResult::Idle,
            seq: 0,
        });
        Self {
            shared: Arc::new(Shared {
                key,
                state: Mutex::new(SlotState {
                    last_seq: 0,
                    request: None,
                    result: QueryResult::Idle,
                    in_flight: None,
                }),
                view,
                events,
            }),
            fetcher,
        }
    }

    pub fn key(&self) -> SlotKey {
        self.shared.key
    }

    /// Ask for `request`'s data.
    ///
    /// Does nothing if an equivalent request is loading or ready.
    /// Otherwise cancels any outstanding fetch and starts a new one.
    pub fn request(&self, request: QueryRequest<P>) -> IssueOutcome {
        self.issue(request, false)
    }

    /// Like [`request`](Self::request), but refetches an equivalent
    /// request that already settled. Used for explicit retries.
    pub fn reload(&self, request: QueryRequest<P>) -> IssueOutcome {
        self.issue(request, true)
    }

    /// Issue `request` only while `gate` holds; otherwise reset the slot.
    pub fn request_if(&self, request: QueryRequest<P>, gate: bool) -> IssueOutcome {
        if !gate {
            self.reset();
            return IssueOutcome::Gated;
        }
        self.request(request)
    }

    /// Cancel any in-flight fetch and return to idle.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        if let Some(in_flight) = state.in_flight.take() {
            tracing::debug!(slot = %self.shared.key, seq = in_flight.seq, "Cancelling fetch");
            in_flight.cancel.cancel();
        }
        if state.request.is_none() && state.result.is_idle() {
            return;
        }
        state.request = None;
        state.result = QueryResult::Idle;
        self.shared.publish(&state);
    }

    pub fn result(&self) -> QueryResult<T> {
        self.shared.lock().result.clone()
    }

    /// The request the current result belongs to.
    pub fn current_request(&self) -> Option<QueryRequest<P>> {
        self.shared.lock().request.clone()
    }

    pub fn latest_seq(&self) -> u64 {
        self.shared.lock().last_seq
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<SlotView<P, T>> {
        self.shared.view.subscribe()
    }

    /// Wait until the slot is no longer loading and return its result.
    pub async fn settled(&self) -> QueryResult<T> {
        let mut rx = self.shared.view.subscribe();
        let settled = match rx.wait_for(|view| !view.result.is_loading()).await {
            Ok(view) => view.result.clone(),
            Err(_) => self.result(),
        };
        settled
    }

    /// Apply the outcome of fetch `seq`. Returns `false` if `seq` is no
    /// longer the fetch in flight, in which case nothing changes.
    pub(crate) fn apply(&self, seq: u64, outcome: Result<T, ClientError>) -> bool {
        self.shared.apply(seq, outcome)
    }

    // ---- private helpers ----

    fn issue(&self, request: QueryRequest<P>, force: bool) -> IssueOutcome {
        let key = self.shared.key;
        let (seq, cancel) = {
            let mut state = self.shared.lock();
            if state.request.as_ref() == Some(&request) {
                match state.result {
                    QueryResult::Loading => return IssueOutcome::Unchanged,
                    QueryResult::Ready(_) if !force => return IssueOutcome::Unchanged,
                    _ => {}
                }
            }

            if let Some(previous) = state.in_flight.take() {
                tracing::debug!(slot = %key, seq = previous.seq, "Superseding fetch");
                previous.cancel.cancel();
            }

            state.last_seq += 1;
            let seq = state.last_seq;
            let cancel = CancellationToken::new();
            state.in_flight = Some(InFlight {
                seq,
                cancel: cancel.clone(),
            });
            state.request = Some(request.clone());
            state.result = QueryResult::Loading;
            self.shared.publish(&state);
            (seq, cancel)
        };

        tracing::debug!(
            slot = %key,
            seq,
            job_id = %request.job_id,
            params = ?request.params,
            "Issuing fetch",
        );

        let fetch = (self.fetcher)(request);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::trace!(slot = %key, seq, "Fetch cancelled");
                }
                outcome = fetch => {
                    shared.apply(seq, outcome);
                }
            }
        });

        IssueOutcome::Started(seq)
    }
}

impl<P: Clone, T> Shared<P, T> {
    fn lock(&self) -> MutexGuard<'_, SlotState<P, T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &SlotState<P, T>) {
        self.view.send_replace(SlotView {
            request: state.request.clone(),
            result: state.result.clone(),
            seq: state.last_seq,
        });
    }

    fn apply(&self, seq: u64, outcome: Result<T, ClientError>) -> bool {
        let mut state = self.lock();
        match &state.in_flight {
            Some(in_flight) if in_flight.seq == seq => {}
            _ => {
                tracing::debug!(slot = %self.key, seq, latest = state.last_seq, "Discarding stale response");
                return false;
            }
        }
        state.in_flight = None;

        let settled = match outcome {
            Ok(payload) => {
                state.result = QueryResult::Ready(Arc::new(payload));
                SlotOutcome::Ready
            }
            Err(err) => {
                tracing::warn!(slot = %self.key, seq, error = %err, "Fetch failed");
                let error = err.to_string();
                state.result = QueryResult::Failed(err);
                SlotOutcome::Failed { error }
            }
        };
        self.publish(&state);

        let job_id = state
            .request
            .as_ref()
            .map(|request| request.job_id.clone())
            .unwrap_or_default();
        drop(state);

        if let Some(events) = &self.events {
            events.publish(EventKind::SlotSettled {
                slot: self.key,
                job_id,
                seq,
                outcome: settled,
            });
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use futures::FutureExt;
    use mmm_core::error::NetworkError;
    use tokio::sync::oneshot;

    use super::*;

    type Replies = Arc<Mutex<Vec<(QueryRequest<u32>, oneshot::Sender<Result<u32, ClientError>>)>>>;

    /// A fetcher whose responses the test delivers by hand.
    fn manual_fetcher() -> (Fetcher<u32, u32>, Replies) {
        let replies: Replies = Arc::default();
        let registry = Arc::clone(&replies);
        let fetcher: Fetcher<u32, u32> = Arc::new(move |request| {
            let (tx, rx) = oneshot::channel();
            registry.lock().unwrap().push((request, tx));
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(NetworkError::Transport("dropped".into()).into()))
            }
            .boxed()
        });
        (fetcher, replies)
    }

    fn req(job: &str, params: u32) -> QueryRequest<u32> {
        QueryRequest::new(SlotKey::Budget, job, params)
    }

    fn reply(replies: &Replies, index: usize, value: Result<u32, ClientError>) -> bool {
        let (_, tx) = replies.lock().unwrap().remove(index);
        tx.send(value).is_ok()
    }

    async fn yield_many() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn loading_is_visible_before_the_fetch_runs() {
        let (fetcher, _replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        assert_eq!(slot.request(req("job-1", 5)), IssueOutcome::Started(1));
        assert_matches!(slot.result(), QueryResult::Loading);
        assert_eq!(slot.current_request(), Some(req("job-1", 5)));
    }

    #[tokio::test]
    async fn settled_waits_out_loading_and_returns_idle_at_once() {
        let (fetcher, replies) = manual_fetcher();
        let slot = Arc::new(QuerySlot::new(SlotKey::Budget, fetcher));
        assert_matches!(slot.settled().await, QueryResult::Idle);

        slot.request(req("job-1", 5));
        let waiter = tokio::spawn({
            let slot = Arc::clone(&slot);
            async move { slot.settled().await }
        });
        yield_many().await;
        assert!(!waiter.is_finished());

        reply(&replies, 0, Ok(9));
        let settled = waiter.await.unwrap();
        assert_eq!(*settled.ready().unwrap().as_ref(), 9);
    }

    #[tokio::test]
    async fn equivalent_request_while_loading_is_not_reissued() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        assert_eq!(slot.request(req("job-1", 5)), IssueOutcome::Unchanged);
        assert_eq!(replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ready_equivalent_short_circuits_but_reload_refetches() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        reply(&replies, 0, Ok(50));
        assert_eq!(*slot.settled().await.ready().unwrap().as_ref(), 50);

        assert_eq!(slot.request(req("job-1", 5)), IssueOutcome::Unchanged);
        assert_eq!(slot.reload(req("job-1", 5)), IssueOutcome::Started(2));
        assert_eq!(replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_sequence_numbers_are_discarded() {
        let (fetcher, _replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        slot.request(req("job-1", 6));

        assert!(!slot.apply(1, Ok(111)));
        assert_matches!(slot.result(), QueryResult::Loading);

        assert!(slot.apply(2, Ok(222)));
        assert_eq!(*slot.result().ready().unwrap().as_ref(), 222);

        // Already settled; a duplicate delivery changes nothing.
        assert!(!slot.apply(2, Ok(333)));
        assert_eq!(*slot.result().ready().unwrap().as_ref(), 222);
    }

    /// The superseded fetch future is dropped, releasing what it captured.
    #[tokio::test]
    async fn superseded_fetch_is_dropped() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        yield_many().await;
        slot.request(req("job-2", 5));
        yield_many().await;

        assert!(!reply(&replies, 0, Ok(1)), "first fetch should be gone");
        assert_matches!(slot.result(), QueryResult::Loading);
        assert_eq!(slot.current_request(), Some(req("job-2", 5)));

        assert!(reply(&replies, 0, Ok(2)));
        assert_eq!(*slot.settled().await.ready().unwrap().as_ref(), 2);
    }

    #[tokio::test]
    async fn failure_does_not_poison_the_slot() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        reply(&replies, 0, Err(ClientError::Decode("bad".into())));
        assert_matches!(slot.settled().await, QueryResult::Failed(ClientError::Decode(_)));

        assert_eq!(slot.request(req("job-1", 5)), IssueOutcome::Started(2));
        reply(&replies, 0, Ok(7));
        assert_eq!(*slot.settled().await.ready().unwrap().as_ref(), 7);
    }

    #[tokio::test]
    async fn closed_gate_resets_and_cancels() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        assert_eq!(slot.request_if(req("job-2", 5), false), IssueOutcome::Gated);
        assert_matches!(slot.result(), QueryResult::Idle);
        assert_eq!(slot.current_request(), None);

        yield_many().await;
        assert!(!reply(&replies, 0, Ok(1)));
        assert_matches!(slot.result(), QueryResult::Idle);
    }

    #[tokio::test]
    async fn late_response_after_reset_is_ignored() {
        let (fetcher, _replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);

        slot.request(req("job-1", 5));
        slot.reset();
        assert!(!slot.apply(1, Ok(1)));
        assert_matches!(slot.result(), QueryResult::Idle);
        assert_eq!(slot.latest_seq(), 1);
    }

    #[tokio::test]
    async fn watchers_see_each_transition() {
        let (fetcher, replies) = manual_fetcher();
        let slot = QuerySlot::new(SlotKey::Budget, fetcher);
        let mut rx = slot.subscribe();

        slot.request(req("job-1", 5));
        assert!(rx.has_changed().unwrap());
        assert_matches!(rx.borrow_and_update().result, QueryResult::Loading);

        reply(&replies, 0, Ok(9));
        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.seq, 1);
        assert_eq!(view.request, Some(req("job-1", 5)));
        assert_matches!(view.result, QueryResult::Ready(_));
    }

    #[tokio::test]
    async fn settled_fetches_are_reported_on_the_bus() {
        let (fetcher, replies) = manual_fetcher();
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let slot = QuerySlot::with_events(SlotKey::Budget, fetcher, Arc::clone(&events));

        slot.request(req("job-1", 5));
        reply(&replies, 0, Ok(9));
        slot.settled().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.kind,
            EventKind::SlotSettled {
                slot: SlotKey::Budget,
                job_id: "job-1".into(),
                seq: 1,
                outcome: SlotOutcome::Ready,
            }
        );
    }
}
