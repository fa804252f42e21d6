use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::api::StudentApi;
use super::domain::StatusSnapshot;

/// What observers of the aggregator see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusView {
    pub snapshot: StatusSnapshot,
    /// True while at least one refresh is still in flight.
    pub loading: bool,
    /// Ticket of the refresh that produced `snapshot`; 0 before the first refresh lands.
    pub generation: u64,
}

/// Merges pending applications, approved applications and the internship flag into one
/// snapshot, replacing all three at once.
pub struct StatusAggregator<A> {
    api: Arc<A>,
    tracker: Arc<RefreshTracker>,
}

impl<A> StatusAggregator<A>
where
    A: StudentApi + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        let (view, _) = watch::channel(StatusView::default());
        Self {
            api,
            tracker: Arc::new(RefreshTracker {
                issued: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                view,
            }),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tracker.view.borrow().snapshot.clone()
    }

    pub fn view(&self) -> StatusView {
        self.tracker.view.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.tracker.view.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.tracker.view.subscribe()
    }

    /// Fetch the three collections concurrently and replace the snapshot. Never fails: any
    /// fetch error collapses the snapshot to its empty default. Dropping the future before it
    /// resolves abandons its ticket and leaves the snapshot as it was.
    pub async fn refresh(&self) -> StatusSnapshot {
        let ticket = self.begin();
        let snapshot = fetch_snapshot(self.api.as_ref()).await;
        self.apply(ticket, snapshot);
        self.snapshot()
    }

    /// Refresh without keeping the aggregator alive. The task resolves to `true` when its
    /// result was applied and `false` when it was stale or the owner was dropped meanwhile.
    /// Must be called from within a tokio runtime.
    pub fn refresh_in_background(self: &Arc<Self>) -> JoinHandle<bool> {
        let ticket = self.begin();
        let api = Arc::clone(&self.api);
        let owner = Arc::downgrade(self);

        tokio::spawn(async move {
            let snapshot = fetch_snapshot(api.as_ref()).await;
            match owner.upgrade() {
                Some(aggregator) => aggregator.apply(ticket, snapshot),
                None => {
                    debug!(
                        ticket = ticket.id(),
                        "status owner disposed, discarding refresh result"
                    );
                    false
                }
            }
        })
    }

    pub(crate) fn begin(&self) -> RefreshTicket {
        self.tracker.issue()
    }

    /// Last request wins: a response older than the applied one is dropped.
    pub(crate) fn apply(&self, ticket: RefreshTicket, snapshot: StatusSnapshot) -> bool {
        let id = ticket.id();
        let applied = ticket.settle(Some(snapshot));
        if !applied {
            debug!(ticket = id, "dropping stale status refresh");
        }
        applied
    }
}

struct RefreshTracker {
    issued: AtomicU64,
    in_flight: AtomicUsize,
    view: watch::Sender<StatusView>,
}

impl RefreshTracker {
    fn issue(self: &Arc<Self>) -> RefreshTicket {
        let mut id = 0;
        // Counters move under the watch lock so `loading` always matches `in_flight`.
        self.view.send_modify(|view| {
            id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            view.loading = true;
        });
        RefreshTicket {
            tracker: Arc::clone(self),
            id,
            settled: false,
        }
    }

    fn settle(&self, id: u64, snapshot: Option<StatusSnapshot>) -> bool {
        let mut applied = false;
        self.view.send_if_modified(|view| {
            let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            let was_loading = view.loading;
            view.loading = remaining > 0;

            if let Some(snapshot) = snapshot {
                if id > view.generation {
                    view.snapshot = snapshot;
                    view.generation = id;
                    applied = true;
                }
            }
            applied || was_loading != view.loading
        });
        applied
    }
}

/// Claim on one in-flight refresh. Dropping it unsettled (a cancelled refresh, an aborted
/// background task) releases the claim so `loading` cannot stick.
pub(crate) struct RefreshTicket {
    tracker: Arc<RefreshTracker>,
    id: u64,
    settled: bool,
}

impl RefreshTicket {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn settle(mut self, snapshot: Option<StatusSnapshot>) -> bool {
        self.settled = true;
        self.tracker.settle(self.id, snapshot)
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        if !self.settled {
            debug!(ticket = self.id, "status refresh abandoned");
            self.tracker.settle(self.id, None);
        }
    }
}

pub(crate) async fn fetch_snapshot<A: StudentApi>(api: &A) -> StatusSnapshot {
    let fetched = tokio::try_join!(
        api.pending_applications(),
        api.approved_applications(),
        api.internship_status(),
    );

    match fetched {
        Ok((pending, approved, status)) => {
            debug!(
                pending = pending.len(),
                approved = approved.len(),
                on_internship = status.on_internship,
                "student status refreshed"
            );
            StatusSnapshot::new(pending, approved, status)
        }
        Err(err) => {
            warn!(error = %err, "status refresh failed, falling back to empty status");
            StatusSnapshot::default()
        }
    }
}
