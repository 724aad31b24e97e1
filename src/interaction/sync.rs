use crate::model::{find_by_id, EntityId, Identified};
use std::future::Future;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("reload failed: {0}")]
    ReloadFailed(String),
}

/// A reloadable, read-shared collection owned outside the controller.
pub trait EntitySource {
    type Entity: Identified + Clone;

    /// Repopulates the collection from the source of truth.
    fn reload(&self) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Current contents, read after `reload` settles.
    fn entities(&self) -> Vec<Self::Entity>;
}

/// Identifies one reload request. Only the most recently issued ticket is
/// ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Closed,
    Opening { id: EntityId, ticket: SyncTicket },
    Open { id: EntityId },
}

/// Result of a reload, paired with the ticket it was issued for.
#[derive(Debug, Clone)]
pub struct ReloadCompletion<E> {
    pub ticket: SyncTicket,
    pub result: Result<Vec<E>, SyncError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome<'a, E> {
    Refreshed(&'a E),
    /// Lookup missed; the previous snapshot stays on screen.
    NotFound,
    /// A newer request superseded this one.
    Discarded,
}

#[derive(Debug)]
struct PendingReload {
    ticket: SyncTicket,
    id: EntityId,
}

/// Keeps an overlay's snapshot fresh, reloading at most once per distinct
/// target identity.
#[derive(Debug)]
pub struct EntitySyncController<E> {
    phase: SyncPhase,
    last_synced: Option<EntityId>,
    pending: Option<PendingReload>,
    snapshot: Option<E>,
    next_ticket: u64,
}

impl<E> Default for EntitySyncController<E> {
    fn default() -> Self {
        EntitySyncController {
            phase: SyncPhase::Closed,
            last_synced: None,
            pending: None,
            snapshot: None,
            next_ticket: 0,
        }
    }
}

impl<E: Identified + Clone> EntitySyncController<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    pub fn snapshot(&self) -> Option<&E> {
        self.snapshot.as_ref()
    }

    pub fn last_synced(&self) -> Option<&str> {
        self.last_synced.as_deref()
    }

    /// Feeds the overlay's current state. Returns a ticket when the caller
    /// must start a reload; the overlay renders the last-known snapshot
    /// meanwhile.
    pub fn observe(&mut self, open: bool, target: Option<&E>) -> Option<SyncTicket> {
        let target = match (open, target) {
            (true, Some(target)) => target,
            _ => {
                if self.phase != SyncPhase::Closed {
                    debug!("overlay closed");
                }
                self.phase = SyncPhase::Closed;
                return None;
            }
        };
        let id = target.id();

        if self.snapshot.as_ref().map(Identified::id) != Some(id) {
            self.snapshot = Some(target.clone());
        }

        match &self.phase {
            SyncPhase::Open { id: open_id } if open_id == id => return None,
            SyncPhase::Opening { id: open_id, .. } if open_id == id => return None,
            _ => {}
        }

        if let Some(pending) = self.pending.as_ref().filter(|p| p.id == id) {
            // reopened while the earlier reload for this id is still in flight
            self.phase = SyncPhase::Opening {
                id: id.to_string(),
                ticket: pending.ticket,
            };
            return None;
        }

        if self.last_synced.as_deref() == Some(id) {
            self.phase = SyncPhase::Open { id: id.to_string() };
            return None;
        }

        let ticket = SyncTicket(self.next_ticket);
        self.next_ticket += 1;
        if let Some(superseded) = self.pending.replace(PendingReload {
            ticket,
            id: id.to_string(),
        }) {
            debug!(superseded = %superseded.id, "in-flight reload superseded");
        }
        self.phase = SyncPhase::Opening {
            id: id.to_string(),
            ticket,
        };
        debug!(id, ticket = ticket.0, "reload issued");
        Some(ticket)
    }

    /// Applies a settled reload. Stale tickets are dropped without touching
    /// the snapshot, and so are failures of stale tickets.
    pub fn complete(
        &mut self,
        completion: ReloadCompletion<E>,
    ) -> Result<SyncOutcome<'_, E>, SyncError> {
        let is_current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.ticket == completion.ticket);
        if !is_current {
            debug!(ticket = completion.ticket.0, "stale reload discarded");
            return Ok(SyncOutcome::Discarded);
        }
        let Some(pending) = self.pending.take() else {
            return Ok(SyncOutcome::Discarded);
        };
        if let SyncPhase::Opening { ticket, .. } = &self.phase {
            if *ticket == pending.ticket {
                self.phase = SyncPhase::Open {
                    id: pending.id.clone(),
                };
            }
        }

        let entities = match completion.result {
            Ok(entities) => entities,
            Err(err) => {
                warn!(id = %pending.id, error = %err, "reload failed, keeping snapshot");
                return Err(err);
            }
        };

        self.last_synced = Some(pending.id.clone());
        match find_by_id(&entities, &pending.id) {
            Some(fresh) => {
                self.snapshot = Some(fresh.clone());
                debug!(id = %pending.id, "snapshot refreshed");
                Ok(self
                    .snapshot
                    .as_ref()
                    .map_or(SyncOutcome::NotFound, SyncOutcome::Refreshed))
            }
            None => {
                info!(id = %pending.id, "entity missing after reload");
                Ok(SyncOutcome::NotFound)
            }
        }
    }

    /// Re-resolves the snapshot against a collection someone else already
    /// reloaded. Never triggers a reload and never changes the cursor.
    pub fn reconcile(&mut self, entities: &[E]) -> bool {
        let Some(current) = self.snapshot.as_ref() else {
            return false;
        };
        match find_by_id(entities, current.id()) {
            Some(fresh) => {
                self.snapshot = Some(fresh.clone());
                true
            }
            None => false,
        }
    }

    /// Forgets the last synced id so the next open reloads even for the
    /// same identity.
    pub fn invalidate(&mut self) {
        self.last_synced = None;
        if let SyncPhase::Open { .. } = self.phase {
            self.phase = SyncPhase::Closed;
        }
    }
}

/// Runs the reload for `ticket` and captures the collection it produced.
pub async fn run_reload<S: EntitySource>(
    source: &S,
    ticket: SyncTicket,
) -> ReloadCompletion<S::Entity> {
    let result = match source.reload().await {
        Ok(()) => Ok(source.entities()),
        Err(err) => Err(err),
    };
    ReloadCompletion { ticket, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        label: String,
    }

    impl Identified for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, label: &str) -> Item {
        Item {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Collection whose reloads swap in `fresh`, optionally waiting on a gate.
    #[derive(Clone, Default)]
    struct FakeSource {
        items: Arc<Mutex<Vec<Item>>>,
        fresh: Arc<Mutex<Vec<Item>>>,
        reloads: Arc<AtomicUsize>,
        gates: Arc<Mutex<VecDeque<oneshot::Receiver<Vec<Item>>>>>,
        fail: bool,
    }

    impl EntitySource for FakeSource {
        type Entity = Item;

        fn reload(&self) -> impl Future<Output = Result<(), SyncError>> + Send {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().pop_front();
            let items = Arc::clone(&self.items);
            let fresh = self.fresh.lock().clone();
            let fail = self.fail;
            async move {
                if fail {
                    return Err(SyncError::ReloadFailed("offline".into()));
                }
                let next = match gate {
                    Some(rx) => rx.await.unwrap_or_default(),
                    None => fresh,
                };
                *items.lock() = next;
                Ok(())
            }
        }

        fn entities(&self) -> Vec<Item> {
            self.items.lock().clone()
        }
    }

    #[tokio::test]
    async fn open_refreshes_snapshot_from_collection() {
        let source = FakeSource::default();
        *source.fresh.lock() = vec![item("a", "fresh")];
        let mut sync = EntitySyncController::new();

        let ticket = sync.observe(true, Some(&item("a", "cached"))).unwrap();
        assert_eq!(sync.snapshot().unwrap().label, "cached");
        assert!(matches!(sync.phase(), SyncPhase::Opening { .. }));

        let completion = run_reload(&source, ticket).await;
        let outcome = sync.complete(completion).unwrap();
        assert_eq!(outcome, SyncOutcome::Refreshed(&item("a", "fresh")));
        assert_eq!(sync.snapshot().unwrap().label, "fresh");
        assert_eq!(sync.phase(), &SyncPhase::Open { id: "a".into() });
    }

    #[tokio::test]
    async fn reload_count_follows_identity_changes() {
        let source = FakeSource::default();
        *source.fresh.lock() = vec![item("a", "A"), item("b", "B")];
        let mut sync = EntitySyncController::new();

        for (open, id) in [(true, "a"), (false, "a"), (true, "a"), (true, "b"), (true, "a")] {
            let target = item(id, "cached");
            if let Some(ticket) = sync.observe(open, Some(&target)) {
                let completion = run_reload(&source, ticket).await;
                sync.complete(completion).unwrap();
            }
        }
        // a, b, a: one reload per change of identity, not per open
        assert_eq!(source.reloads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rerenders_while_open_do_not_reissue() {
        let mut sync = EntitySyncController::new();
        let a = item("a", "cached");
        assert!(sync.observe(true, Some(&a)).is_some());
        assert!(sync.observe(true, Some(&a)).is_none());
        assert!(sync.observe(true, Some(&a)).is_none());
    }

    #[test]
    fn reopening_during_flight_reuses_ticket() {
        let mut sync = EntitySyncController::new();
        let a = item("a", "cached");
        let ticket = sync.observe(true, Some(&a)).unwrap();
        sync.observe(false, None);
        assert!(sync.observe(true, Some(&a)).is_none());
        assert_eq!(
            sync.phase(),
            &SyncPhase::Opening {
                id: "a".into(),
                ticket
            }
        );
    }

    #[tokio::test]
    async fn superseded_reload_is_discarded() {
        let source = FakeSource::default();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        source.gates.lock().extend([rx_a, rx_b]);
        let mut sync = EntitySyncController::new();

        let ticket_a = sync.observe(true, Some(&item("a", "cached a"))).unwrap();
        let ticket_b = sync.observe(true, Some(&item("b", "cached b"))).unwrap();

        let reload_a = tokio::spawn({
            let source = source.clone();
            async move { run_reload(&source, ticket_a).await }
        });
        // let the first request claim its gate before the second starts
        tokio::task::yield_now().await;
        let reload_b = tokio::spawn({
            let source = source.clone();
            async move { run_reload(&source, ticket_b).await }
        });

        // b settles first, then the older a request resolves late
        tx_b.send(vec![item("a", "A v1"), item("b", "B v1")]).unwrap();
        let done_b = reload_b.await.unwrap();
        assert!(matches!(
            sync.complete(done_b).unwrap(),
            SyncOutcome::Refreshed(_)
        ));
        tx_a.send(vec![item("a", "A v2"), item("b", "B v2")]).unwrap();
        let done_a = reload_a.await.unwrap();
        assert_eq!(sync.complete(done_a).unwrap(), SyncOutcome::Discarded);

        assert_eq!(sync.snapshot().unwrap(), &item("b", "B v1"));
        assert_eq!(sync.last_synced(), Some("b"));
    }

    #[test]
    fn stale_result_arriving_first_is_also_discarded() {
        let mut sync = EntitySyncController::new();
        let ticket_a = sync.observe(true, Some(&item("a", "cached a"))).unwrap();
        let ticket_b = sync.observe(true, Some(&item("b", "cached b"))).unwrap();

        let stale = ReloadCompletion {
            ticket: ticket_a,
            result: Ok(vec![item("a", "A"), item("b", "B old")]),
        };
        assert_eq!(sync.complete(stale).unwrap(), SyncOutcome::Discarded);
        assert_eq!(sync.snapshot().unwrap().label, "cached b");

        let current = ReloadCompletion {
            ticket: ticket_b,
            result: Ok(vec![item("b", "B new")]),
        };
        sync.complete(current).unwrap();
        assert_eq!(sync.snapshot().unwrap().label, "B new");
    }

    #[tokio::test]
    async fn missing_entity_keeps_snapshot() {
        let source = FakeSource::default();
        *source.fresh.lock() = vec![item("other", "x")];
        let mut sync = EntitySyncController::new();

        let ticket = sync.observe(true, Some(&item("a", "cached"))).unwrap();
        let outcome = sync.complete(run_reload(&source, ticket).await).unwrap();
        assert_eq!(outcome, SyncOutcome::NotFound);
        assert_eq!(sync.snapshot().unwrap(), &item("a", "cached"));
    }

    #[tokio::test]
    async fn failed_reload_surfaces_error_and_keeps_snapshot() {
        let source = FakeSource {
            fail: true,
            ..FakeSource::default()
        };
        let mut sync = EntitySyncController::new();

        let ticket = sync.observe(true, Some(&item("a", "cached"))).unwrap();
        let err = sync.complete(run_reload(&source, ticket).await).unwrap_err();
        assert_eq!(err, SyncError::ReloadFailed("offline".into()));
        assert_eq!(sync.snapshot().unwrap().label, "cached");
        assert_eq!(sync.last_synced(), None);
        // still open on the same id: no automatic retry
        assert!(sync.observe(true, Some(&item("a", "cached"))).is_none());
    }

    #[test]
    fn invalidate_forces_reload_on_next_open() {
        let mut sync = EntitySyncController::new();
        let a = item("a", "cached");
        let ticket = sync.observe(true, Some(&a)).unwrap();
        sync.complete(ReloadCompletion {
            ticket,
            result: Ok(vec![a.clone()]),
        })
        .unwrap();
        sync.observe(false, None);
        assert!(sync.observe(true, Some(&a)).is_none());

        sync.observe(false, None);
        sync.invalidate();
        assert!(sync.observe(true, Some(&a)).is_some());
    }

    #[test]
    fn reconcile_picks_up_external_changes_without_reload() {
        let mut sync = EntitySyncController::new();
        sync.observe(true, Some(&item("a", "cached")));
        assert!(sync.reconcile(&[item("a", "edited")]));
        assert_eq!(sync.snapshot().unwrap().label, "edited");
        assert!(!sync.reconcile(&[]));
        assert_eq!(sync.snapshot().unwrap().label, "edited");
    }
}
