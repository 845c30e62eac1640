use crate::api::{ApiError, CancelHandle, ResourceService};
use crate::ledger::entry::{Category, DraftError, Entry, EntryDraft};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors surfaced by the synced mutation operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

// ============================================================================
// Controller
// ============================================================================

struct LedgerState {
    /// Insertion-ordered collection, owned exclusively by the controller.
    entries: Vec<Entry>,
    /// Active category filter; `None` means the full collection is visible.
    filter: Option<Category>,
}

/// Authoritative in-memory view of the expense collection.
///
/// The controller owns the ordered collection and its category-filtered
/// projection. Synchronous operations (`add`, `delete`, `set_filter`,
/// `visible_entries`) are atomic with respect to each other; the internal
/// lock is never held across an await. `refresh` replaces the collection
/// from the server and guarantees that only the most recent fetch's result
/// is ever applied: starting a new refresh cancels the outstanding one, and
/// a stale completion that still lands is discarded by a generation check.
pub struct LedgerController {
    service: ResourceService<Entry>,
    state: Mutex<LedgerState>,
    /// Bumped when a refresh is issued. A completion whose generation no
    /// longer matches has been overtaken and must not touch the collection.
    refresh_generation: AtomicU64,
    /// Cancel handle for the outstanding list fetch, if any.
    pending_fetch: Mutex<Option<CancelHandle>>,
}

impl LedgerController {
    /// Create a controller with an empty collection.
    pub fn new(service: ResourceService<Entry>) -> Self {
        Self::with_entries(service, Vec::new())
    }

    /// Create a controller pre-seeded with entries.
    pub fn with_entries(service: ResourceService<Entry>, entries: Vec<Entry>) -> Self {
        Self {
            service,
            state: Mutex::new(LedgerState {
                entries,
                filter: None,
            }),
            refresh_generation: AtomicU64::new(0),
            pending_fetch: Mutex::new(None),
        }
    }

    /// Validate a draft and append it to the collection.
    ///
    /// Purely local and synchronous: the new entry gets the next free
    /// identifier (max existing + 1, or 1 for an empty collection) and is
    /// visible immediately. Use [`add_synced`](Self::add_synced) to also
    /// confirm the entry with the server.
    pub fn add(&self, draft: EntryDraft) -> Result<Entry, DraftError> {
        draft.validate()?;
        let mut state = self.state();
        let id = next_id(&state.entries);
        let entry = draft.into_entry(id);
        state.entries.push(entry.clone());
        tracing::debug!(id = entry.id, "Entry added");
        Ok(entry)
    }

    /// Optimistically append a draft, then confirm it with the server.
    ///
    /// The entry is visible locally before the create request completes. On
    /// success the server-assigned representation replaces the locally
    /// assigned one; on failure the append is rolled back and the error
    /// surfaced.
    pub async fn add_synced(&self, draft: EntryDraft) -> Result<Entry, LedgerError> {
        let local = self.add(draft)?;

        match self.service.create(&local).await {
            Ok(confirmed) => {
                let mut state = self.state();
                if let Some(slot) = state.entries.iter_mut().find(|e| e.id == local.id) {
                    *slot = confirmed.clone();
                }
                tracing::debug!(id = confirmed.id, "Entry confirmed by server");
                Ok(confirmed)
            }
            Err(e) => {
                self.state().entries.retain(|entry| entry.id != local.id);
                tracing::warn!(id = local.id, error = %e, "Create rejected, rolled back local entry");
                Err(e.into())
            }
        }
    }

    /// Remove the entry with the given identifier.
    ///
    /// Returns whether an entry was removed; an absent identifier is a no-op,
    /// not an error.
    pub fn delete(&self, id: u64) -> bool {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != id);
        let removed = state.entries.len() != before;
        if removed {
            tracing::debug!(id, "Entry deleted");
        }
        removed
    }

    /// Optimistically remove an entry, then confirm the deletion remotely.
    ///
    /// On remote failure the entry is restored at its original position and
    /// the error surfaced. Returns `Ok(false)` without issuing a request when
    /// the identifier is absent.
    pub async fn delete_synced(&self, id: u64) -> Result<bool, ApiError> {
        let removed = {
            let mut state = self.state();
            match state.entries.iter().position(|entry| entry.id == id) {
                Some(pos) => Some((pos, state.entries.remove(pos))),
                None => None,
            }
        };
        let Some((pos, entry)) = removed else {
            return Ok(false);
        };

        if let Err(e) = self.service.remove(id).await {
            let mut state = self.state();
            let pos = pos.min(state.entries.len());
            state.entries.insert(pos, entry);
            tracing::warn!(id, error = %e, "Delete rejected, restored local entry");
            return Err(e);
        }
        Ok(true)
    }

    /// Set or clear the category filter. Purely local, always succeeds.
    pub fn set_filter(&self, category: Option<Category>) {
        self.state().filter = category;
    }

    pub fn filter(&self) -> Option<Category> {
        self.state().filter
    }

    /// The collection filtered by the active category, in insertion order.
    pub fn visible_entries(&self) -> Vec<Entry> {
        let state = self.state();
        match state.filter {
            Some(category) => state
                .entries
                .iter()
                .filter(|entry| entry.category == category)
                .cloned()
                .collect(),
            None => state.entries.clone(),
        }
    }

    /// Sum of amounts over the visible entries.
    pub fn visible_total(&self) -> f64 {
        let state = self.state();
        state
            .entries
            .iter()
            .filter(|entry| state.filter.map_or(true, |c| entry.category == c))
            .map(|entry| entry.amount)
            .sum()
    }

    /// Replace the collection from the server.
    ///
    /// Cancels any outstanding fetch from a prior call before issuing the new
    /// one. On success the collection is replaced wholesale and server
    /// identifiers become authoritative. A cancelled fetch resolves `Ok`
    /// without touching the collection; any other failure is surfaced with
    /// the collection untouched. A stale completion (one overtaken by a
    /// newer refresh) is discarded regardless of its outcome.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (request, cancel) = self.service.list();

        if let Some(prior) = self.pending_slot().replace(cancel) {
            tracing::debug!(generation, "Superseding outstanding refresh");
            prior.cancel();
        }

        let result = request.await;
        let current = self.refresh_generation.load(Ordering::SeqCst) == generation;
        if current {
            self.pending_slot().take();
        }

        match result {
            Ok(entries) => {
                if !current {
                    tracing::debug!(generation, "Discarding stale refresh result");
                    return Ok(());
                }
                let count = entries.len();
                self.state().entries = entries;
                tracing::info!(generation, entries = count, "Collection replaced from server");
                Ok(())
            }
            Err(e) if e.is_cancelled() || !current => {
                tracing::debug!(generation, "Refresh superseded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "Refresh failed, collection untouched");
                Err(e)
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // A poisoned lock only means some other thread panicked; the ledger
        // data itself is still valid.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_slot(&self) -> MutexGuard<'_, Option<CancelHandle>> {
        self.pending_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn next_id(entries: &[Entry]) -> u64 {
    entries.iter().map(|entry| entry.id).max().map_or(1, |max| max + 1)
}
