//! Entity stores mirroring remote collections.
//!
//! # Architecture
//!
//! Every store follows the same lifecycle:
//!
//! ```text
//! Uninitialized -> Hydrating -> Ready -> Syncing -> Ready
//! ```
//!
//! - **Hydrating** reads the persisted snapshot so something can be shown
//!   before the network answers.
//! - **Syncing** is a fetch in flight. Success replaces memory and the
//!   snapshot; failure keeps prior state (or the snapshot if memory is
//!   empty), returns to `Ready` and publishes one warning.
//! - Mutations apply only after the backend confirms them. Mutations on the
//!   same entity id are serialized; distinct ids run concurrently.
//! - Logout calls `clear_local`, which empties memory and deletes the
//!   snapshot entry without touching the network. Responses to requests
//!   started before logout are dropped when they arrive.

mod cart;
mod locks;
mod lookup;
mod orders;
mod wishlist;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub use cart::{CartItem, CartStore, CartVariant, NewCartItem};
pub use locks::KeyedLocks;
pub use lookup::{LookupItem, LookupKind, LookupStore};
pub use orders::{Order, OrderItem, OrderItemVariant, OrderPatch, OrdersStore, Pagination};
pub use wishlist::{WishlistItem, WishlistStore, WishlistVariant};

use crate::api::Gateway;
use crate::notify::Notifier;
use crate::snapshot::{self, SnapshotStore};

/// Lifecycle phase of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreStatus {
    #[default]
    Uninitialized,
    /// Reading the persisted snapshot.
    Hydrating,
    Ready,
    /// A fetch is in flight.
    Syncing,
}

/// In-memory state of a store.
#[derive(Debug, Clone)]
pub struct EntityState<T> {
    pub status: StoreStatus,
    pub items: Vec<T>,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            status: StoreStatus::Uninitialized,
            items: Vec::new(),
        }
    }
}

/// Collaborators every store needs.
#[derive(Clone)]
pub struct StoreContext {
    pub gateway: Arc<dyn Gateway>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub notifier: Notifier,
}

impl StoreContext {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn Gateway>,
        snapshots: Arc<dyn SnapshotStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            gateway,
            snapshots,
            notifier,
        }
    }

    /// Overwrite a snapshot entry. Failures are logged, never surfaced.
    pub(crate) fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = snapshot::save_json(self.snapshots.as_ref(), key, value) {
            warn!(key, error = %e, "Failed to persist snapshot");
        }
    }

    /// Read a snapshot entry. Failures read as missing.
    pub(crate) fn restore<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        snapshot::load_json(self.snapshots.as_ref(), key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Failed to read snapshot");
            None
        })
    }

    /// Delete a snapshot entry. Failures are logged.
    pub(crate) fn forget(&self, key: &str) {
        if let Err(e) = self.snapshots.remove(key) {
            warn!(key, error = %e, "Failed to remove snapshot");
        }
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext").finish_non_exhaustive()
    }
}

/// Lock-protected [`EntityState`] shared by the concrete stores.
///
/// `epoch` advances on every `clear_local`. Results of requests started in an
/// earlier epoch are dropped, so a response that lands after logout never
/// repopulates memory or the snapshot.
#[derive(Debug)]
pub(crate) struct Collection<T> {
    state: RwLock<EntityState<T>>,
    epoch: AtomicU64,
}

impl<T: Clone> Collection<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(EntityState::default()),
            epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EntityState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EntityState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session epoch; capture before issuing a request.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.read().items.clone()
    }

    pub(crate) fn status(&self) -> StoreStatus {
        self.read().status
    }

    pub(crate) fn set_status(&self, status: StoreStatus) {
        self.write().status = status;
    }

    /// Load the snapshot into memory if this store has never been hydrated.
    ///
    /// Returns whether a snapshot was applied.
    pub(crate) fn hydrate(&self, ctx: &StoreContext, key: &str) -> bool
    where
        T: DeserializeOwned,
    {
        {
            let mut state = self.write();
            if state.status != StoreStatus::Uninitialized {
                return false;
            }
            state.status = StoreStatus::Hydrating;
        }

        let restored: Option<Vec<T>> = ctx.restore(key);
        let mut state = self.write();
        let applied = match restored {
            Some(items) if state.items.is_empty() => {
                state.items = items;
                true
            }
            _ => false,
        };
        state.status = StoreStatus::Ready;
        applied
    }

    /// Begin a fetch; hydrates first on a cold store.
    ///
    /// Returns the epoch the fetch belongs to.
    pub(crate) fn begin_sync(&self, ctx: &StoreContext, key: &str) -> u64
    where
        T: DeserializeOwned,
    {
        let epoch = self.epoch();
        self.hydrate(ctx, key);
        self.set_status(StoreStatus::Syncing);
        epoch
    }

    /// Apply server truth and persist it.
    ///
    /// Returns `false` and changes nothing if the store was cleared since
    /// `epoch`.
    pub(crate) fn finish_sync(&self, ctx: &StoreContext, key: &str, epoch: u64, items: Vec<T>) -> bool
    where
        T: Serialize,
    {
        let mut state = self.write();
        if self.epoch() != epoch {
            debug!(key, "Discarding fetch from an ended session");
            return false;
        }
        ctx.persist(key, &items);
        state.items = items;
        state.status = StoreStatus::Ready;
        true
    }

    /// Keep prior state after a failed fetch, restoring the snapshot if
    /// memory is empty.
    ///
    /// Returns whether the snapshot was applied.
    pub(crate) fn fail_sync(&self, ctx: &StoreContext, key: &str, epoch: u64) -> bool
    where
        T: DeserializeOwned,
    {
        let needs_snapshot = self.read().items.is_empty();
        let restored: Option<Vec<T>> = if needs_snapshot { ctx.restore(key) } else { None };

        let mut state = self.write();
        if self.epoch() != epoch {
            return false;
        }
        let applied = match restored {
            Some(items) if state.items.is_empty() => {
                state.items = items;
                true
            }
            _ => false,
        };
        state.status = StoreStatus::Ready;
        applied
    }

    /// Mutate memory and mirror the result to the snapshot.
    ///
    /// Returns `false` without applying `f` if the store was cleared since
    /// `epoch`.
    pub(crate) fn update(
        &self,
        ctx: &StoreContext,
        key: &str,
        epoch: u64,
        f: impl FnOnce(&mut Vec<T>),
    ) -> bool
    where
        T: Serialize,
    {
        let mut state = self.write();
        if self.epoch() != epoch {
            debug!(key, "Discarding mutation from an ended session");
            return false;
        }
        f(&mut state.items);
        ctx.persist(key, &state.items);
        true
    }

    /// Empty memory, delete the snapshot and start a new epoch.
    pub(crate) fn clear_local(&self, ctx: &StoreContext, key: &str) {
        let mut state = self.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        state.items.clear();
        state.status = StoreStatus::Uninitialized;
        ctx.forget(key);
    }
}
