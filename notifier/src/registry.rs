use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use common::logger::warn_if_slow;
use parking_lot::RwLock;
use store::PriceStore;
use store::keys::OBSERVERS_SET;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{NotifierError, NotifierResult};
use crate::observer::{Observer, ObserverHandle};

/// In-memory set of subscribed observers, mirrored best-effort into the
/// store's `observers` set.
///
/// Guarantees:
/// - An identity appears at most once.
/// - Entries are weak: the caller owns the observer, and an observer dropped by
///   its owner simply stops being notified. Its identity may be registered again.
/// - Mutation takes the write lock, fan-out takes the read lock. The lock is
///   never held across store I/O.
///
/// The mirror is not updated atomically with memory: a `remove_id` racing a
/// `register` of the same identity can land between the in-memory insert and
/// the mirror write, leaving the id in the store set after it was removed.
/// Readers of `observers` must treat it as a hint.
pub struct ObserverRegistry {
    observers: RwLock<HashMap<String, Weak<dyn Observer>>>,
    store: Arc<dyn PriceStore>,
    slow_after: Duration,
}

impl ObserverRegistry {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            store,
            slow_after: Duration::from_millis(100),
        }
    }

    /// Store calls slower than this are logged.
    pub fn with_slow_threshold(mut self, slow_after: Duration) -> Self {
        self.slow_after = slow_after;
        self
    }

    /// Live observers only; entries whose owner dropped them are not counted.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.observers
            .read()
            .get(id)
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Snapshot of live identities, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .observers
            .read()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Identities currently present in the store mirror.
    pub async fn mirrored_ids(&self) -> NotifierResult<Vec<String>> {
        Ok(self.store.list_set_members(OBSERVERS_SET).await?)
    }

    /// Adds `observer` unless its identity is already taken by a live observer.
    /// A failure to mirror the identity into the store is logged and ignored.
    #[instrument(skip(self, observer), target = "registry", fields(observer_id = %observer.id()))]
    pub async fn register(&self, observer: &ObserverHandle) -> NotifierResult<()> {
        let id = observer.id().to_string();

        {
            let mut observers = self.observers.write();

            let before = observers.len();
            observers.retain(|_, w| w.strong_count() > 0);
            if observers.len() < before {
                debug!(pruned = before - observers.len(), "pruned dropped observers");
            }

            if observers.contains_key(&id) {
                warn!("registration rejected: identity already present");
                return Err(NotifierError::DuplicateObserver(id));
            }

            observers.insert(id.clone(), Arc::downgrade(observer));
        }

        let mirrored = warn_if_slow("mirror_add_observer", self.slow_after, async {
            self.store.add_to_set(OBSERVERS_SET, &id).await
        })
        .await;

        if let Err(e) = mirrored {
            warn!(error = %e, "failed to mirror observer id; kept in memory only");
        }

        info!(registered = self.len(), "observer registered");
        Ok(())
    }

    pub async fn remove(&self, observer: &dyn Observer) -> NotifierResult<bool> {
        self.remove_id(observer.id()).await
    }

    /// Removes `id` from memory and from the store mirror. Returns whether it was
    /// registered in memory.
    ///
    /// Removing an unknown identity is not an error, but the mirror cleanup is
    /// still attempted and its failure is returned in that case.
    #[instrument(skip(self), target = "registry")]
    pub async fn remove_id(&self, id: &str) -> NotifierResult<bool> {
        let was_present = self
            .observers
            .write()
            .remove(id)
            .is_some_and(|w| w.strong_count() > 0);

        if !was_present {
            debug!("identity not registered in memory; cleaning up mirror only");
        }

        let mirrored = warn_if_slow("mirror_remove_observer", self.slow_after, async {
            self.store.remove_from_set(OBSERVERS_SET, id).await
        })
        .await;

        match mirrored {
            Ok(_) => {}
            Err(e) if was_present => {
                warn!(error = %e, "failed to remove observer id from mirror");
            }
            Err(e) => {
                error!(error = %e, "mirror cleanup failed for unregistered observer");
                return Err(e.into());
            }
        }

        info!(was_present, registered = self.len(), "observer removed");
        Ok(was_present)
    }

    /// Calls every live observer. Returns how many returned normally.
    ///
    /// Runs under the read lock, so concurrent fan-outs do not serialise but
    /// registration changes wait. A panicking observer is logged and skipped.
    pub fn notify_all(&self, symbol: &str, new_price: f64) -> usize {
        let observers = self.observers.read();
        let mut delivered = 0;

        for (id, weak) in observers.iter() {
            let Some(observer) = weak.upgrade() else {
                debug!(observer_id = %id, "skipping dropped observer");
                continue;
            };

            let result = catch_unwind(AssertUnwindSafe(|| {
                observer.on_price_changed(symbol, new_price);
            }));

            match result {
                Ok(()) => delivered += 1,
                Err(_) => error!(observer_id = %id, symbol, "observer panicked during notification"),
            }
        }

        delivered
    }
}
