use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::keys::resolve_range;
use crate::{GatewayError, GatewayResult, PriceStore};

/// Identifies a gateway operation, used for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetScalar,
    SetScalar,
    AppendToList,
    RangeList,
    AddToSet,
    RemoveFromSet,
    ListSetMembers,
    SetFields,
    GetFields,
}

#[derive(Default)]
struct Tables {
    scalars: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// Process-local store. Nothing survives a restart.
///
/// Operations can be made to fail on demand with [`InMemoryStore::fail_on`],
/// which lets callers exercise their error policies without a real backend.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashSet<StoreOp>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call of `op` returns [`GatewayError::Unavailable`].
    pub fn fail_on(&self, op: StoreOp) {
        self.faults.lock().insert(op);
    }

    pub fn heal(&self, op: StoreOp) {
        self.faults.lock().remove(&op);
    }

    /// Number of times `op` was invoked, including failed invocations.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Synchronous peek, usable from inside observer callbacks.
    pub fn scalar(&self, key: &str) -> Option<String> {
        self.tables.lock().scalars.get(key).cloned()
    }

    /// Synchronous peek at a whole list.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.tables
            .lock()
            .lists
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, op: StoreOp, key: &str) -> GatewayResult<()> {
        *self.calls.lock().entry(op).or_default() += 1;

        if self.faults.lock().contains(&op) {
            debug!(?op, key, "injected store fault");
            return Err(GatewayError::Unavailable(format!("{op:?} on {key}")));
        }

        Ok(())
    }
}

#[async_trait]
impl PriceStore for InMemoryStore {
    async fn get_scalar(&self, key: &str) -> GatewayResult<Option<String>> {
        self.enter(StoreOp::GetScalar, key)?;
        Ok(self.tables.lock().scalars.get(key).cloned())
    }

    async fn set_scalar(&self, key: &str, value: &str) -> GatewayResult<()> {
        self.enter(StoreOp::SetScalar, key)?;
        self.tables
            .lock()
            .scalars
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn append_to_list(&self, key: &str, value: &str) -> GatewayResult<()> {
        self.enter(StoreOp::AppendToList, key)?;
        self.tables
            .lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn range_list(&self, key: &str, start: i64, end: i64) -> GatewayResult<Vec<String>> {
        self.enter(StoreOp::RangeList, key)?;
        let tables = self.tables.lock();

        let Some(list) = tables.lists.get(key) else {
            return Ok(Vec::new());
        };

        Ok(resolve_range(list.len(), start, end)
            .map(|r| list[r].to_vec())
            .unwrap_or_default())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> GatewayResult<bool> {
        self.enter(StoreOp::AddToSet, key)?;
        Ok(self
            .tables
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> GatewayResult<bool> {
        self.enter(StoreOp::RemoveFromSet, key)?;
        Ok(self
            .tables
            .lock()
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    async fn list_set_members(&self, key: &str) -> GatewayResult<Vec<String>> {
        self.enter(StoreOp::ListSetMembers, key)?;
        Ok(self
            .tables
            .lock()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> GatewayResult<()> {
        self.enter(StoreOp::SetFields, key)?;
        let mut tables = self.tables.lock();
        let record = tables.hashes.entry(key.to_string()).or_default();

        for (field, value) in fields {
            record.insert((*field).to_string(), value.clone());
        }

        Ok(())
    }

    async fn get_fields(&self, key: &str) -> GatewayResult<HashMap<String, String>> {
        self.enter(StoreOp::GetFields, key)?;
        Ok(self
            .tables
            .lock()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scalar_overwrite_keeps_latest_value() {
        let store = InMemoryStore::new();

        assert_eq!(store.get_scalar("stock:A").await.unwrap(), None);

        store.set_scalar("stock:A", "1.00").await.unwrap();
        store.set_scalar("stock:A", "2.00").await.unwrap();

        assert_eq!(
            store.get_scalar("stock:A").await.unwrap().as_deref(),
            Some("2.00")
        );
    }

    #[tokio::test]
    async fn injected_fault_fails_only_that_operation() {
        let store = InMemoryStore::new();
        store.fail_on(StoreOp::SetScalar);

        let err = store.set_scalar("k", "v").await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));

        // Other operations still work.
        store.append_to_list("l", "x").await.unwrap();
        assert_eq!(store.list("l"), vec!["x".to_string()]);

        store.heal(StoreOp::SetScalar);
        store.set_scalar("k", "v").await.unwrap();

        assert_eq!(store.call_count(StoreOp::SetScalar), 2);
        assert_eq!(store.scalar("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn set_add_and_remove_report_membership_changes() {
        let store = InMemoryStore::new();

        assert!(store.add_to_set("observers", "b").await.unwrap());
        assert!(store.add_to_set("observers", "a").await.unwrap());
        assert!(!store.add_to_set("observers", "a").await.unwrap());

        assert_eq!(
            store.list_set_members("observers").await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        assert!(store.remove_from_set("observers", "a").await.unwrap());
        assert!(!store.remove_from_set("observers", "a").await.unwrap());
        assert!(!store.remove_from_set("missing", "a").await.unwrap());
    }

    #[tokio::test]
    async fn range_list_returns_append_order() {
        let store = InMemoryStore::new();
        for v in ["1", "2", "3", "4"] {
            store.append_to_list("h", v).await.unwrap();
        }

        assert_eq!(store.range_list("h", 0, -1).await.unwrap(), ["1", "2", "3", "4"]);
        assert_eq!(store.range_list("h", -2, -1).await.unwrap(), ["3", "4"]);
        assert!(store.range_list("nope", 0, -1).await.unwrap().is_empty());
    }
}
