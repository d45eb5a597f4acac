//! Persistence gateway for prices, price history and observer identities.
//!
//! The rest of the workspace talks to storage only through [`PriceStore`], a
//! narrow key/value + list + set contract modelled on a Redis-style server.
//! Two backends are provided:
//!
//!  - [`InMemoryStore`] for tests and throwaway runs (supports fault injection)
//!  - [`SqliteStore`] for durable storage through sqlx

pub mod error;
pub mod keys;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;

pub use error::{GatewayError, GatewayResult};
pub use memory::{InMemoryStore, StoreOp};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Returns `None` when the key has never been written.
    async fn get_scalar(&self, key: &str) -> GatewayResult<Option<String>>;

    /// Overwrites any previous value.
    async fn set_scalar(&self, key: &str, value: &str) -> GatewayResult<()>;

    /// Appends to the tail of the list at `key`, creating it if needed.
    async fn append_to_list(&self, key: &str, value: &str) -> GatewayResult<()>;

    /// Inclusive range in append order. Negative indices count from the end,
    /// so `(0, -1)` is the whole list.
    async fn range_list(&self, key: &str, start: i64, end: i64) -> GatewayResult<Vec<String>>;

    /// Returns `true` if the member was not already present.
    async fn add_to_set(&self, key: &str, member: &str) -> GatewayResult<bool>;

    /// Returns `true` if the member was present.
    async fn remove_from_set(&self, key: &str, member: &str) -> GatewayResult<bool>;

    /// Members in ascending order.
    async fn list_set_members(&self, key: &str) -> GatewayResult<Vec<String>>;

    /// Upserts the given fields of the hash record at `key`.
    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> GatewayResult<()>;

    /// Empty map when the record does not exist.
    async fn get_fields(&self, key: &str) -> GatewayResult<HashMap<String, String>>;
}
