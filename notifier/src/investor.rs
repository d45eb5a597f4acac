//! Investors: the application's concrete observer, plus their records in the
//! store (`investor:<id>` hash, `investors` id set).

use std::collections::HashMap;
use std::sync::Arc;

use store::PriceStore;
use store::keys::{INVESTORS_SET, investor_key};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{NotifierError, NotifierResult};
use crate::model::format_price;
use crate::observer::Observer;

#[derive(Debug, Clone, PartialEq)]
pub struct Investor {
    /// Six-digit identifier.
    pub id: String,
    pub name: String,
    /// Informational only; the subject applies its own global threshold.
    pub threshold: f64,
    pub kind: String,
}

impl Investor {
    pub fn new(name: impl Into<String>, threshold: f64, kind: impl Into<String>) -> Self {
        Self {
            id: generate_investor_id(),
            name: name.into(),
            threshold,
            kind: kind.into(),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("threshold", self.threshold.to_string()),
            ("type", self.kind.clone()),
        ]
    }

    fn from_fields(mut fields: HashMap<String, String>) -> Option<Self> {
        Some(Self {
            id: fields.remove("id")?,
            name: fields.remove("name").unwrap_or_default(),
            threshold: fields
                .get("threshold")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0.0),
            kind: fields.remove("type").unwrap_or_default(),
        })
    }
}

impl Observer for Investor {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_price_changed(&self, symbol: &str, new_price: f64) {
        info!(
            investor_id = %self.id,
            investor = %self.name,
            symbol,
            new_price = %format_price(new_price),
            "investor notified of price change"
        );
    }
}

/// `100000..=999999`, derived from a random uuid.
fn generate_investor_id() -> String {
    let n = 100_000 + (Uuid::new_v4().as_u128() % 900_000) as u32;
    format!("{n:06}")
}

/// Create / load / list investor records.
pub struct InvestorDirectory {
    store: Arc<dyn PriceStore>,
}

impl InvestorDirectory {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }

    /// Persists a new investor and adds its id to the `investors` set.
    #[instrument(skip(self), target = "investors")]
    pub async fn create(
        &self,
        name: &str,
        threshold: f64,
        kind: &str,
    ) -> NotifierResult<Investor> {
        let investor = Investor::new(name, threshold, kind);
        self.store
            .set_fields(&investor_key(&investor.id), &investor.to_fields())
            .await?;
        self.store.add_to_set(INVESTORS_SET, &investor.id).await?;

        info!(investor_id = %investor.id, "investor created");
        Ok(investor)
    }

    pub async fn load(&self, id: &str) -> NotifierResult<Investor> {
        let fields = self.store.get_fields(&investor_key(id)).await?;

        if fields.is_empty() {
            return Err(NotifierError::InvestorNotFound(id.to_string()));
        }

        Investor::from_fields(fields).ok_or_else(|| NotifierError::InvestorNotFound(id.to_string()))
    }

    /// Every investor in the `investors` set. Ids whose record cannot be loaded
    /// are logged and skipped.
    pub async fn list(&self) -> NotifierResult<Vec<Investor>> {
        let ids = self.store.list_set_members(INVESTORS_SET).await?;
        let mut out = Vec::with_capacity(ids.len());

        for id in ids {
            match self.load(&id).await {
                Ok(inv) => out.push(inv),
                Err(e) => warn!(investor_id = %id, error = %e, "failed to load investor"),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    #[test]
    fn generated_ids_are_six_digits() {
        for _ in 0..100 {
            let id = generate_investor_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert!(!id.starts_with('0'));
        }
    }

    #[tokio::test]
    async fn create_then_load_and_list() {
        let store = Arc::new(InMemoryStore::new());
        let dir = InvestorDirectory::new(store.clone());

        let a = dir.create("ada", 5.0, "retail").await.unwrap();
        let b = dir.create("bob", 2.5, "fund").await.unwrap();

        assert_eq!(dir.load(&a.id).await.unwrap(), a);

        let mut listed = dir.list().await.unwrap();
        listed.sort_by(|x, y| x.name.cmp(&y.name));
        assert_eq!(listed, vec![a, b]);
    }

    #[tokio::test]
    async fn load_unknown_investor_fails() {
        let dir = InvestorDirectory::new(Arc::new(InMemoryStore::new()));

        let err = dir.load("000000").await.unwrap_err();
        assert!(matches!(err, NotifierError::InvestorNotFound(id) if id == "000000"));
    }
}
