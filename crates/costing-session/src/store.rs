//! # Cost Store
//!
//! The one-shot "create cost" write. Updating a stored cost is not supported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costing_core::CreateCostPayload;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};

/// Persists submitted cost sheets.
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Stores the payload and returns the store-assigned id.
    async fn create_cost(&self, payload: &CreateCostPayload) -> SessionResult<String>;
}

/// A payload accepted by [`InMemoryCostStore`].
#[derive(Debug, Clone)]
pub struct StoredCost {
    pub id: String,
    pub payload: CreateCostPayload,
    /// The JSON document as it would go over the wire.
    pub document: Value,
    pub stored_at: DateTime<Utc>,
}

/// Cost store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCostStore {
    costs: RwLock<Vec<StoredCost>>,
}

impl InMemoryCostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn costs(&self) -> Vec<StoredCost> {
        self.costs.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<StoredCost> {
        self.costs.read().await.iter().find(|c| c.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.costs.read().await.len()
    }
}

#[async_trait]
impl CostStore for InMemoryCostStore {
    async fn create_cost(&self, payload: &CreateCostPayload) -> SessionResult<String> {
        let document =
            serde_json::to_value(payload).map_err(|e| SessionError::StoreFailed(e.to_string()))?;
        let id = Uuid::new_v4().to_string();
        self.costs.write().await.push(StoredCost {
            id: id.clone(),
            payload: payload.clone(),
            document,
            stored_at: Utc::now(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costing_core::{DerivedTotals, SheetHeader};

    fn payload(code: &str) -> CreateCostPayload {
        CreateCostPayload {
            header: SheetHeader {
                product_code: code.to_string(),
                name: "Tampa 28mm".to_string(),
                produced_qty: 100.0,
                ..SheetHeader::default()
            },
            materials: Vec::new(),
            normal_operations: Vec::new(),
            injection_operations: Vec::new(),
            markup_profile_id: "mk-1".to_string(),
            list_price: costing_core::Amount::new(3.5),
            average_sold_price: costing_core::Amount::new(3.0),
            totals: DerivedTotals::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = InMemoryCostStore::new();
        let first = store.create_cost(&payload("P-100")).await.unwrap();
        let second = store.create_cost(&payload("P-200")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.get(&second).await.map(|c| c.payload.header.product_code),
            Some("P-200".to_string())
        );
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_document_uses_wire_names() {
        let store = InMemoryCostStore::new();
        let id = store.create_cost(&payload("P-100")).await.unwrap();

        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.document["markupProfileId"], "mk-1");
        assert_eq!(stored.document["listPrice"], 3.5);
        assert_eq!(stored.document["header"]["productCode"], "P-100");
    }
}
