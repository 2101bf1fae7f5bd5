//! # Catalog Source
//!
//! Read-only access to the externally owned catalogs: materials, operations
//! (normal and injection share one store), markup profiles and product price
//! info.
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────────────────┐
//! │  CostSheetSession│──────► │  dyn CatalogSource           │
//! │                  │ async  │  ├── InMemoryCatalog (here)  │
//! │                  │ lookup │  └── HTTP/DB adapters (ext.) │
//! └──────────────────┘        └──────────────────────────────┘
//! ```
//!
//! `Ok(None)` means "no such record"; `Err` means the backend failed.

use async_trait::async_trait;
use costing_core::{Material, MarkupProfile, Operation, ProductPriceInfo};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::SessionResult;

/// Async catalog reads.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn material_by_id(&self, id: &str) -> SessionResult<Option<Material>>;

    /// Exact, case-insensitive name match.
    async fn material_by_name(&self, name: &str) -> SessionResult<Option<Material>>;

    async fn operation_by_id(&self, id: &str) -> SessionResult<Option<Operation>>;

    /// Exact, case-insensitive name match.
    async fn operation_by_name(&self, name: &str) -> SessionResult<Option<Operation>>;

    async fn markup_profile_by_id(&self, id: &str) -> SessionResult<Option<MarkupProfile>>;

    async fn price_info_by_product_code(&self, code: &str) -> SessionResult<Option<ProductPriceInfo>>;
}

// =============================================================================
// In-Memory Catalog
// =============================================================================

#[derive(Debug, Default)]
struct CatalogData {
    materials: HashMap<String, Material>,
    operations: HashMap<String, Operation>,
    markup_profiles: HashMap<String, MarkupProfile>,
    price_info: HashMap<String, ProductPriceInfo>,
}

/// Catalog held in memory, for tests and for embedders that preload data.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_material(&self, material: Material) {
        self.data
            .write()
            .await
            .materials
            .insert(material.id.clone(), material);
    }

    pub async fn insert_operation(&self, operation: Operation) {
        self.data
            .write()
            .await
            .operations
            .insert(operation.id.clone(), operation);
    }

    pub async fn insert_markup_profile(&self, profile: MarkupProfile) {
        self.data
            .write()
            .await
            .markup_profiles
            .insert(profile.id.clone(), profile);
    }

    /// Price info is keyed by product code.
    pub async fn insert_price_info(&self, info: ProductPriceInfo) {
        self.data
            .write()
            .await
            .price_info
            .insert(info.product_code.clone(), info);
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn material_by_id(&self, id: &str) -> SessionResult<Option<Material>> {
        Ok(self.data.read().await.materials.get(id).cloned())
    }

    async fn material_by_name(&self, name: &str) -> SessionResult<Option<Material>> {
        let data = self.data.read().await;
        Ok(data
            .materials
            .values()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn operation_by_id(&self, id: &str) -> SessionResult<Option<Operation>> {
        Ok(self.data.read().await.operations.get(id).cloned())
    }

    async fn operation_by_name(&self, name: &str) -> SessionResult<Option<Operation>> {
        let data = self.data.read().await;
        Ok(data
            .operations
            .values()
            .find(|o| o.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn markup_profile_by_id(&self, id: &str) -> SessionResult<Option<MarkupProfile>> {
        Ok(self.data.read().await.markup_profiles.get(id).cloned())
    }

    async fn price_info_by_product_code(&self, code: &str) -> SessionResult<Option<ProductPriceInfo>> {
        Ok(self.data.read().await.price_info.get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costing_core::{Amount, OperationKind};

    #[tokio::test]
    async fn test_material_lookup_by_id_and_name() {
        let catalog = InMemoryCatalog::new();
        catalog
            .insert_material(Material {
                id: "m-1".to_string(),
                name: "Polipropileno".to_string(),
                price: Amount::new(10.5),
                unit: "kg".to_string(),
            })
            .await;

        assert!(catalog.material_by_id("m-1").await.unwrap().is_some());
        assert!(catalog.material_by_id("m-2").await.unwrap().is_none());

        let by_name = catalog.material_by_name(" polipropileno ").await.unwrap();
        assert_eq!(by_name.map(|m| m.id), Some("m-1".to_string()));
    }

    #[tokio::test]
    async fn test_operations_share_one_store() {
        let catalog = InMemoryCatalog::new();
        for (id, kind) in [("op-1", OperationKind::Normal), ("op-2", OperationKind::Injection)] {
            catalog
                .insert_operation(Operation {
                    id: id.to_string(),
                    name: format!("Operation {}", id),
                    hourly_rate: Amount::new(120.0),
                    unit: "h".to_string(),
                    kind,
                })
                .await;
        }

        let injection = catalog.operation_by_id("op-2").await.unwrap().unwrap();
        assert_eq!(injection.kind, OperationKind::Injection);
        assert!(catalog.operation_by_name("operation op-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_price_info_keyed_by_product_code() {
        let catalog = InMemoryCatalog::new();
        catalog
            .insert_price_info(ProductPriceInfo {
                id: "pi-1".to_string(),
                product_code: "P-100".to_string(),
                name: "Tampa 28mm".to_string(),
                list_price: Amount::new(0.5),
                average_sold_price: Amount::new(0.45),
            })
            .await;

        assert!(catalog.price_info_by_product_code("P-100").await.unwrap().is_some());
        assert!(catalog.price_info_by_product_code("pi-1").await.unwrap().is_none());
    }
}
