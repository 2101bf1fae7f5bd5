//! # Catalog Cache
//!
//! Per-session store of catalog records already resolved. A cache hit
//! resolves a selection without a lookup. Nothing here is shared between
//! sessions.

use costing_core::{Material, MarkupProfile, Operation, ProductPriceInfo};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CatalogCache {
    materials: HashMap<String, Material>,
    operations: HashMap<String, Operation>,
    markup_profiles: HashMap<String, MarkupProfile>,
    /// Keyed by product code.
    price_info: HashMap<String, ProductPriceInfo>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(&self, id: &str) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn markup_profile(&self, id: &str) -> Option<&MarkupProfile> {
        self.markup_profiles.get(id)
    }

    pub fn price_info(&self, product_code: &str) -> Option<&ProductPriceInfo> {
        self.price_info.get(product_code)
    }

    pub fn insert_material(&mut self, material: Material) {
        self.materials.insert(material.id.clone(), material);
    }

    pub fn insert_operation(&mut self, operation: Operation) {
        self.operations.insert(operation.id.clone(), operation);
    }

    pub fn insert_markup_profile(&mut self, profile: MarkupProfile) {
        self.markup_profiles.insert(profile.id.clone(), profile);
    }

    pub fn insert_price_info(&mut self, info: ProductPriceInfo) {
        self.price_info.insert(info.product_code.clone(), info);
    }

    /// Total number of cached records.
    pub fn len(&self) -> usize {
        self.materials.len()
            + self.operations.len()
            + self.markup_profiles.len()
            + self.price_info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.materials.clear();
        self.operations.clear();
        self.markup_profiles.clear();
        self.price_info.clear();
    }
}
