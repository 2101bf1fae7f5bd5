//! # Domain Types
//!
//! Catalog records and header types shared by the engine and the session.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Catalog Records (read-only)                     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Material     │   │   Operation     │   │  MarkupProfile  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id, name       │       │
//! │  │  name           │   │  name           │   │  taxes, admin   │       │
//! │  │  price          │   │  hourly_rate    │   │  commission ... │       │
//! │  │  unit           │   │  kind           │   │  profit         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ProductPriceInfo │   │  OperationKind  │   │   Percentage    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_code   │   │  Normal         │   │  points (f64)   │       │
//! │  │  list_price     │   │  Injection      │   │  14.0 = 14%     │       │
//! │  │  average_price  │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Catalog records have a store `id`; sheet lines additionally have their own
//! `RowId` (see [`crate::sheet`]) because one catalog item can appear on
//! several rows of the same sheet.

use serde::{Deserialize, Serialize};
use std::ops::Add;
use ts_rs::TS;

use crate::amount::Amount;

// =============================================================================
// Percentage
// =============================================================================

/// A percentage expressed in percentage points.
///
/// `Percentage::from_points(14.0)` is 14%. Markup components, the load factor
/// and the substitution-tax surcharge all use this type.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Percentage(f64);

impl Percentage {
    /// Creates a percentage from percentage points.
    #[inline]
    pub const fn from_points(points: f64) -> Self {
        Percentage(points)
    }

    /// Returns the value in percentage points.
    #[inline]
    pub const fn points(&self) -> f64 {
        self.0
    }

    /// Returns the value as a fraction (14% → 0.14).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0.0)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

impl Add for Percentage {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Percentage(self.0 + other.0)
    }
}

// =============================================================================
// Catalog: Material
// =============================================================================

/// A raw material or purchased component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Material {
    /// Catalog identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Price per `unit`.
    pub price: Amount,

    /// Unit of measure (kg, un, m, ...).
    pub unit: String,
}

// =============================================================================
// Catalog: Operation
// =============================================================================

/// How an operation is costed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OperationKind {
    /// Flat labor/machine operation: rate per hour ÷ units per hour.
    Normal,
    /// Injection molding: rate per hour, cycle time and cavity count.
    Injection,
}

impl Default for OperationKind {
    fn default() -> Self {
        OperationKind::Normal
    }
}

/// A labor or machine operation. Normal and injection operations share one
/// catalog; `kind` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Operation {
    pub id: String,
    pub name: String,

    /// Labor/machine cost per hour.
    pub hourly_rate: Amount,

    /// Unit label shown next to the rate.
    pub unit: String,

    pub kind: OperationKind,
}

// =============================================================================
// Catalog: Markup Profile
// =============================================================================

/// A named stack of overhead and profit percentages.
///
/// ## Coefficient
/// ```text
/// load factor = taxes + admin + commission + freight + financial
///             + marketing + promoters + bonus + profit
///
/// coefficient = 100 / (100 - load factor)     (load factor < 100 only)
///
/// Example: load 30%  →  100 / 70  =  1.428571...
/// ```
/// The coefficient is always derived here, never read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MarkupProfile {
    pub id: String,
    pub name: String,
    pub taxes: Percentage,
    pub admin: Percentage,
    pub commission: Percentage,
    pub freight: Percentage,
    pub financial: Percentage,
    pub marketing: Percentage,
    pub promoters: Percentage,
    pub bonus: Percentage,
    pub profit: Percentage,
}

impl MarkupProfile {
    /// The nine components in display order, labelled.
    pub fn components(&self) -> [(&'static str, Percentage); 9] {
        [
            ("taxes", self.taxes),
            ("admin", self.admin),
            ("commission", self.commission),
            ("freight", self.freight),
            ("financial", self.financial),
            ("marketing", self.marketing),
            ("promoters", self.promoters),
            ("bonus", self.bonus),
            ("profit", self.profit),
        ]
    }

    /// Sum of all nine components (the "encargos").
    pub fn load_factor(&self) -> Percentage {
        self.components()
            .iter()
            .fold(Percentage::zero(), |acc, (_, pct)| acc + *pct)
    }
}

// =============================================================================
// Catalog: Product Price Info
// =============================================================================

/// Sales price history for one product, keyed by product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPriceInfo {
    pub id: String,

    /// Business key matching `SheetHeader::product_code`.
    pub product_code: String,

    pub name: String,

    /// Current table (list) price per unit.
    pub list_price: Amount,

    /// Average price actually realized per unit.
    pub average_sold_price: Amount,
}

// =============================================================================
// Sheet Header
// =============================================================================

/// Header of a cost sheet.
///
/// ## Flags
/// - `produced`: the product is manufactured in-house (informational)
/// - `substitution_tax`: applies the substitution-tax surcharge to total cost
/// - `secondary_substitution`: product is itself subject to substitution tax
///   (informational, carried to the payload)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SheetHeader {
    /// Product code; also the key for price info lookup.
    pub product_code: String,

    /// Product name.
    pub name: String,

    /// Sales unit (un, cx, pct, ...).
    pub unit: String,

    /// Quantity produced per batch. Drives unit cost, injection line totals
    /// and revenues.
    pub produced_qty: f64,

    pub produced: bool,
    pub substitution_tax: bool,
    pub secondary_substitution: bool,
}

impl SheetHeader {
    /// Creates a blank header.
    pub fn blank() -> Self {
        SheetHeader::default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
