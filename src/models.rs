use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------- Input (wire) types: what the market feed and demand editor hand us ----------

/// One raw listing as supplied by the market feed, after external filtering
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListingRecord {
    pub item_id: String,
    pub seller_id: String,
    pub unit_price: u64,
    pub stock_qty: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<u64>,
    /// Marketplace product id, carried through to the plan for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DemandItem {
    pub item_id: String,
    pub required_qty: u64,
}

/// How one shipping cost per seller is chosen when listings disagree
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShippingResolution {
    #[default]
    Max,
    Min,
    First,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DemandConfig {
    pub items: Vec<DemandItem>,
    pub default_shipping_cost: u64,
    #[serde(default)]
    pub min_purchase_per_seller: u64,
    #[serde(default)]
    pub shipping_resolution: ShippingResolution,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    Exact,
    Heuristic,
}

/// POST /optimize body
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OptimizeRequest {
    pub listings: Vec<ListingRecord>,
    pub demand: DemandConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
}

// ---------- Output (wire) types: the plan contract consumed by reporting ----------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlanItemDocument {
    pub item_id: String,
    pub quantity: u64,
    pub unit_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SellerDocument {
    pub items: Vec<PlanItemDocument>,
    pub item_subtotal: u64,
    pub shipping_cost: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlanSummary {
    pub total_item_cost: u64,
    pub total_shipping_cost: u64,
    pub grand_total: u64,
    pub seller_count: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SolverDocument {
    pub strategy: String,
    pub iterations: u64,
    pub proven_optimal: bool,
    /// Solve time spent on this reply; 0 when served from the plan cache
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlanDocument {
    pub sellers: BTreeMap<String, SellerDocument>,
    pub summary: PlanSummary,
    pub solver: SolverDocument,
}
