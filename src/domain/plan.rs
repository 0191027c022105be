//! Plan assembler: turns a strategy's raw allocations into a seller-grouped plan and
//! re-verifies it against the model before anything is emitted.

use std::collections::BTreeMap;
use std::time::Duration;

use log::{error, info};

use crate::domain::model::Model;
use crate::domain::strategy::PurchaseResult;
use crate::error::{Result, SourcingError, Violation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLine {
    pub item_id: String,
    /// Catalog index of the listing bought from
    pub listing: usize,
    pub listing_id: Option<String>,
    pub product_name: Option<String>,
    pub quantity: u64,
    pub unit_price: u64,
}

impl PlanLine {
    pub fn subtotal(&self) -> u64 {
        self.quantity.saturating_mul(self.unit_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerOrder {
    pub seller_id: String,
    pub lines: Vec<PlanLine>,
    pub item_subtotal: u64,
    pub shipping_cost: u64,
}

/// How the plan was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub strategy: String,
    pub iterations: u64,
    pub elapsed: Duration,
    pub proven_optimal: bool,
}

/// Verified purchase plan. Orders are sorted by seller id.
#[derive(Debug, Clone)]
pub struct PurchasePlan {
    orders: Vec<SellerOrder>,
    total_item_cost: u64,
    total_shipping_cost: u64,
    grand_total: u64,
    diagnostics: RunDiagnostics,
}

impl PurchasePlan {
    pub fn orders(&self) -> &[SellerOrder] {
        &self.orders
    }

    pub fn order(&self, seller_id: &str) -> Option<&SellerOrder> {
        self.orders.iter().find(|o| o.seller_id == seller_id)
    }

    pub fn total_item_cost(&self) -> u64 {
        self.total_item_cost
    }

    pub fn total_shipping_cost(&self) -> u64 {
        self.total_shipping_cost
    }

    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }

    pub fn seller_count(&self) -> usize {
        self.orders.len()
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    /// Units of `item_id` bought across all sellers
    pub fn quantity_of(&self, item_id: &str) -> u64 {
        self.orders
            .iter()
            .flat_map(|o| &o.lines)
            .filter(|l| l.item_id == item_id)
            .map(|l| l.quantity)
            .sum()
    }
}

/// Build the plan for `result`, failing with `ModelViolation` if the allocations break
/// demand, stock or minimum purchase, or if the strategy's total disagrees with the
/// recomputed grand total.
pub fn assemble(model: &Model, result: &PurchaseResult) -> Result<PurchasePlan> {
    let mut violations = Vec::new();

    let mut per_listing: BTreeMap<usize, u64> = BTreeMap::new();
    for allocation in &result.allocations {
        if allocation.quantity == 0 {
            continue;
        }
        if model.item_of(allocation.listing).is_none() {
            violations.push(Violation::UnknownListing {
                index: allocation.listing,
            });
            continue;
        }
        let merged = per_listing.entry(allocation.listing).or_default();
        *merged = merged.saturating_add(allocation.quantity);
    }

    let mut allocated = vec![0u64; model.items().len()];
    let mut by_seller: BTreeMap<&str, SellerOrder> = BTreeMap::new();

    for (&idx, &quantity) in &per_listing {
        let listing = model.listing(idx);
        let seller = model.seller(listing.seller);

        if quantity > listing.stock_qty {
            violations.push(Violation::StockExceeded {
                item_id: listing.item_id.clone(),
                seller_id: seller.id.clone(),
                quantity,
                stock: listing.stock_qty,
            });
        }
        if let Some(item) = model.item_of(idx) {
            allocated[item] = allocated[item].saturating_add(quantity);
        }

        let order = by_seller.entry(seller.id.as_str()).or_insert_with(|| SellerOrder {
            seller_id: seller.id.clone(),
            lines: Vec::new(),
            item_subtotal: 0,
            shipping_cost: seller.shipping_cost,
        });
        let line = PlanLine {
            item_id: listing.item_id.clone(),
            listing: idx,
            listing_id: listing.listing_id.clone(),
            product_name: listing.product_name.clone(),
            quantity,
            unit_price: listing.unit_price,
        };
        order.item_subtotal = order.item_subtotal.saturating_add(line.subtotal());
        order.lines.push(line);
    }

    for (entry, &got) in model.items().iter().zip(&allocated) {
        if got != entry.required_qty {
            violations.push(Violation::DemandMismatch {
                item_id: entry.item_id.clone(),
                required: entry.required_qty,
                allocated: got,
            });
        }
    }

    let policy = model.policy();
    if policy.enforces_min_purchase() {
        for order in by_seller.values() {
            if order.item_subtotal < policy.min_purchase_per_seller {
                violations.push(Violation::BelowMinimumPurchase {
                    seller_id: order.seller_id.clone(),
                    subtotal: order.item_subtotal,
                    threshold: policy.min_purchase_per_seller,
                });
            }
        }
    }

    let orders: Vec<SellerOrder> = by_seller.into_values().collect();
    let total_item_cost = orders.iter().map(|o| o.item_subtotal).fold(0u64, u64::saturating_add);
    let total_shipping_cost = orders.iter().map(|o| o.shipping_cost).fold(0u64, u64::saturating_add);
    let grand_total = total_item_cost.saturating_add(total_shipping_cost);

    if grand_total != result.total_cost {
        violations.push(Violation::TotalMismatch {
            reported: result.total_cost,
            recomputed: grand_total,
        });
    }

    if !violations.is_empty() {
        for violation in &violations {
            error!("{} plan rejected: {}", result.strategy, violation);
        }
        return Err(SourcingError::ModelViolation { violations });
    }

    info!(
        "plan: {} sellers, items {}, shipping {}, grand total {}",
        orders.len(),
        total_item_cost,
        total_shipping_cost,
        grand_total
    );

    Ok(PurchasePlan {
        orders,
        total_item_cost,
        total_shipping_cost,
        grand_total,
        diagnostics: RunDiagnostics {
            strategy: result.strategy.clone(),
            iterations: result.iterations,
            elapsed: result.elapsed,
            proven_optimal: result.proven_optimal,
        },
    })
}
