//! Constraint model shared by every sourcing strategy.
//!
//! The model owns the catalog, demand and policy for one run and indexes the
//! catalog twice: listings per demanded item and listings per seller. Strategies
//! walk these indices instead of rescanning the catalog.

use std::collections::HashMap;

use log::{debug, info};

use crate::domain::catalog::{Catalog, Listing, Seller};
use crate::domain::demand::{DemandEntry, DemandSet, Policy};
use crate::error::{Result, SourcingError};

/// Upper bound on the cost of buying every candidate listing's whole stock plus
/// every candidate seller's shipping. Keeps all plan arithmetic in range.
pub const MAX_PLAN_COST: u64 = i64::MAX as u64;

#[derive(Debug, Clone)]
pub struct Model {
    catalog: Catalog,
    demand: DemandSet,
    policy: Policy,
    /// demand position -> listing indices, catalog order
    item_index: Vec<Vec<usize>>,
    /// seller index -> listing indices of demanded items, catalog order
    seller_index: Vec<Vec<usize>>,
    /// listing index -> demand position, `None` for listings of undemanded items
    listing_item: Vec<Option<usize>>,
}

impl Model {
    /// Index the catalog and fail fast if any item's aggregate stock is below demand.
    pub fn build(catalog: Catalog, demand: DemandSet, policy: Policy) -> Result<Self> {
        let positions: HashMap<&str, usize> = demand
            .entries()
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.item_id.as_str(), pos))
            .collect();

        let mut item_index: Vec<Vec<usize>> = vec![Vec::new(); demand.len()];
        let mut seller_index: Vec<Vec<usize>> = vec![Vec::new(); catalog.sellers().len()];
        let mut listing_item: Vec<Option<usize>> = Vec::with_capacity(catalog.listings().len());

        for (idx, listing) in catalog.listings().iter().enumerate() {
            let pos = positions.get(listing.item_id.as_str()).copied();
            if let Some(pos) = pos {
                item_index[pos].push(idx);
                seller_index[listing.seller].push(idx);
            }
            listing_item.push(pos);
        }

        for (entry, listings) in demand.entries().iter().zip(&item_index) {
            let available = listings
                .iter()
                .map(|&idx| catalog.listings()[idx].stock_qty)
                .fold(0u64, u64::saturating_add);
            if available < entry.required_qty {
                return Err(SourcingError::InsufficientSupply {
                    item_id: entry.item_id.clone(),
                    required: entry.required_qty,
                    available,
                });
            }
            debug!(
                "item '{}': {} listings, {} available for {} required",
                entry.item_id,
                listings.len(),
                available,
                entry.required_qty
            );
        }

        let ceiling = cost_ceiling(&catalog, &item_index, &seller_index)?;
        debug!("cost ceiling over all candidate listings: {}", ceiling);

        let model = Model {
            catalog,
            demand,
            policy,
            item_index,
            seller_index,
            listing_item,
        };
        info!(
            "model built: {} items, {} candidate listings, {} candidate sellers",
            model.demand.len(),
            model.candidate_listing_count(),
            model.candidate_sellers().count()
        );
        Ok(model)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn demand(&self) -> &DemandSet {
        &self.demand
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn items(&self) -> &[DemandEntry] {
        self.demand.entries()
    }

    pub fn item_listings(&self, item: usize) -> &[usize] {
        &self.item_index[item]
    }

    pub fn seller_listings(&self, seller: usize) -> &[usize] {
        &self.seller_index[seller]
    }

    /// Demand position of the item a listing offers
    pub fn item_of(&self, listing: usize) -> Option<usize> {
        self.listing_item.get(listing).copied().flatten()
    }

    pub fn listing(&self, idx: usize) -> &Listing {
        &self.catalog.listings()[idx]
    }

    pub fn seller(&self, idx: usize) -> &Seller {
        self.catalog.seller(idx)
    }

    /// Sellers offering at least one demanded item
    pub fn candidate_sellers(&self) -> impl Iterator<Item = usize> + '_ {
        self.seller_index
            .iter()
            .enumerate()
            .filter(|(_, listings)| !listings.is_empty())
            .map(|(seller, _)| seller)
    }

    /// Listings offering a demanded item, in catalog order
    pub fn candidate_listings(&self) -> impl Iterator<Item = usize> + '_ {
        self.item_index.iter().flatten().copied()
    }

    pub fn candidate_listing_count(&self) -> usize {
        self.item_index.iter().map(Vec::len).sum()
    }
}

fn cost_ceiling(catalog: &Catalog, item_index: &[Vec<usize>], seller_index: &[Vec<usize>]) -> Result<u64> {
    let mut ceiling: u64 = 0;
    for &idx in item_index.iter().flatten() {
        let listing = &catalog.listings()[idx];
        ceiling = listing
            .unit_price
            .checked_mul(listing.stock_qty)
            .and_then(|spend| ceiling.checked_add(spend))
            .filter(|&total| total <= MAX_PLAN_COST)
            .ok_or_else(|| {
                SourcingError::InvalidInput(format!(
                    "listing #{} (item '{}', seller '{}'): price {} x stock {} exceeds the supported plan cost",
                    idx,
                    listing.item_id,
                    catalog.seller_of(listing).id,
                    listing.unit_price,
                    listing.stock_qty
                ))
            })?;
    }

    for (idx, listings) in seller_index.iter().enumerate() {
        if listings.is_empty() {
            continue;
        }
        let seller = catalog.seller(idx);
        ceiling = ceiling
            .checked_add(seller.shipping_cost)
            .filter(|&total| total <= MAX_PLAN_COST)
            .ok_or_else(|| {
                SourcingError::InvalidInput(format!(
                    "seller '{}': shipping cost {} exceeds the supported plan cost",
                    seller.id, seller.shipping_cost
                ))
            })?;
    }
    Ok(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingRecord, ShippingResolution};

    fn catalog(rows: &[(&str, &str, u64, u64)]) -> Catalog {
        let records = rows
            .iter()
            .map(|&(item, seller, price, stock)| ListingRecord {
                item_id: item.into(),
                seller_id: seller.into(),
                unit_price: price,
                stock_qty: stock,
                shipping_cost: Some(60),
                listing_id: None,
                product_name: None,
            })
            .collect();
        Catalog::build(records, 60, ShippingResolution::Max)
    }

    fn demand(items: &[(&str, u64)]) -> DemandSet {
        DemandSet::new(
            items
                .iter()
                .map(|&(id, qty)| DemandEntry { item_id: id.into(), required_qty: qty })
                .collect(),
        )
    }

    #[test]
    fn test_insufficient_supply_fails_before_solving() {
        let err = Model::build(
            catalog(&[("a", "s1", 10, 1), ("a", "s2", 12, 1)]),
            demand(&[("a", 3)]),
            Policy::default(),
        )
        .unwrap_err();
        match err {
            SourcingError::InsufficientSupply { item_id, required, available } => {
                assert_eq!(item_id, "a");
                assert_eq!(required, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_item_without_listings_reports_zero_available() {
        let err = Model::build(catalog(&[("a", "s1", 10, 5)]), demand(&[("b", 1)]), Policy::default())
            .unwrap_err();
        assert!(matches!(err, SourcingError::InsufficientSupply { available: 0, .. }));
    }

    #[test]
    fn test_indices_group_listings_by_item_and_seller() {
        let model = Model::build(
            catalog(&[
                ("a", "s1", 10, 5),
                ("b", "s2", 20, 5),
                ("a", "s2", 11, 5),
                ("z", "s3", 1, 5),
            ]),
            demand(&[("a", 2), ("b", 1)]),
            Policy::default(),
        )
        .unwrap();

        assert_eq!(model.item_listings(0), &[0, 2]);
        assert_eq!(model.item_listings(1), &[1]);
        assert_eq!(model.seller_listings(0), &[0]);
        assert_eq!(model.seller_listings(1), &[1, 2]);
        assert!(model.seller_listings(2).is_empty());
        assert_eq!(model.item_of(2), Some(0));
        assert_eq!(model.item_of(3), None);
        assert_eq!(model.candidate_sellers().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(model.candidate_listing_count(), 3);
    }

    #[test]
    fn test_oversized_listing_cost_is_rejected() {
        let err = Model::build(
            catalog(&[("a", "s1", u64::MAX / 2 + 1, 5), ("a", "s2", 10, 5)]),
            demand(&[("a", 2)]),
            Policy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SourcingError::InvalidInput(_)));
        let message = err.to_string();
        assert!(message.contains("listing #0"));
        assert!(message.contains("seller 's1'"));
    }

    #[test]
    fn test_cost_ceiling_sums_across_listings() {
        // each listing fits on its own, together they pass the ceiling
        let price = MAX_PLAN_COST / 2;
        let err = Model::build(
            catalog(&[("a", "s1", price, 1), ("b", "s2", price, 1), ("c", "s3", 1, 5)]),
            demand(&[("a", 1), ("b", 1), ("c", 1)]),
            Policy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SourcingError::InvalidInput(_)));
    }

    #[test]
    fn test_undemanded_listings_do_not_count_toward_ceiling() {
        let model = Model::build(
            catalog(&[("a", "s1", 10, 5), ("z", "s2", u64::MAX, u64::MAX)]),
            demand(&[("a", 2)]),
            Policy::default(),
        );
        assert!(model.is_ok());
    }
}
