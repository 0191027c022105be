use std::collections::HashMap;

use log::{debug, info, warn};

use crate::models::{ListingRecord, ShippingResolution};

/// One seller's offer for one item. `seller` indexes into [`Catalog::sellers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub item_id: String,
    pub seller: usize,
    pub unit_price: u64,
    pub stock_qty: u64,
    pub listing_id: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seller {
    pub id: String,
    pub shipping_cost: u64,
}

/// Immutable snapshot of purchasable listings. Sold-out listings never enter it and
/// every seller carries exactly one shipping cost, resolved at construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    listings: Vec<Listing>,
    sellers: Vec<Seller>,
    dropped_sold_out: usize,
}

impl Catalog {
    pub fn build(
        records: Vec<ListingRecord>,
        default_shipping_cost: u64,
        resolution: ShippingResolution,
    ) -> Self {
        let mut listings = Vec::with_capacity(records.len());
        let mut seller_ids: Vec<String> = Vec::new();
        let mut seller_lookup: HashMap<String, usize> = HashMap::new();
        let mut quoted: Vec<Vec<u64>> = Vec::new();
        let mut dropped_sold_out = 0;

        for record in records {
            if record.stock_qty == 0 {
                dropped_sold_out += 1;
                continue;
            }

            let seller = match seller_lookup.get(&record.seller_id) {
                Some(&idx) => idx,
                None => {
                    let idx = seller_ids.len();
                    seller_lookup.insert(record.seller_id.clone(), idx);
                    seller_ids.push(record.seller_id.clone());
                    quoted.push(Vec::new());
                    idx
                }
            };
            if let Some(cost) = record.shipping_cost {
                quoted[seller].push(cost);
            }

            listings.push(Listing {
                item_id: record.item_id,
                seller,
                unit_price: record.unit_price,
                stock_qty: record.stock_qty,
                listing_id: record.listing_id,
                product_name: record.product_name,
            });
        }

        let sellers: Vec<Seller> = seller_ids
            .into_iter()
            .zip(quoted)
            .map(|(id, costs)| {
                let shipping_cost = resolve_shipping(&id, &costs, default_shipping_cost, resolution);
                Seller { id, shipping_cost }
            })
            .collect();

        if dropped_sold_out > 0 {
            debug!("dropped {} sold-out listings", dropped_sold_out);
        }
        info!(
            "catalog holds {} listings from {} sellers",
            listings.len(),
            sellers.len()
        );

        Catalog {
            listings,
            sellers,
            dropped_sold_out,
        }
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn sellers(&self) -> &[Seller] {
        &self.sellers
    }

    pub fn seller(&self, idx: usize) -> &Seller {
        &self.sellers[idx]
    }

    /// Seller offering `listing`
    pub fn seller_of(&self, listing: &Listing) -> &Seller {
        &self.sellers[listing.seller]
    }

    pub fn dropped_sold_out(&self) -> usize {
        self.dropped_sold_out
    }
}

fn resolve_shipping(
    seller_id: &str,
    costs: &[u64],
    default_shipping_cost: u64,
    resolution: ShippingResolution,
) -> u64 {
    let Some(&first) = costs.first() else {
        return default_shipping_cost;
    };
    if costs.iter().any(|&c| c != first) {
        warn!(
            "seller '{}' quotes conflicting shipping costs {:?}, resolving with {:?}",
            seller_id, costs, resolution
        );
    }
    match resolution {
        ShippingResolution::First => first,
        ShippingResolution::Max => costs.iter().copied().max().unwrap_or(first),
        ShippingResolution::Min => costs.iter().copied().min().unwrap_or(first),
    }
}
