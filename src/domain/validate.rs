use std::collections::HashSet;

use crate::error::{Result, SourcingError};
use crate::models::{DemandConfig, ListingRecord};

pub fn validate_demand(config: &DemandConfig) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(config.items.len());

    for item in &config.items {
        if item.item_id.trim().is_empty() {
            return Err(SourcingError::InvalidInput(
                "Demand contains an item with an empty item_id".to_string(),
            ));
        }
        if item.required_qty == 0 {
            return Err(SourcingError::InvalidInput(format!(
                "Demand for item '{}' must be a positive quantity",
                item.item_id,
            )));
        }
        if !seen.insert(item.item_id.as_str()) {
            return Err(SourcingError::InvalidInput(format!(
                "Demand lists item '{}' more than once",
                item.item_id,
            )));
        }
    }

    Ok(())
}

pub fn validate_listings(listings: &[ListingRecord]) -> Result<()> {
    for (idx, listing) in listings.iter().enumerate() {
        if listing.item_id.trim().is_empty() {
            return Err(SourcingError::InvalidInput(format!(
                "Listing #{} has an empty item_id",
                idx,
            )));
        }
        if listing.seller_id.trim().is_empty() {
            return Err(SourcingError::InvalidInput(format!(
                "Listing #{} for item '{}' has an empty seller_id",
                idx, listing.item_id,
            )));
        }
    }

    Ok(())
}
