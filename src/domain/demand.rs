use crate::domain::validate::validate_demand;
use crate::error::Result;
use crate::models::DemandConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandEntry {
    pub item_id: String,
    pub required_qty: u64,
}

/// Required quantity per item, in the order the caller listed them
#[derive(Debug, Clone, Default)]
pub struct DemandSet {
    entries: Vec<DemandEntry>,
}

impl DemandSet {
    pub fn new(entries: Vec<DemandEntry>) -> Self {
        DemandSet { entries }
    }

    pub fn entries(&self) -> &[DemandEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_units(&self) -> u64 {
        self.entries.iter().map(|e| e.required_qty).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    pub default_shipping_cost: u64,
    /// 0 disables the constraint
    pub min_purchase_per_seller: u64,
}

impl Policy {
    pub fn enforces_min_purchase(&self) -> bool {
        self.min_purchase_per_seller > 0
    }
}

/// Split a validated demand document into the demand set and its policy
pub fn from_config(config: &DemandConfig) -> Result<(DemandSet, Policy)> {
    validate_demand(config)?;

    let entries = config
        .items
        .iter()
        .map(|item| DemandEntry {
            item_id: item.item_id.clone(),
            required_qty: item.required_qty,
        })
        .collect();

    let policy = Policy {
        default_shipping_cost: config.default_shipping_cost,
        min_purchase_per_seller: config.min_purchase_per_seller,
    };

    Ok((DemandSet::new(entries), policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DemandItem, ShippingResolution};

    #[test]
    fn test_from_config_keeps_item_order_and_policy() {
        let config = DemandConfig {
            items: vec![
                DemandItem { item_id: "b".into(), required_qty: 1 },
                DemandItem { item_id: "a".into(), required_qty: 3 },
            ],
            default_shipping_cost: 60,
            min_purchase_per_seller: 200,
            shipping_resolution: ShippingResolution::Max,
        };
        let (demand, policy) = from_config(&config).unwrap();
        let ids: Vec<&str> = demand.entries().iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(demand.total_units(), 4);
        assert!(policy.enforces_min_purchase());
        assert_eq!(policy.default_shipping_cost, 60);
    }

    #[test]
    fn test_from_config_rejects_zero_quantity() {
        let config = DemandConfig {
            items: vec![DemandItem { item_id: "a".into(), required_qty: 0 }],
            default_shipping_cost: 60,
            min_purchase_per_seller: 0,
            shipping_resolution: ShippingResolution::Max,
        };
        assert!(from_config(&config).is_err());
    }
}
