//! Exact sourcing strategy: encodes the model as a mixed-integer program and
//! hands it to a [`MipBackend`].
//!
//! Variables: `q<listing>` integer in `[0, stock]` per candidate listing and
//! `y<seller>` binary per candidate seller. Rows:
//!
//! * `demand_<item>`: Σ q over the item's listings = required quantity
//! * `link_<listing>`: q − stock·y ≤ 0, which bounds stock and ties every purchase
//!   to its seller's shipping charge
//! * `min_<seller>` (threshold > 0 only): Σ price·q − threshold·y ≥ 0
//!
//! Objective: Σ price·q + Σ shipping·y.

use std::time::{Duration, Instant};

use log::info;

use crate::domain::model::Model;
use crate::domain::solver::{IlpProblem, IlpStatus, MipBackend, RowSense, VarKind};
use crate::domain::strategy::{Allocation, PurchaseResult, SourcingStrategy};
use crate::error::{Result, SourcingError};

/// The model's integer program plus the column of every listing's quantity
#[derive(Debug, Clone)]
pub struct Encoding {
    pub problem: IlpProblem,
    /// (listing index, column) for each candidate listing
    pub quantity_columns: Vec<(usize, usize)>,
}

pub fn encode(model: &Model) -> Result<Encoding> {
    let catalog = model.catalog();
    let policy = model.policy();
    let mut problem = IlpProblem::new();

    let mut quantity_col: Vec<Option<usize>> = vec![None; catalog.listings().len()];
    let mut quantity_columns = Vec::with_capacity(model.candidate_listing_count());
    for listing_idx in model.candidate_listings() {
        let listing = model.listing(listing_idx);
        let col = problem.add_variable(
            format!("q{}", listing_idx),
            0,
            to_coefficient(listing.stock_qty, "stock")?,
            VarKind::Integer,
            to_coefficient(listing.unit_price, "unit price")?,
        );
        quantity_col[listing_idx] = Some(col);
        quantity_columns.push((listing_idx, col));
    }

    let mut seller_col: Vec<Option<usize>> = vec![None; catalog.sellers().len()];
    for seller_idx in model.candidate_sellers() {
        let seller = model.seller(seller_idx);
        let col = problem.add_variable(
            format!("y{}", seller_idx),
            0,
            1,
            VarKind::Binary,
            to_coefficient(seller.shipping_cost, "shipping cost")?,
        );
        seller_col[seller_idx] = Some(col);
    }

    for (pos, entry) in model.items().iter().enumerate() {
        let coeffs = model
            .item_listings(pos)
            .iter()
            .filter_map(|&l| quantity_col[l])
            .map(|col| (col, 1))
            .collect();
        problem.add_row(
            format!("demand_{}", pos),
            coeffs,
            RowSense::Eq,
            to_coefficient(entry.required_qty, "required quantity")?,
        );
    }

    for &(listing_idx, q) in &quantity_columns {
        let listing = model.listing(listing_idx);
        let Some(y) = seller_col[listing.seller] else {
            continue;
        };
        let stock = to_coefficient(listing.stock_qty, "stock")?;
        problem.add_row(
            format!("link_{}", listing_idx),
            vec![(q, 1), (y, -stock)],
            RowSense::Le,
            0,
        );
    }

    if policy.enforces_min_purchase() {
        let threshold = to_coefficient(policy.min_purchase_per_seller, "minimum purchase")?;
        for seller_idx in model.candidate_sellers() {
            let Some(y) = seller_col[seller_idx] else {
                continue;
            };
            let mut coeffs: Vec<(usize, i64)> = Vec::new();
            for &l in model.seller_listings(seller_idx) {
                if let Some(q) = quantity_col[l] {
                    coeffs.push((q, to_coefficient(model.listing(l).unit_price, "unit price")?));
                }
            }
            coeffs.push((y, -threshold));
            problem.add_row(format!("min_{}", seller_idx), coeffs, RowSense::Ge, 0);
        }
    }

    Ok(Encoding {
        problem,
        quantity_columns,
    })
}

fn to_coefficient(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        SourcingError::InvalidInput(format!("{} {} is too large for the solver", what, value))
    })
}

/// Exact strategy: proven-optimal plans within a wall-clock budget
pub struct ExactStrategy {
    backend: Box<dyn MipBackend>,
    time_budget: Duration,
}

impl ExactStrategy {
    pub fn new(backend: Box<dyn MipBackend>, time_budget: Duration) -> Self {
        ExactStrategy {
            backend,
            time_budget,
        }
    }

    fn infeasible_reason(&self, model: &Model) -> String {
        let threshold = model.policy().min_purchase_per_seller;
        if threshold == 0 {
            return "demand cannot be met from the available sellers".to_string();
        }

        // Sellers whose whole relevant stock is worth less than the threshold can never be used
        let unusable: Vec<&str> = model
            .candidate_sellers()
            .filter(|&s| {
                let ceiling: u64 = model
                    .seller_listings(s)
                    .iter()
                    .map(|&l| {
                        let listing = model.listing(l);
                        listing.unit_price.saturating_mul(listing.stock_qty)
                    })
                    .fold(0u64, u64::saturating_add);
                ceiling < threshold
            })
            .map(|s| model.seller(s).id.as_str())
            .collect();

        if unusable.is_empty() {
            format!(
                "no seller combination meets demand with every used seller spending at least {}",
                threshold
            )
        } else {
            format!(
                "no seller combination meets demand with every used seller spending at least {}; \
                 sellers that can never reach it: {}",
                threshold,
                unusable.join(", ")
            )
        }
    }
}

impl SourcingStrategy for ExactStrategy {
    fn solve(&self, model: &Model) -> Result<PurchaseResult> {
        let start = Instant::now();
        let encoding = encode(model)?;
        info!(
            "exact strategy: {} variables, {} rows, backend {}, budget {:?}",
            encoding.problem.num_vars(),
            encoding.problem.rows.len(),
            self.backend.name(),
            self.time_budget
        );

        let solution = self.backend.solve(&encoding.problem, self.time_budget)?;
        match solution.status {
            IlpStatus::Optimal => {}
            IlpStatus::Infeasible => {
                return Err(SourcingError::Infeasible {
                    reason: self.infeasible_reason(model),
                })
            }
            IlpStatus::TimeLimit => {
                return Err(SourcingError::SolverTimeout {
                    solver: self.backend.name().to_string(),
                    budget: self.time_budget,
                })
            }
            IlpStatus::Unbounded => {
                return Err(SourcingError::Backend(format!(
                    "{} reported the sourcing model as unbounded",
                    self.backend.name()
                )))
            }
            IlpStatus::Undecided(detail) => {
                return Err(SourcingError::Backend(format!(
                    "{} stopped without a proof: {}",
                    self.backend.name(),
                    detail
                )))
            }
        }

        let allocations: Vec<Allocation> = encoding
            .quantity_columns
            .iter()
            .filter_map(|&(listing, col)| {
                let value = solution.values.get(col).copied().unwrap_or(0);
                (value > 0).then(|| Allocation {
                    listing,
                    quantity: value as u64,
                })
            })
            .collect();

        let total_cost = u64::try_from(solution.objective).map_err(|_| {
            SourcingError::Backend(format!(
                "{} returned a negative objective {}",
                self.backend.name(),
                solution.objective
            ))
        })?;

        let elapsed = start.elapsed();
        info!(
            "exact strategy: optimal total {} with {} allocations in {:?}",
            total_cost,
            allocations.len(),
            elapsed
        );

        Ok(PurchaseResult {
            allocations,
            total_cost,
            strategy: format!("exact ({})", self.backend.name()),
            iterations: 1,
            elapsed,
            proven_optimal: true,
        })
    }

    fn name(&self) -> &str {
        "exact"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Catalog;
    use crate::domain::demand::{DemandEntry, DemandSet, Policy};
    use crate::domain::solver::IlpSolution;
    use crate::models::{ListingRecord, ShippingResolution};

    struct FixedBackend(IlpSolution);

    impl MipBackend for FixedBackend {
        fn solve(&self, _problem: &IlpProblem, _time_limit: Duration) -> Result<IlpSolution> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn model(rows: &[(&str, &str, u64, u64)], demand: &[(&str, u64)], min_purchase: u64) -> Model {
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
        let demand = DemandSet::new(
            demand
                .iter()
                .map(|&(id, qty)| DemandEntry { item_id: id.into(), required_qty: qty })
                .collect(),
        );
        let policy = Policy {
            default_shipping_cost: 60,
            min_purchase_per_seller: min_purchase,
        };
        Model::build(Catalog::build(records, 60, ShippingResolution::Max), demand, policy).unwrap()
    }

    #[test]
    fn test_encode_builds_one_column_per_listing_and_seller() {
        let m = model(&[("a", "s1", 100, 5), ("a", "s2", 90, 5), ("b", "s1", 20, 2)], &[("a", 3), ("b", 1)], 0);
        let encoding = encode(&m).unwrap();
        let names: Vec<&str> = encoding.problem.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["q0", "q1", "q2", "y0", "y1"]);
        // 2 demand rows + 3 link rows, no minimum-purchase rows
        assert_eq!(encoding.problem.rows.len(), 5);
        assert!(encoding.problem.rows.iter().all(|r| !r.name.starts_with("min_")));
    }

    #[test]
    fn test_encode_links_quantity_to_seller_binary() {
        let m = model(&[("a", "s1", 100, 4)], &[("a", 2)], 0);
        let encoding = encode(&m).unwrap();
        let link = encoding.problem.rows.iter().find(|r| r.name == "link_0").unwrap();
        assert_eq!(link.coeffs, vec![(0, 1), (1, -4)]);
        assert_eq!(link.sense, RowSense::Le);
        assert_eq!(link.rhs, 0);
    }

    #[test]
    fn test_encode_adds_minimum_purchase_rows_when_enabled() {
        let m = model(&[("a", "s1", 50, 3), ("b", "s1", 60, 1)], &[("a", 3), ("b", 1)], 200);
        let encoding = encode(&m).unwrap();
        let row = encoding.problem.rows.iter().find(|r| r.name == "min_0").unwrap();
        assert_eq!(row.coeffs, vec![(0, 50), (1, 60), (2, -200)]);
        assert_eq!(row.sense, RowSense::Ge);
    }

    #[test]
    fn test_optimal_solution_decodes_nonzero_allocations() {
        let m = model(&[("a", "s1", 100, 5), ("a", "s2", 90, 5)], &[("a", 3)], 0);
        let strategy = ExactStrategy::new(
            Box::new(FixedBackend(IlpSolution {
                status: IlpStatus::Optimal,
                values: vec![0, 3, 0, 1],
                objective: 330,
            })),
            Duration::from_secs(1),
        );
        let result = strategy.solve(&m).unwrap();
        assert_eq!(result.allocations, vec![Allocation { listing: 1, quantity: 3 }]);
        assert_eq!(result.total_cost, 330);
        assert!(result.proven_optimal);
        assert_eq!(result.strategy, "exact (fixed)");
    }

    #[test]
    fn test_time_limit_maps_to_solver_timeout() {
        let m = model(&[("a", "s1", 100, 5)], &[("a", 3)], 0);
        let strategy = ExactStrategy::new(
            Box::new(FixedBackend(IlpSolution::without_values(IlpStatus::TimeLimit))),
            Duration::from_secs(7),
        );
        match strategy.solve(&m).unwrap_err() {
            SourcingError::SolverTimeout { solver, budget } => {
                assert_eq!(solver, "fixed");
                assert_eq!(budget, Duration::from_secs(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_infeasible_names_sellers_below_minimum() {
        let m = model(&[("a", "s1", 50, 3), ("a", "s2", 70, 5)], &[("a", 3)], 200);
        let strategy = ExactStrategy::new(
            Box::new(FixedBackend(IlpSolution::without_values(IlpStatus::Infeasible))),
            Duration::from_secs(1),
        );
        let err = strategy.solve(&m).unwrap_err();
        assert!(matches!(err, SourcingError::Infeasible { .. }));
        assert!(err.to_string().contains("s1"));
        assert!(!err.to_string().contains("s2"));
    }
}
