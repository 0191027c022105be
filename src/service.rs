//! One optimization run from wire documents to a verified plan.

use log::{info, warn};

use crate::domain::catalog::Catalog;
use crate::domain::demand::from_config;
use crate::domain::exact::encode;
use crate::domain::model::Model;
use crate::domain::plan::{assemble, PurchasePlan};
use crate::domain::solver::IlpProblem;
use crate::domain::solver_factory::{create_strategy, SolveOptions, StrategyKind};
use crate::domain::validate::validate_listings;
use crate::error::Result;
use crate::models::{DemandConfig, ListingRecord, PlanDocument};

/// Validate the inputs and build the constraint model, running the supply pre-check
pub fn build_model(listings: Vec<ListingRecord>, demand: &DemandConfig) -> Result<Model> {
    validate_listings(&listings)?;
    let (demand_set, policy) = from_config(demand)?;
    let catalog = Catalog::build(listings, demand.default_shipping_cost, demand.shipping_resolution);
    info!(
        "catalog: {} listings from {} sellers, {} sold out",
        catalog.listings().len(),
        catalog.sellers().len(),
        catalog.dropped_sold_out()
    );
    Model::build(catalog, demand_set, policy)
}

/// Solve `model` with the selected strategy and assemble the verified plan
pub fn solve_model(model: &Model, options: &SolveOptions) -> Result<PurchasePlan> {
    if options.strategy == StrategyKind::Heuristic && model.policy().enforces_min_purchase() {
        warn!(
            "heuristic strategy does not enforce the minimum purchase of {} per seller; \
             the plan is rejected if a seller falls below it",
            model.policy().min_purchase_per_seller
        );
    }

    let strategy = create_strategy(options);
    info!("solving with {} strategy", strategy.name());
    let result = strategy.solve(model)?;
    info!(
        "{} finished in {:?} after {} iterations, reported total {}",
        result.strategy, result.elapsed, result.iterations, result.total_cost
    );

    assemble(model, &result)
}

pub fn optimize(
    listings: Vec<ListingRecord>,
    demand: &DemandConfig,
    options: &SolveOptions,
) -> Result<PurchasePlan> {
    let model = build_model(listings, demand)?;
    solve_model(&model, options)
}

pub fn optimize_document(
    listings: Vec<ListingRecord>,
    demand: &DemandConfig,
    options: &SolveOptions,
) -> Result<PlanDocument> {
    let plan = optimize(listings, demand, options)?;
    Ok(PlanDocument::from(&plan))
}

/// The integer program the exact strategy would hand to its backend
pub fn exact_model(model: &Model) -> Result<IlpProblem> {
    Ok(encode(model)?.problem)
}
