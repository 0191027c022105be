//! Heuristic sourcing strategy: greedy seed followed by bounded local search.
//!
//! Phase A buys each item from its cheapest listings first. Phase B repeatedly
//! moves one allocation onto a listing of the same item at another seller that
//! is already part of the plan, taking the first move that lowers the total.
//! A move lowers the total either through a cheaper unit price or by emptying
//! the source seller, which releases its shipping charge. No move ever opens a
//! new seller, so the shipping total never grows during phase B.
//!
//! Minimum purchase thresholds are not enforced here; the plan assembler
//! reports any breach.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::domain::model::Model;
use crate::domain::strategy::{Allocation, PurchaseResult, SourcingStrategy};
use crate::error::{Result, SourcingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicConfig {
    /// Stop phase B once no improving move has been found for this long
    pub stall_window: Duration,
    /// Items with more listings than this are pruned before seeding. `None` disables pruning.
    pub prune_above: Option<usize>,
    /// Log progress every this many scans
    pub progress_interval: u64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        HeuristicConfig {
            stall_window: Duration::from_secs(30),
            prune_above: Some(110),
            progress_interval: 1000,
        }
    }
}

pub struct HeuristicStrategy {
    config: HeuristicConfig,
}

impl HeuristicStrategy {
    pub fn new(config: HeuristicConfig) -> Self {
        HeuristicStrategy { config }
    }

    /// Listings each item may be bought from, in catalog order
    fn candidates(&self, model: &Model) -> Vec<Vec<usize>> {
        (0..model.items().len())
            .map(|item| match self.config.prune_above {
                Some(limit) => prune(model, item, limit),
                None => model.item_listings(item).to_vec(),
            })
            .collect()
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

/// Drop the most expensive quartile of an item's listings when it has more than
/// `limit`, ranked by unit price plus the seller's shipping spread over the
/// demand. The kept set always holds enough stock to cover demand.
pub fn prune(model: &Model, item: usize, limit: usize) -> Vec<usize> {
    let listings = model.item_listings(item);
    if listings.len() <= limit {
        return listings.to_vec();
    }

    let entry = &model.items()[item];
    let required = entry.required_qty;
    let mut ranked = listings.to_vec();
    // price + shipping / required, compared without division
    ranked.sort_by_key(|&l| {
        let listing = model.listing(l);
        listing.unit_price as u128 * required as u128
            + model.seller(listing.seller).shipping_cost as u128
    });

    let mut keep = ranked.len() * 3 / 4;
    let mut supply = ranked[..keep]
        .iter()
        .map(|&l| model.listing(l).stock_qty)
        .fold(0u64, u64::saturating_add);
    while supply < required && keep < ranked.len() {
        supply = supply.saturating_add(model.listing(ranked[keep]).stock_qty);
        keep += 1;
    }

    let mut kept = ranked[..keep].to_vec();
    kept.sort_unstable();
    info!(
        "item '{}' has {} listings, keeping {} after pruning",
        entry.item_id,
        listings.len(),
        kept.len()
    );
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    item: usize,
    listing: usize,
    quantity: u64,
}

/// Per item, take as much as possible from the cheapest remaining listing.
/// Equal prices keep catalog order.
fn greedy_seed(model: &Model, candidates: &[Vec<usize>]) -> Result<Vec<Slot>> {
    let mut slots = Vec::new();

    for (item, entry) in model.items().iter().enumerate() {
        let mut ordered = candidates[item].clone();
        ordered.sort_by_key(|&l| model.listing(l).unit_price);

        let mut remaining = entry.required_qty;
        for listing in ordered {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(model.listing(listing).stock_qty);
            if take > 0 {
                slots.push(Slot {
                    item,
                    listing,
                    quantity: take,
                });
                remaining -= take;
            }
        }

        if remaining > 0 {
            return Err(SourcingError::Infeasible {
                reason: format!(
                    "item '{}' is short by {} units after pruning its listings",
                    entry.item_id, remaining
                ),
            });
        }
    }

    Ok(slots)
}

#[derive(Debug, Clone, Copy)]
struct Move {
    slot: usize,
    target: usize,
    delta: i128,
}

enum ScanOutcome {
    Improve(Move),
    Exhausted,
    Stalled,
}

struct SearchState<'m> {
    model: &'m Model,
    slots: Vec<Slot>,
    /// units taken per catalog listing
    used: Vec<u64>,
    /// allocations per seller; > 0 means the seller is in the plan
    seller_load: Vec<usize>,
    total: u64,
}

impl<'m> SearchState<'m> {
    fn new(model: &'m Model, slots: Vec<Slot>) -> Self {
        let mut used = vec![0u64; model.catalog().listings().len()];
        let mut seller_load = vec![0usize; model.catalog().sellers().len()];
        let mut total = 0u64;

        for slot in &slots {
            let listing = model.listing(slot.listing);
            used[slot.listing] += slot.quantity;
            if seller_load[listing.seller] == 0 {
                total += model.seller(listing.seller).shipping_cost;
            }
            seller_load[listing.seller] += 1;
            total += listing.unit_price * slot.quantity;
        }

        SearchState {
            model,
            slots,
            used,
            seller_load,
            total,
        }
    }

    fn active_sellers(&self) -> usize {
        self.seller_load.iter().filter(|&&load| load > 0).count()
    }

    /// First improving move in slot order, or why there is none
    fn scan(&self, candidates: &[Vec<usize>], last_improvement: Instant, stall_window: Duration) -> ScanOutcome {
        for (slot_idx, slot) in self.slots.iter().enumerate() {
            if last_improvement.elapsed() >= stall_window {
                return ScanOutcome::Stalled;
            }

            let source = self.model.listing(slot.listing);
            let released = if self.seller_load[source.seller] == 1 {
                self.model.seller(source.seller).shipping_cost
            } else {
                0
            };

            for &target in &candidates[slot.item] {
                let candidate = self.model.listing(target);
                if candidate.seller == source.seller || self.seller_load[candidate.seller] == 0 {
                    continue;
                }
                if candidate.stock_qty - self.used[target] < slot.quantity {
                    continue;
                }
                let delta = (candidate.unit_price as i128 - source.unit_price as i128)
                    * slot.quantity as i128
                    - released as i128;
                if delta < 0 {
                    return ScanOutcome::Improve(Move {
                        slot: slot_idx,
                        target,
                        delta,
                    });
                }
            }
        }
        ScanOutcome::Exhausted
    }

    fn apply(&mut self, mv: Move) {
        let slot = self.slots[mv.slot];
        let source_seller = self.model.listing(slot.listing).seller;
        let target_seller = self.model.listing(mv.target).seller;

        self.used[slot.listing] -= slot.quantity;
        self.used[mv.target] += slot.quantity;
        self.seller_load[source_seller] -= 1;

        match self.slots.iter().position(|s| s.listing == mv.target) {
            Some(existing) => {
                self.slots[existing].quantity += slot.quantity;
                self.slots.remove(mv.slot);
            }
            None => {
                self.slots[mv.slot].listing = mv.target;
                self.seller_load[target_seller] += 1;
            }
        }

        self.total = (self.total as i128 + mv.delta) as u64;
    }
}

impl SourcingStrategy for HeuristicStrategy {
    fn solve(&self, model: &Model) -> Result<PurchaseResult> {
        let start = Instant::now();
        let candidates = self.candidates(model);

        let seed = greedy_seed(model, &candidates)?;
        let mut state = SearchState::new(model, seed);
        info!(
            "heuristic phase A: total {} across {} sellers",
            state.total,
            state.active_sellers()
        );

        let mut iterations: u64 = 0;
        let mut last_improvement = Instant::now();
        loop {
            iterations += 1;
            if self.config.progress_interval > 0 && iterations % self.config.progress_interval == 0 {
                info!(
                    "heuristic phase B: {} scans, current total {}, elapsed {:?}",
                    iterations,
                    state.total,
                    start.elapsed()
                );
            }

            match state.scan(&candidates, last_improvement, self.config.stall_window) {
                ScanOutcome::Improve(mv) => {
                    debug!(
                        "moving listing {} to listing {} (delta {})",
                        state.slots[mv.slot].listing, mv.target, mv.delta
                    );
                    state.apply(mv);
                    last_improvement = Instant::now();
                }
                ScanOutcome::Exhausted => break,
                ScanOutcome::Stalled => {
                    info!(
                        "heuristic phase B: no improvement for {:?}, stopping",
                        self.config.stall_window
                    );
                    break;
                }
            }
        }

        let elapsed = start.elapsed();
        info!(
            "heuristic phase B: total {} across {} sellers after {} scans in {:?}",
            state.total,
            state.active_sellers(),
            iterations,
            elapsed
        );

        let allocations = state
            .slots
            .iter()
            .map(|slot| Allocation {
                listing: slot.listing,
                quantity: slot.quantity,
            })
            .collect();

        Ok(PurchaseResult {
            allocations,
            total_cost: state.total,
            strategy: "heuristic".to_string(),
            iterations,
            elapsed,
            proven_optimal: false,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
