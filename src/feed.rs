//! File boundary of the CLI: catalog and demand documents in, plan and model dump out.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;

use crate::domain::solver::IlpProblem;
use crate::error::{Result, SourcingError};
use crate::models::{DemandConfig, ListingRecord, PlanDocument};

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        SourcingError::InvalidInput(format!("cannot open {} file {}: {}", what, path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        SourcingError::InvalidInput(format!("malformed {} file {}: {}", what, path.display(), e))
    })
}

/// Read a catalog file: a JSON array of listing records
pub fn read_listings(path: &Path) -> Result<Vec<ListingRecord>> {
    let listings: Vec<ListingRecord> = read_json(path, "catalog")?;
    info!("read {} listings from {}", listings.len(), path.display());
    Ok(listings)
}

pub fn read_demand(path: &Path) -> Result<DemandConfig> {
    let demand: DemandConfig = read_json(path, "demand")?;
    info!("read demand for {} items from {}", demand.items.len(), path.display());
    Ok(demand)
}

/// Write the plan as pretty JSON to `path`, or to stdout when `path` is `None`
pub fn write_plan(plan: &PlanDocument, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut out, plan)?;
            writeln!(out)?;
            out.flush()?;
            info!("plan written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, plan)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Write the integer program in LP format for inspection with external tools
pub fn write_model(problem: &IlpProblem, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    problem.write_lp(&mut out)?;
    out.flush()?;
    info!("model written to {}", path.display());
    Ok(())
}
