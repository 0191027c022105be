//! Card sourcing optimizer: buys a fixed list of items from many independent
//! sellers at minimum total cost, items plus one shipping charge per seller used.

pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod feed;
pub mod models;
pub mod server;
pub mod service;

pub use error::{Result, SourcingError, Violation};
