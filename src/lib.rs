//! `rill`: an embedded, append-only store for 64-bit `(key, val)` pairs.
//!
//! Pairs accumulate in memory and are periodically materialized as
//! immutable, memory-mapped files organized by an hour/day/month time
//! hierarchy; older files are merged into coarser files and expire. See
//! `DESIGN.md` for the grounding of each module.

pub mod db;
pub mod error;
pub mod merge;
pub mod naming;
pub mod pairs;
pub mod quant;
pub mod query;
pub mod store;

pub use db::Database;
pub use error::{RillError, RillResult};
pub use pairs::{Pair, PairSet};
pub use quant::Quant;
pub use query::QueryContext;
pub use store::{Column, Store};
