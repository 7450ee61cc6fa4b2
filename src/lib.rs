//! Query sweep orchestration for systematic literature reviews.
//!
//! - [`params`] - Cartesian parameter tuples with get-or-create identities
//! - [`cache`] - append-only memoization of model outputs
//! - [`filter`] - near-duplicate filter for enrichment candidates
//! - [`sweep`] - resumable sweep producing one search string per unit
//! - [`retrieval`] - paginated retrieval, scoring and bounded retry
//! - [`store`] - SQLite store shared by all of the above

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod filter;
pub mod formulation;
pub mod metrics;
pub mod models;
pub mod nl;
pub mod notify;
pub mod params;
pub mod retrieval;
pub mod retry;
pub mod stem;
pub mod store;
pub mod sweep;

pub use error::{Error, Result};
