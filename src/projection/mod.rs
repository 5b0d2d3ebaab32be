//! Projection module
//!
//! Read models built from committed rows, used to construct responses.

mod service;

pub use service::{DisbursementView, ProjectionService};
