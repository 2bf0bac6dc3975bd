//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the tagged column model (`ColumnKind`, `ColumnData`, `Column`)
//! - datasets and the collection threaded through the alignment stages
//! - the factor-analysis result and run configuration

pub mod types;

pub use types::*;
