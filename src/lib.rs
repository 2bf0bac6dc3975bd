//! `ts-factors` library crate.
//!
//! The binary (`tsfa`) is a thin wrapper around this library so that:
//!
//! - the alignment stages and the factor model are testable without spawning processes
//! - the pipeline is reusable from other front-ends
//!
//! Data flow: `io::ingest` -> `align` -> `factor` -> `io::export` / `report` / `plot`.

pub mod align;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod factor;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
