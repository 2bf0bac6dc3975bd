//! File I/O: CSV ingest, run outputs, summary JSON.

pub mod export;
pub mod ingest;
pub mod summary;
