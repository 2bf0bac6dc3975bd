//! Mathematical utilities: column statistics and truncated SVD.

pub mod stats;
pub mod svd;

pub use stats::*;
pub use svd::*;
