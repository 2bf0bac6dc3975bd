//! Terminal plotting.

mod ascii;

pub use ascii::{render_dataset_plots, render_factor_plots, render_series_plot};
