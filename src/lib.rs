//! Signal cataloger - time-of-day candle statistics and future signal scheduling

pub mod config;
pub mod error;
pub mod report;
pub mod services;
pub mod sources;
pub mod types;

pub use config::{CatalogParams, Config, FilterPeriods};
pub use error::{CatalogError, Result};
pub use services::{Cataloger, RunReport};
pub use types::*;
