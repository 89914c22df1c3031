pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod quartile;
pub mod rate;
pub mod registry;
pub mod rollup;
pub mod service;

pub use error::ReportError;
pub use service::{Axis, ReportService};
