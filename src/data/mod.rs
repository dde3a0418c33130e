pub mod api;
pub mod timeseries;
pub mod types;
