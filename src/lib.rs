pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod sources;
pub mod types;
