pub mod candidates;
pub mod config;
pub mod dataset;
pub mod ingest;
pub mod output;
pub mod pareto;
pub mod portfolio;
pub mod scenario;
pub mod server;
