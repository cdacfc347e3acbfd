pub mod config;
pub mod engine;
pub mod feedback;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod profile;
pub mod strategy;
pub mod types;
