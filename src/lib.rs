pub mod config;
pub mod difficulty;
pub mod extractors;
pub mod lesson;
pub mod logging;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod state;
