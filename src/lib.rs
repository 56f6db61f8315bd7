pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prediction;
pub mod routes;
