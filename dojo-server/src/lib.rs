// Library exports for dojo-server
// This allows the admin CLI and the integration tests to use server modules

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod middleware;
pub mod notifications;
pub mod password;
pub mod photo;
pub mod rate_limit;
pub mod routes;
pub mod session;
pub mod state;
pub mod stats;
pub mod validation;
