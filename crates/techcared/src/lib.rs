//! TechCare daemon library: evidence collection, analyzers, stores and the HTTP API.

pub mod analyzers;
pub mod auth;
pub mod cache;
pub mod cleaner;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod maintenance;
pub mod repairs;
pub mod repository;
pub mod routes;
pub mod server;
pub mod sessions;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod users;

pub use config::Config;
pub use state::AppState;
