pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod http_cache;
pub mod http_client;
pub mod matches;
pub mod metrics;
pub mod model;
pub mod physical;
pub mod provider;
pub mod reference;
pub mod selection;
pub mod state;
pub mod table;
