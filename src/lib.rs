pub mod api;
pub mod calendar;
pub mod config;
pub mod demo_backend;
pub mod drag;
pub mod http_client;
pub mod layout;
pub mod logging;
pub mod model;
pub mod persist;
pub mod provider;
pub mod query_cache;
pub mod state;
