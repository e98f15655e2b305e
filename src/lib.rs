pub mod areas;
pub mod backend;
pub mod config;
pub mod console;
pub mod database;
pub mod emergency;
pub mod error;
pub mod fleet;
pub mod models;
pub mod paths;
pub mod poller;
pub mod reconciler;
pub mod routes;
pub mod store;
