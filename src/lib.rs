// Library for tests and the binary to access modules

pub mod benchmark;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod geo;
pub mod history_repo;
pub mod interfaces;
pub mod latency;
pub mod maintenance;
pub mod models;
pub mod monitor;
pub mod publisher;
pub mod rate;
pub mod resources;
pub mod routes;
pub mod scheduler;
pub mod series;
