pub mod access;
pub mod auth;
pub mod config;
pub mod engine;
pub mod http;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod observability;
pub mod wal;
