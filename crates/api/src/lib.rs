//! HTTP surface: configuration, bearer-token guard and routes.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
