//! Adaptive LV specification backend.
//!
//! Turns a free-text renovation description into per-trade question sets and
//! priced line-item lists (Leistungsverzeichnis). The [`pipeline`] module is
//! usable on its own; the remaining modules wire it into an axum service.

pub mod api;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod oracle;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod store;
