//! Hours worked per day, kept in SQLite or PostgreSQL and served as JSON over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod telemetry;
