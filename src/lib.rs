//! Customer-service conversation quality scoring.
//!
//! A transcript comes in, gets parsed into turns, and flows through a
//! bounded analysis workflow that grounds its assessment in an embedded
//! FAQ knowledge base. Results, KPI feedback and rollups live in SQLite.

pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod transcript;
