//! Microsoft 365 tenant diagnostics and reporting
//!
//! Connects to a tenant through Microsoft Graph with client-secret or
//! certificate credentials and renders typed reports to CSV, HTML, JSON
//! and PDF. Every report kind can fall back to a built-in sample dataset.

pub mod cmd;
pub mod config;
pub mod error;
pub mod graph;
pub mod report;
