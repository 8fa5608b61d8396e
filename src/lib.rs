//! # salesq
//!
//! Queued extraction of filtered sales records.
//!
//! Clients create a task with a year range and optional company list; a
//! single background worker reads a structured (JSON) feed and a tabular
//! (CSV) feed, keeps the matching sales, and stores them against the task.
//! Task status and results are served over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod source;
pub mod telemetry;
