//! Purpose: Internal inventory model and pure operations.
//! Exports: Records, stock adjustment, statistics, catalog views, summaries, errors.
//! Role: Transport-free layer shared by the client, service and dev server.
pub mod catalog;
pub mod error;
pub mod outcome;
pub mod product;
pub mod report;
pub mod stats;
pub mod stock;
