//! Purpose: Library crate behind the `stockroom` CLI and its tests.
//! Exports: `api` (records, store client, service, local state) and `core` (pure model).
//! Role: Inventory client for a REST product store plus a local dev store.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
