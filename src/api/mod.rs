//! Purpose: Public Rust API for the inventory client.
//! Exports: Records, outcomes, errors, the store seam, the HTTP client, local state and the service.
//! Role: Only public path to the core model; used by the CLI, the dev server and tests.
//! Invariants: Additive-only surface.

mod local;
mod remote;
mod service;
mod store;

pub use crate::core::catalog::{SortKey, StockBreakdown, StockLine, stock_breakdown};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::outcome::{Outcome, RejectReason, Rejection};
pub use crate::core::product::{
    Actor, EditHistory, Location, NewProduct, NewStock, Product, ProductDraft, ProductPatch,
    Stock, Warehouseman, now_rfc3339,
};
pub use crate::core::report::render_summary;
pub use crate::core::stats::{Statistics, TOP_LIMIT};
pub use crate::core::stock::{Direction, StockAdjustment};
pub use local::{
    DeletionCount, DeletionLedger, LEDGER_KEY, LocalStore, SESSION_KEY, Session,
    default_state_dir,
};
pub use remote::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT, RemoteClient};
pub use service::InventoryService;
pub use store::{ApiResult, MemoryStore, ProductStore, Snapshot};
