//! Inventory tracker backed by an embedded SQLite file: items, a category
//! hierarchy, suppliers and the links between items and suppliers.
//!
//! `db` is the repository layer, `catalog` adds name-based helpers on top,
//! `interchange` moves items in and out of CSV, and `ui` is the terminal
//! front-end that `main.rs` launches.
pub mod catalog;
pub mod config;
pub mod db;
pub mod interchange;
pub mod logging;
pub mod models;
pub mod ui;

/// Repository entry points most callers start from.
pub use db::{initialize_schema, open_database, open_in_memory, StoreError};

pub use catalog::{get_or_create_category, get_or_create_supplier};
pub use config::Config;
pub use models::{Category, InventoryItem, StockStatus, Supplier, ValidationError};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
