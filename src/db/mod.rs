//! Persistence module split across logical submodules. Every function takes a
//! `&Connection`; a `Transaction` derefs to one, so callers can compose
//! several calls atomically.

mod categories;
mod columns;
mod connection;
mod error;
mod items;
mod suppliers;

pub use categories::{
    category_path, delete_category, fetch_categories, fetch_category, fetch_category_by_name,
    insert_category, update_category,
};
pub use connection::{initialize_schema, open_database, open_in_memory};
pub(crate) use connection::in_transaction;
pub use error::StoreError;
pub use items::{
    delete_item, fetch_item, fetch_items, fetch_items_in_category, insert_item, update_item,
};
pub use suppliers::{
    associate_item_with_supplier, delete_supplier, dissociate_item_from_supplier, fetch_supplier,
    fetch_supplier_by_name, fetch_suppliers, fetch_suppliers_for_item, fetch_items_by_supplier,
    insert_supplier, purge_orphaned_associations, update_supplier,
};
