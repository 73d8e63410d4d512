use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::suppliers::purge_orphaned_associations;

/// Open (or create) the SQLite file at `path`, make sure the parent directory
/// exists, and provision the schema.
pub fn open_database(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::DataDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let conn = Connection::open(path).map_err(StoreError::StorageUnavailable)?;
    initialize_schema(&conn)?;
    info!(path = %path.display(), "inventory database ready");
    Ok(conn)
}

/// Volatile database with the full schema. Used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory().map_err(StoreError::StorageUnavailable)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Run `op` inside a transaction that commits on success and rolls back when
/// dropped on error. If the caller already opened one, `op` joins it instead
/// of nesting.
pub(crate) fn in_transaction<T>(
    conn: &Connection,
    op: impl FnOnce(&Connection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    if !conn.is_autocommit() {
        return op(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Create the four tables and their indexes if they are missing. The function
/// also toggles `PRAGMA foreign_keys = ON`, which SQLite scopes to the
/// connection, so it has to run for every connection we open.
pub fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS Categories (
            CategoryId TEXT PRIMARY KEY NOT NULL,
            CategoryName TEXT NOT NULL UNIQUE COLLATE NOCASE,
            ParentId TEXT NULL,
            FOREIGN KEY(ParentId) REFERENCES Categories(CategoryId)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS InventoryItems (
            ItemId TEXT PRIMARY KEY NOT NULL,
            ItemName TEXT NOT NULL,
            CategoryId TEXT NOT NULL,
            Quantity INTEGER NOT NULL DEFAULT 0,
            Price TEXT NOT NULL DEFAULT '0.00',
            MinStock INTEGER NULL,
            MaxStock INTEGER NULL,
            FOREIGN KEY(CategoryId) REFERENCES Categories(CategoryId)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS Suppliers (
            SupplierId TEXT PRIMARY KEY NOT NULL,
            SupplierName TEXT NOT NULL UNIQUE COLLATE NOCASE,
            Website TEXT NULL,
            Phone TEXT NULL,
            Email TEXT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ItemSuppliers (
            ItemId TEXT NOT NULL,
            SupplierId TEXT NOT NULL,
            PRIMARY KEY (ItemId, SupplierId),
            FOREIGN KEY(ItemId) REFERENCES InventoryItems(ItemId) ON DELETE CASCADE,
            FOREIGN KEY(SupplierId) REFERENCES Suppliers(SupplierId) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_items_category ON InventoryItems(CategoryId);
         CREATE INDEX IF NOT EXISTS idx_item_suppliers_item ON ItemSuppliers(ItemId);
         CREATE INDEX IF NOT EXISTS idx_item_suppliers_supplier ON ItemSuppliers(SupplierId);",
    )?;

    // Files written before foreign keys were enforced can carry dangling links.
    let purged = purge_orphaned_associations(conn)?;
    if purged > 0 {
        warn!(purged, "removed orphaned item-supplier links");
    }

    debug!("schema verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
    }

    #[test]
    fn creates_all_tables_and_indexes() {
        let conn = open_in_memory().unwrap();
        assert_eq!(
            table_names(&conn),
            vec!["Categories", "InventoryItems", "ItemSuppliers", "Suppliers"]
        );

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            indexes,
            vec![
                "idx_item_suppliers_item",
                "idx_item_suppliers_supplier",
                "idx_items_category"
            ]
        );
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = open_in_memory().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn initialization_is_idempotent() {
        let conn = open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(table_names(&conn).len(), 4);
    }

    #[test]
    fn open_database_creates_missing_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("inventory.sqlite");
        drop(open_database(&path).unwrap());
        assert!(path.exists());

        // Reopening an existing file must not fail on the CREATE statements.
        let conn = open_database(&path).unwrap();
        assert_eq!(table_names(&conn).len(), 4);
    }
}
