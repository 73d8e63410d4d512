use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::InventoryItem;

use super::columns::{decimal_at, uuid_at};
use super::connection::in_transaction;
use super::error::{constraint_violation, Constraint, StoreError};

const ITEM_COLUMNS: &str = "ItemId, ItemName, CategoryId, Quantity, Price, MinStock, MaxStock";

/// Materialize a row selected with `ITEM_COLUMNS`. This is where the
/// reconstruction constructor gets its id.
pub(super) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem::with_id(
        uuid_at(row, 0)?,
        row.get::<_, String>(1)?,
        uuid_at(row, 2)?,
        row.get(3)?,
        decimal_at(row, 4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn map_item_write(err: rusqlite::Error, item: &InventoryItem) -> StoreError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => StoreError::duplicate("Item", item.id()),
        Some(Constraint::ForeignKey) => StoreError::missing("Category", item.category_id),
        _ => err.into(),
    }
}

/// Insert a new row keyed by the item's identifier.
pub fn insert_item(conn: &Connection, item: &InventoryItem) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO InventoryItems
             (ItemId, ItemName, CategoryId, Quantity, Price, MinStock, MaxStock)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.id().to_string(),
            item.name,
            item.category_id.to_string(),
            item.quantity,
            item.price.to_string(),
            item.min_stock,
            item.max_stock,
        ],
    )
    .map_err(|err| map_item_write(err, item))?;

    info!(item_id = %item.id(), name = %item.name, "inserted item");
    Ok(())
}

/// Every stored item, ordered case-insensitively by name.
pub fn fetch_items(conn: &Connection) -> Result<Vec<InventoryItem>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM InventoryItems ORDER BY ItemName COLLATE NOCASE, ItemId"
    ))?;

    let items = stmt
        .query_map([], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

pub fn fetch_item(conn: &Connection, id: Uuid) -> Result<Option<InventoryItem>, StoreError> {
    let item = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM InventoryItems WHERE ItemId = ?1"),
            [id.to_string()],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

/// Items filed directly under a category (subcategories are not included).
pub fn fetch_items_in_category(
    conn: &Connection,
    category_id: Uuid,
) -> Result<Vec<InventoryItem>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM InventoryItems
         WHERE CategoryId = ?1
         ORDER BY ItemName COLLATE NOCASE, ItemId"
    ))?;

    let items = stmt
        .query_map([category_id.to_string()], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

/// Overwrite every field of the stored row. Returns `false` when no row carries
/// the item's identifier.
pub fn update_item(conn: &Connection, item: &InventoryItem) -> Result<bool, StoreError> {
    let updated = conn
        .execute(
            "UPDATE InventoryItems
             SET ItemName = ?1, CategoryId = ?2, Quantity = ?3, Price = ?4,
                 MinStock = ?5, MaxStock = ?6
             WHERE ItemId = ?7",
            params![
                item.name,
                item.category_id.to_string(),
                item.quantity,
                item.price.to_string(),
                item.min_stock,
                item.max_stock,
                item.id().to_string(),
            ],
        )
        .map_err(|err| map_item_write(err, item))?;

    debug!(item_id = %item.id(), updated, "updated item");
    Ok(updated > 0)
}

/// Remove the item and its supplier links. Returns `false` when nothing was
/// stored under `id`.
pub fn delete_item(conn: &Connection, id: Uuid) -> Result<bool, StoreError> {
    let key = id.to_string();
    let deleted = in_transaction(conn, |conn| {
        conn.execute("DELETE FROM ItemSuppliers WHERE ItemId = ?1", [&key])?;
        Ok(conn.execute("DELETE FROM InventoryItems WHERE ItemId = ?1", [&key])?)
    })?;

    if deleted > 0 {
        info!(item_id = %id, "deleted item");
    }
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{insert_category, open_in_memory};
    use crate::models::Category;

    fn setup() -> (Connection, Category) {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        insert_category(&conn, &tools).unwrap();
        (conn, tools)
    }

    fn hammer(category: &Category) -> InventoryItem {
        InventoryItem::new(
            "Hammer",
            category.id(),
            10,
            Decimal::from_str("9.99").unwrap(),
            Some(2),
            Some(20),
        )
    }

    #[test]
    fn insert_then_fetch_returns_identical_item() {
        let (conn, tools) = setup();
        let item = hammer(&tools);
        insert_item(&conn, &item).unwrap();

        let fetched = fetch_item(&conn, item.id()).unwrap().unwrap();
        assert_eq!(fetched, item);
        assert_eq!(fetched.price.to_string(), "9.99");
    }

    #[test]
    fn duplicate_identifier_is_rejected() {
        let (conn, tools) = setup();
        let item = hammer(&tools);
        insert_item(&conn, &item).unwrap();

        assert_matches!(
            insert_item(&conn, &item),
            Err(StoreError::DuplicateKey { entity: "Item", .. })
        );
    }

    #[test]
    fn unknown_category_is_a_foreign_key_violation() {
        let (conn, _) = setup();
        let orphan = InventoryItem::new("Ghost", Uuid::new_v4(), 1, Decimal::ONE, None, None);
        assert_matches!(
            insert_item(&conn, &orphan),
            Err(StoreError::ForeignKeyViolation { entity: "Category", .. })
        );
    }

    #[test]
    fn absent_min_stock_differs_from_zero() {
        let (conn, tools) = setup();
        let unset = InventoryItem::new("Rope", tools.id(), 3, Decimal::ONE, None, None);
        let zero = InventoryItem::new("Wire", tools.id(), 3, Decimal::ONE, Some(0), None);
        insert_item(&conn, &unset).unwrap();
        insert_item(&conn, &zero).unwrap();

        assert_eq!(fetch_item(&conn, unset.id()).unwrap().unwrap().min_stock, None);
        assert_eq!(fetch_item(&conn, zero.id()).unwrap().unwrap().min_stock, Some(0));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (conn, _) = setup();
        assert_eq!(fetch_item(&conn, Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn fetch_items_orders_by_name() {
        let (conn, tools) = setup();
        for name in ["wrench", "Anvil", "chisel"] {
            let item = InventoryItem::new(name, tools.id(), 1, Decimal::ONE, None, None);
            insert_item(&conn, &item).unwrap();
        }
        let names: Vec<String> = fetch_items(&conn)
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["Anvil", "chisel", "wrench"]);
    }

    #[test]
    fn update_overwrites_every_field() {
        let (conn, tools) = setup();
        let garden = Category::new("Garden", None);
        insert_category(&conn, &garden).unwrap();

        let mut item = hammer(&tools);
        insert_item(&conn, &item).unwrap();

        item.name = "Mallet".into();
        item.category_id = garden.id();
        item.quantity = 0;
        item.price = Decimal::from_str("12.50").unwrap();
        item.min_stock = None;
        item.max_stock = Some(5);
        assert!(update_item(&conn, &item).unwrap());

        assert_eq!(fetch_item(&conn, item.id()).unwrap().unwrap(), item);
        assert_eq!(fetch_items_in_category(&conn, tools.id()).unwrap(), vec![]);
        assert_eq!(fetch_items_in_category(&conn, garden.id()).unwrap(), vec![item]);
    }

    #[test]
    fn update_of_missing_item_reports_false() {
        let (conn, tools) = setup();
        assert!(!update_item(&conn, &hammer(&tools)).unwrap());
    }

    #[test]
    fn delete_removes_row_and_is_a_no_op_afterwards() {
        let (conn, tools) = setup();
        let item = hammer(&tools);
        insert_item(&conn, &item).unwrap();

        assert!(delete_item(&conn, item.id()).unwrap());
        assert_eq!(fetch_item(&conn, item.id()).unwrap(), None);
        assert!(!delete_item(&conn, item.id()).unwrap());
    }

    #[test]
    fn undecodable_price_is_reported_with_its_column() {
        let (conn, tools) = setup();
        let item = hammer(&tools);
        insert_item(&conn, &item).unwrap();
        conn.execute(
            "UPDATE InventoryItems SET Price = 'n/a' WHERE ItemId = ?1",
            [item.id().to_string()],
        )
        .unwrap();

        assert_matches!(
            fetch_item(&conn, item.id()),
            Err(StoreError::Corrupt { column, value }) if column == "Price" && value == "n/a"
        );
    }
}
