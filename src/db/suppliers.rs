use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{InventoryItem, Supplier};

use super::columns::uuid_at;
use super::connection::in_transaction;
use super::error::{constraint_violation, Constraint, StoreError};
use super::items::item_from_row;

const SUPPLIER_COLUMNS: &str = "SupplierId, SupplierName, Website, Phone, Email";

fn supplier_from_row(row: &Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier::with_id(
        uuid_at(row, 0)?,
        row.get::<_, String>(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn map_supplier_write(err: rusqlite::Error, supplier: &Supplier) -> StoreError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => StoreError::duplicate("Supplier", &supplier.name),
        _ => err.into(),
    }
}

/// Insert a supplier. Names are unique, compared case-insensitively. Contact
/// fields are stored exactly as the record holds them.
pub fn insert_supplier(conn: &Connection, supplier: &Supplier) -> Result<(), StoreError> {
    supplier.validate()?;
    conn.execute(
        "INSERT INTO Suppliers (SupplierId, SupplierName, Website, Phone, Email)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            supplier.id().to_string(),
            supplier.name,
            supplier.website,
            supplier.phone,
            supplier.email,
        ],
    )
    .map_err(|err| map_supplier_write(err, supplier))?;

    info!(supplier_id = %supplier.id(), name = %supplier.name, "inserted supplier");
    Ok(())
}

pub fn fetch_suppliers(conn: &Connection) -> Result<Vec<Supplier>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM Suppliers ORDER BY SupplierName COLLATE NOCASE"
    ))?;

    let suppliers = stmt
        .query_map([], supplier_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(suppliers)
}

pub fn fetch_supplier(conn: &Connection, id: Uuid) -> Result<Option<Supplier>, StoreError> {
    let supplier = conn
        .query_row(
            &format!("SELECT {SUPPLIER_COLUMNS} FROM Suppliers WHERE SupplierId = ?1"),
            [id.to_string()],
            supplier_from_row,
        )
        .optional()?;
    Ok(supplier)
}

pub fn fetch_supplier_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Supplier>, StoreError> {
    let supplier = conn
        .query_row(
            &format!("SELECT {SUPPLIER_COLUMNS} FROM Suppliers WHERE SupplierName = ?1"),
            [name.trim()],
            supplier_from_row,
        )
        .optional()?;
    Ok(supplier)
}

/// Overwrite the stored supplier. Returns `false` when it does not exist.
pub fn update_supplier(conn: &Connection, supplier: &Supplier) -> Result<bool, StoreError> {
    supplier.validate()?;
    let updated = conn
        .execute(
            "UPDATE Suppliers SET SupplierName = ?1, Website = ?2, Phone = ?3, Email = ?4
             WHERE SupplierId = ?5",
            params![
                supplier.name,
                supplier.website,
                supplier.phone,
                supplier.email,
                supplier.id().to_string(),
            ],
        )
        .map_err(|err| map_supplier_write(err, supplier))?;
    Ok(updated > 0)
}

/// Remove a supplier together with its item links.
pub fn delete_supplier(conn: &Connection, id: Uuid) -> Result<bool, StoreError> {
    let key = id.to_string();
    let deleted = in_transaction(conn, |conn| {
        conn.execute("DELETE FROM ItemSuppliers WHERE SupplierId = ?1", [&key])?;
        Ok(conn.execute("DELETE FROM Suppliers WHERE SupplierId = ?1", [&key])?)
    })?;

    if deleted > 0 {
        info!(supplier_id = %id, "deleted supplier");
    }
    Ok(deleted > 0)
}

fn exists(conn: &Connection, sql: &str, id: Uuid) -> Result<bool, StoreError> {
    Ok(conn.query_row(sql, [id.to_string()], |row| row.get(0))?)
}

/// Link an item to a supplier. Both rows must exist. Linking a pair that is
/// already linked changes nothing and returns `false`.
pub fn associate_item_with_supplier(
    conn: &Connection,
    item_id: Uuid,
    supplier_id: Uuid,
) -> Result<bool, StoreError> {
    in_transaction(conn, |conn| {
        if !exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM InventoryItems WHERE ItemId = ?1)",
            item_id,
        )? {
            return Err(StoreError::missing("Item", item_id));
        }
        if !exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM Suppliers WHERE SupplierId = ?1)",
            supplier_id,
        )? {
            return Err(StoreError::missing("Supplier", supplier_id));
        }

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO ItemSuppliers (ItemId, SupplierId) VALUES (?1, ?2)",
            params![item_id.to_string(), supplier_id.to_string()],
        )?;
        debug!(%item_id, %supplier_id, inserted, "linked item to supplier");
        Ok(inserted > 0)
    })
}

/// Remove a link. Returns `false` if the pair was never linked.
pub fn dissociate_item_from_supplier(
    conn: &Connection,
    item_id: Uuid,
    supplier_id: Uuid,
) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM ItemSuppliers WHERE ItemId = ?1 AND SupplierId = ?2",
        params![item_id.to_string(), supplier_id.to_string()],
    )?;
    Ok(deleted > 0)
}

/// Items linked to a supplier. The inner join skips links whose item row is
/// gone.
pub fn fetch_items_by_supplier(
    conn: &Connection,
    supplier_id: Uuid,
) -> Result<Vec<InventoryItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT i.ItemId, i.ItemName, i.CategoryId, i.Quantity, i.Price, i.MinStock, i.MaxStock
         FROM InventoryItems i
         INNER JOIN ItemSuppliers s ON s.ItemId = i.ItemId
         WHERE s.SupplierId = ?1
         ORDER BY i.ItemName COLLATE NOCASE, i.ItemId",
    )?;

    let items = stmt
        .query_map([supplier_id.to_string()], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

pub fn fetch_suppliers_for_item(
    conn: &Connection,
    item_id: Uuid,
) -> Result<Vec<Supplier>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.SupplierId, s.SupplierName, s.Website, s.Phone, s.Email
         FROM Suppliers s
         INNER JOIN ItemSuppliers l ON l.SupplierId = s.SupplierId
         WHERE l.ItemId = ?1
         ORDER BY s.SupplierName COLLATE NOCASE",
    )?;

    let suppliers = stmt
        .query_map([item_id.to_string()], supplier_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(suppliers)
}

/// Drop links that point at a missing item or supplier. Returns how many rows
/// were removed.
pub fn purge_orphaned_associations(conn: &Connection) -> Result<usize, StoreError> {
    let purged = conn.execute(
        "DELETE FROM ItemSuppliers
         WHERE ItemId NOT IN (SELECT ItemId FROM InventoryItems)
            OR SupplierId NOT IN (SELECT SupplierId FROM Suppliers)",
        [],
    )?;
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{delete_item, insert_category, insert_item, open_in_memory};
    use crate::models::{Category, ValidationError};

    struct Fixture {
        conn: Connection,
        hammer: InventoryItem,
        acme: Supplier,
    }

    fn fixture() -> Fixture {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        insert_category(&conn, &tools).unwrap();
        let hammer = InventoryItem::new("Hammer", tools.id(), 10, Decimal::new(999, 2), None, None);
        insert_item(&conn, &hammer).unwrap();
        let acme = Supplier::new("Acme", Some("https://acme.test".into()), None, None);
        insert_supplier(&conn, &acme).unwrap();
        Fixture { conn, hammer, acme }
    }

    fn link_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM ItemSuppliers", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn duplicate_supplier_name_is_rejected() {
        let f = fixture();
        assert_matches!(
            insert_supplier(&f.conn, &Supplier::new("ACME", None, None, None)),
            Err(StoreError::DuplicateKey { entity: "Supplier", .. })
        );
    }

    #[test]
    fn stored_supplier_matches_the_record_inserted() {
        let f = fixture();
        let bolt = Supplier::new(
            "Bolt Co",
            Some(" bolt.test ".into()),
            Some("".into()),
            Some("sales@bolt.test".into()),
        );
        insert_supplier(&f.conn, &bolt).unwrap();
        assert_eq!(fetch_supplier(&f.conn, bolt.id()).unwrap().as_ref(), Some(&bolt));

        // Edited fields bypass the constructor and are kept verbatim.
        let mut edited = bolt.clone();
        edited.phone = Some(String::new());
        edited.website = Some(" bolt.test ".into());
        assert!(update_supplier(&f.conn, &edited).unwrap());
        assert_eq!(fetch_supplier(&f.conn, bolt.id()).unwrap(), Some(edited));
    }

    #[test]
    fn supplier_names_are_validated_before_writing() {
        let f = fixture();
        assert_matches!(
            insert_supplier(&f.conn, &Supplier::new("  ", None, None, None)),
            Err(StoreError::InvalidInput(ValidationError::EmptyName("Supplier")))
        );

        let padded = Supplier::new(" Bolt Co ", None, None, None);
        insert_supplier(&f.conn, &padded).unwrap();
        assert_eq!(
            fetch_supplier_by_name(&f.conn, " bolt co ").unwrap(),
            Some(padded.clone())
        );

        let mut renamed = padded.clone();
        renamed.name = "Bolt Co ".into();
        assert_matches!(
            update_supplier(&f.conn, &renamed),
            Err(StoreError::InvalidInput(ValidationError::UntrimmedName("Supplier")))
        );
    }

    #[test]
    fn association_requires_existing_rows() {
        let f = fixture();
        assert_matches!(
            associate_item_with_supplier(&f.conn, Uuid::new_v4(), f.acme.id()),
            Err(StoreError::ForeignKeyViolation { entity: "Item", .. })
        );
        assert_matches!(
            associate_item_with_supplier(&f.conn, f.hammer.id(), Uuid::new_v4()),
            Err(StoreError::ForeignKeyViolation { entity: "Supplier", .. })
        );
        assert_eq!(link_count(&f.conn), 0);
    }

    #[test]
    fn relinking_the_same_pair_is_a_no_op() {
        let f = fixture();
        assert!(associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap());
        assert!(!associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap());
        assert_eq!(link_count(&f.conn), 1);
    }

    #[test]
    fn items_by_supplier_returns_linked_items() {
        let f = fixture();
        associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap();

        let items = fetch_items_by_supplier(&f.conn, f.acme.id()).unwrap();
        assert_eq!(items, vec![f.hammer.clone()]);
        let suppliers = fetch_suppliers_for_item(&f.conn, f.hammer.id()).unwrap();
        assert_eq!(suppliers, vec![f.acme.clone()]);
    }

    #[test]
    fn deleting_an_item_drops_its_links() {
        let f = fixture();
        associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap();
        delete_item(&f.conn, f.hammer.id()).unwrap();

        assert_eq!(link_count(&f.conn), 0);
        assert!(fetch_items_by_supplier(&f.conn, f.acme.id()).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_supplier_drops_its_links() {
        let f = fixture();
        associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap();
        assert!(delete_supplier(&f.conn, f.acme.id()).unwrap());
        assert_eq!(link_count(&f.conn), 0);
        assert!(!delete_supplier(&f.conn, f.acme.id()).unwrap());
    }

    #[test]
    fn dissociate_reports_whether_a_link_existed() {
        let f = fixture();
        associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap();
        assert!(dissociate_item_from_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap());
        assert!(!dissociate_item_from_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap());
    }

    #[test]
    fn purge_removes_dangling_links() {
        let f = fixture();
        associate_item_with_supplier(&f.conn, f.hammer.id(), f.acme.id()).unwrap();
        f.conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
        f.conn
            .execute(
                "DELETE FROM InventoryItems WHERE ItemId = ?1",
                [f.hammer.id().to_string()],
            )
            .unwrap();

        assert_eq!(purge_orphaned_associations(&f.conn).unwrap(), 1);
        assert_eq!(link_count(&f.conn), 0);
    }

    #[test]
    fn update_supplier_overwrites_contact_details() {
        let f = fixture();
        let mut acme = f.acme.clone();
        acme.email = Some("orders@acme.test".into());
        acme.website = None;
        assert!(update_supplier(&f.conn, &acme).unwrap());
        assert_eq!(fetch_supplier(&f.conn, acme.id()).unwrap(), Some(acme));
    }
}
