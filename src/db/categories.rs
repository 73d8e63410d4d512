use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Category;

use super::columns::{optional_uuid_at, uuid_at};
use super::connection::in_transaction;
use super::error::{constraint_violation, Constraint, StoreError};

/// Recursion guard for ancestor walks. Real trees are a handful of levels deep;
/// the cap only matters if a cycle slipped in through an external tool.
const MAX_DEPTH: i64 = 64;

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category::with_id(
        uuid_at(row, 0)?,
        row.get::<_, String>(1)?,
        optional_uuid_at(row, 2)?,
    ))
}

fn map_category_write(err: rusqlite::Error, category: &Category) -> StoreError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => StoreError::duplicate("Category", &category.name),
        Some(Constraint::ForeignKey) => match category.parent_id {
            Some(parent) => StoreError::missing("Parent category", parent),
            None => err.into(),
        },
        _ => err.into(),
    }
}

/// Insert a category. Names are unique (case-insensitively), must be trimmed
/// and non-blank, and the parent, if any, must already exist.
pub fn insert_category(conn: &Connection, category: &Category) -> Result<(), StoreError> {
    category.validate()?;
    if category.parent_id == Some(category.id()) {
        return Err(StoreError::CategoryCycle {
            category: category.name.clone(),
        });
    }

    conn.execute(
        "INSERT INTO Categories (CategoryId, CategoryName, ParentId) VALUES (?1, ?2, ?3)",
        params![
            category.id().to_string(),
            category.name,
            category.parent_id.map(|id| id.to_string()),
        ],
    )
    .map_err(|err| map_category_write(err, category))?;

    info!(category_id = %category.id(), name = %category.name, "inserted category");
    Ok(())
}

/// All categories sorted by name. Use `catalog::category_tree` for a
/// hierarchical ordering.
pub fn fetch_categories(conn: &Connection) -> Result<Vec<Category>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT CategoryId, CategoryName, ParentId
         FROM Categories
         ORDER BY CategoryName COLLATE NOCASE",
    )?;

    let categories = stmt
        .query_map([], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(categories)
}

pub fn fetch_category(conn: &Connection, id: Uuid) -> Result<Option<Category>, StoreError> {
    let category = conn
        .query_row(
            "SELECT CategoryId, CategoryName, ParentId FROM Categories WHERE CategoryId = ?1",
            [id.to_string()],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

/// Case-insensitive lookup by name.
pub fn fetch_category_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Category>, StoreError> {
    let category = conn
        .query_row(
            "SELECT CategoryId, CategoryName, ParentId FROM Categories WHERE CategoryName = ?1",
            [name.trim()],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

/// Whether `candidate` is `start` itself or one of its ancestors.
fn is_self_or_ancestor(conn: &Connection, candidate: Uuid, start: Uuid) -> Result<bool, StoreError> {
    let found = conn.query_row(
        "WITH RECURSIVE chain(id, depth) AS (
             SELECT ?1, 0
             UNION
             SELECT c.ParentId, chain.depth + 1
             FROM Categories c JOIN chain ON c.CategoryId = chain.id
             WHERE c.ParentId IS NOT NULL AND chain.depth < ?3
         )
         SELECT EXISTS(SELECT 1 FROM chain WHERE id = ?2)",
        params![start.to_string(), candidate.to_string(), MAX_DEPTH],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Rename or re-parent a category. Moving a category beneath one of its own
/// descendants fails with `CategoryCycle`. Returns `false` when the category
/// does not exist.
pub fn update_category(conn: &Connection, category: &Category) -> Result<bool, StoreError> {
    category.validate()?;
    in_transaction(conn, |conn| {
        if let Some(parent) = category.parent_id {
            // Walking up from the new parent must never reach the category.
            if is_self_or_ancestor(conn, category.id(), parent)? {
                return Err(StoreError::CategoryCycle {
                    category: category.name.clone(),
                });
            }
        }

        let updated = conn
            .execute(
                "UPDATE Categories SET CategoryName = ?1, ParentId = ?2 WHERE CategoryId = ?3",
                params![
                    category.name,
                    category.parent_id.map(|id| id.to_string()),
                    category.id().to_string(),
                ],
            )
            .map_err(|err| map_category_write(err, category))?;
        Ok(updated > 0)
    })
}

/// Delete a category that nothing depends on. Items and subcategories keep a
/// category alive; the caller has to move or delete them first.
pub fn delete_category(conn: &Connection, id: Uuid) -> Result<bool, StoreError> {
    in_transaction(conn, |conn| {
        let Some(category) = fetch_category(conn, id)? else {
            return Ok(false);
        };
        let key = id.to_string();

        let items: i64 = conn.query_row(
            "SELECT COUNT(*) FROM InventoryItems WHERE CategoryId = ?1",
            [&key],
            |row| row.get(0),
        )?;
        let children: i64 = conn.query_row(
            "SELECT COUNT(*) FROM Categories WHERE ParentId = ?1",
            [&key],
            |row| row.get(0),
        )?;

        if items > 0 || children > 0 {
            warn!(category = %category.name, items, children, "refused to delete category in use");
            return Err(StoreError::InUse {
                entity: "Category",
                key: category.name,
                dependents: describe_dependents(items, children),
            });
        }

        conn.execute("DELETE FROM Categories WHERE CategoryId = ?1", [&key])?;
        info!(category_id = %id, "deleted category");
        Ok(true)
    })
}

fn describe_dependents(items: i64, children: i64) -> String {
    let items = match items {
        0 => None,
        1 => Some("1 item".to_string()),
        n => Some(format!("{n} items")),
    };
    let children = match children {
        0 => None,
        1 => Some("1 subcategory".to_string()),
        n => Some(format!("{n} subcategories")),
    };
    items.into_iter().chain(children).collect::<Vec<_>>().join(" and ")
}

/// Root-to-leaf display path such as `Tools / Hand Tools`. `None` when the
/// category does not exist.
pub fn category_path(conn: &Connection, id: Uuid) -> Result<Option<String>, StoreError> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE chain(id, name, parent, depth) AS (
             SELECT CategoryId, CategoryName, ParentId, 0 FROM Categories WHERE CategoryId = ?1
             UNION ALL
             SELECT c.CategoryId, c.CategoryName, c.ParentId, chain.depth + 1
             FROM Categories c JOIN chain ON c.CategoryId = chain.parent
             WHERE chain.depth < ?2
         )
         SELECT name FROM chain ORDER BY depth DESC",
    )?;

    let names = stmt
        .query_map(params![id.to_string(), MAX_DEPTH], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if names.is_empty() {
        Ok(None)
    } else {
        Ok(Some(names.join(" / ")))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{insert_item, open_in_memory};
    use crate::catalog::get_or_create_category;
    use crate::models::{InventoryItem, ValidationError};

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let conn = open_in_memory().unwrap();
        insert_category(&conn, &Category::new("Tools", None)).unwrap();

        assert_matches!(
            insert_category(&conn, &Category::new("Tools", None)),
            Err(StoreError::DuplicateKey { entity: "Category", .. })
        );
        assert_matches!(
            insert_category(&conn, &Category::new("tools", None)),
            Err(StoreError::DuplicateKey { .. })
        );
    }

    #[test]
    fn lookup_by_name_ignores_case() {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        insert_category(&conn, &tools).unwrap();

        assert_eq!(fetch_category_by_name(&conn, "TOOLS").unwrap(), Some(tools));
        assert_eq!(fetch_category_by_name(&conn, "Paint").unwrap(), None);
    }

    #[test]
    fn padded_names_are_stored_trimmed_and_found_again() {
        let conn = open_in_memory().unwrap();
        let tools = Category::new(" Tools ", None);
        insert_category(&conn, &tools).unwrap();

        assert_eq!(fetch_category_by_name(&conn, " Tools ").unwrap(), Some(tools.clone()));
        assert_eq!(get_or_create_category(&conn, "Tools", None).unwrap(), tools);
        assert_eq!(fetch_categories(&conn).unwrap().len(), 1);
    }

    #[test]
    fn blank_or_untrimmed_names_are_invalid_input() {
        let conn = open_in_memory().unwrap();
        assert_matches!(
            insert_category(&conn, &Category::new("", None)),
            Err(StoreError::InvalidInput(ValidationError::EmptyName("Category")))
        );

        let mut tools = Category::new("Tools", None);
        insert_category(&conn, &tools).unwrap();
        tools.name = "Tools ".into();
        assert_matches!(
            update_category(&conn, &tools),
            Err(StoreError::InvalidInput(ValidationError::UntrimmedName("Category")))
        );
        tools.name = " ".into();
        assert_matches!(
            update_category(&conn, &tools),
            Err(StoreError::InvalidInput(ValidationError::EmptyName("Category")))
        );
        assert!(fetch_categories(&conn).unwrap().iter().all(|c| c.name == "Tools"));
    }

    #[test]
    fn missing_parent_is_a_foreign_key_violation() {
        let conn = open_in_memory().unwrap();
        let orphan = Category::new("Orphan", Some(Uuid::new_v4()));
        assert_matches!(
            insert_category(&conn, &orphan),
            Err(StoreError::ForeignKeyViolation { entity: "Parent category", .. })
        );
    }

    #[test]
    fn category_cannot_be_its_own_parent() {
        let conn = open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let looped = Category::with_id(id, "Loop", Some(id));
        assert_matches!(
            insert_category(&conn, &looped),
            Err(StoreError::CategoryCycle { .. })
        );
    }

    #[test]
    fn reparenting_under_a_descendant_is_rejected() {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        let hand = Category::new("Hand Tools", Some(tools.id()));
        let saws = Category::new("Saws", Some(hand.id()));
        for category in [&tools, &hand, &saws] {
            insert_category(&conn, category).unwrap();
        }

        let mut moved = tools.clone();
        moved.parent_id = Some(saws.id());
        assert_matches!(
            update_category(&conn, &moved),
            Err(StoreError::CategoryCycle { .. })
        );
        assert_eq!(fetch_category(&conn, tools.id()).unwrap(), Some(tools));
    }

    #[test]
    fn update_renames_and_reparents() {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        let mut saws = Category::new("Saws", None);
        insert_category(&conn, &tools).unwrap();
        insert_category(&conn, &saws).unwrap();

        saws.name = "Hand Saws".into();
        saws.parent_id = Some(tools.id());
        assert!(update_category(&conn, &saws).unwrap());
        assert_eq!(
            category_path(&conn, saws.id()).unwrap().as_deref(),
            Some("Tools / Hand Saws")
        );

        assert!(!update_category(&conn, &Category::new("Ghost", None)).unwrap());
    }

    #[test]
    fn path_of_unknown_category_is_none() {
        let conn = open_in_memory().unwrap();
        assert_eq!(category_path(&conn, Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn delete_is_restricted_while_in_use() {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        let hand = Category::new("Hand Tools", Some(tools.id()));
        insert_category(&conn, &tools).unwrap();
        insert_category(&conn, &hand).unwrap();

        assert_matches!(
            delete_category(&conn, tools.id()),
            Err(StoreError::InUse { dependents, .. }) if dependents == "1 subcategory"
        );

        let item = InventoryItem::new("Pliers", hand.id(), 1, Decimal::ONE, None, None);
        insert_item(&conn, &item).unwrap();
        assert_matches!(
            delete_category(&conn, hand.id()),
            Err(StoreError::InUse { dependents, .. }) if dependents == "1 item"
        );
    }

    #[test]
    fn delete_removes_unused_category() {
        let conn = open_in_memory().unwrap();
        let paint = Category::new("Paint", None);
        insert_category(&conn, &paint).unwrap();

        assert!(delete_category(&conn, paint.id()).unwrap());
        assert!(!delete_category(&conn, paint.id()).unwrap());
        assert!(fetch_categories(&conn).unwrap().is_empty());
    }

    #[test]
    fn dependents_description_pluralizes() {
        assert_eq!(describe_dependents(2, 0), "2 items");
        assert_eq!(describe_dependents(0, 3), "3 subcategories");
        assert_eq!(describe_dependents(1, 2), "1 item and 2 subcategories");
    }
}
