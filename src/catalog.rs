//! Coordinating helpers that sit above the repository: name-based
//! get-or-create for categories and suppliers, plus the tree ordering used by
//! the category screen.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    fetch_category_by_name, fetch_supplier_by_name, in_transaction, insert_category,
    insert_supplier, StoreError,
};
use crate::models::{Category, Supplier, ValidationError};

/// Resolve a category by name, creating it when absent. Supplying `parent`
/// opts in to creating the parent as well. An existing category is returned
/// as is, even if it lives under a different parent. Runs in one transaction
/// so an interruption never leaves a parent without its child.
pub fn get_or_create_category(
    conn: &Connection,
    name: &str,
    parent: Option<&str>,
) -> Result<Category, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName("Category").into());
    }
    let parent = parent.map(str::trim).filter(|parent| !parent.is_empty());

    in_transaction(conn, |conn| {
        if let Some(existing) = fetch_category_by_name(conn, name)? {
            return Ok(existing);
        }

        let parent_id = match parent {
            Some(parent) if parent.eq_ignore_ascii_case(name) => {
                return Err(StoreError::CategoryCycle {
                    category: name.to_string(),
                });
            }
            Some(parent) => Some(get_or_create_category(conn, parent, None)?.id()),
            None => None,
        };

        let category = Category::new(name, parent_id);
        insert_category(conn, &category)?;
        info!(category = %category.name, parent = ?parent, "created category on demand");
        Ok(category)
    })
}

/// Resolve a supplier by name, creating a bare record when absent.
pub fn get_or_create_supplier(conn: &Connection, name: &str) -> Result<Supplier, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName("Supplier").into());
    }

    in_transaction(conn, |conn| {
        if let Some(existing) = fetch_supplier_by_name(conn, name)? {
            return Ok(existing);
        }
        let supplier = Supplier::new(name, None, None, None);
        insert_supplier(conn, &supplier)?;
        info!(supplier = %supplier.name, "created supplier on demand");
        Ok(supplier)
    })
}

/// Depth-first ordering of `categories`: each root is followed by its
/// descendants, siblings keep their incoming order. Categories whose parent is
/// missing are treated as roots, and anything caught in a cycle is appended at
/// depth zero so no row disappears from the listing.
pub fn category_tree(categories: &[Category]) -> Vec<(usize, &Category)> {
    let known: HashSet<Uuid> = categories.iter().map(Category::id).collect();
    let mut children: HashMap<Uuid, Vec<&Category>> = HashMap::new();
    let mut roots = Vec::new();
    for category in categories {
        match category.parent_id.filter(|parent| known.contains(parent)) {
            Some(parent) => children.entry(parent).or_default().push(category),
            None => roots.push(category),
        }
    }

    let mut ordered = Vec::with_capacity(categories.len());
    let mut visited = HashSet::new();
    let mut stack: Vec<(usize, &Category)> = roots.into_iter().rev().map(|c| (0, c)).collect();
    while let Some((depth, category)) = stack.pop() {
        if !visited.insert(category.id()) {
            continue;
        }
        ordered.push((depth, category));
        if let Some(kids) = children.get(&category.id()) {
            stack.extend(kids.iter().rev().map(|kid| (depth + 1, *kid)));
        }
    }

    for category in categories {
        if !visited.contains(&category.id()) {
            ordered.push((0, category));
        }
    }
    ordered
}
