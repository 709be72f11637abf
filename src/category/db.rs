//! Database operations for categories.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    budget::delete_budget,
    category::{Category, CategoryId, CategoryName},
    is_unique_violation,
};

/// Check that `parent_id`, if given, names a stored primary category.
fn validate_parent(parent_id: Option<CategoryId>, connection: &Connection) -> Result<(), Error> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };

    match get_category(parent_id, connection) {
        Ok(parent) if parent.parent_id.is_none() => Ok(()),
        Ok(_) | Err(Error::NotFound) => Err(Error::InvalidParentCategory),
        Err(error) => Err(error),
    }
}

fn map_duplicate_name(error: rusqlite::Error, name: &CategoryName) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateCategoryName(name.to_string())
    } else {
        error.into()
    }
}

/// Create a category and return it with its generated ID.
///
/// # Errors
/// - [Error::InvalidParentCategory] if the parent is missing or is a sub-category.
/// - [Error::DuplicateCategoryName] if the name is taken under the same parent.
pub fn create_category(
    name: CategoryName,
    parent_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<Category, Error> {
    validate_parent(parent_id, connection)?;

    connection
        .execute(
            "INSERT INTO category (name, parent_id) VALUES (?1, ?2);",
            (name.as_ref(), parent_id),
        )
        .map_err(|error| map_duplicate_name(error, &name))?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name,
        parent_id,
    })
}

/// Retrieve a single category by ID.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, parent_id FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve all categories: primary categories first, then sub-categories,
/// each group ordered by name.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    query_categories(
        "SELECT id, name, parent_id FROM category
        ORDER BY parent_id IS NOT NULL, name ASC, id ASC;",
        [],
        connection,
    )
}

/// Retrieve the primary categories ordered by name.
pub fn get_primary_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    query_categories(
        "SELECT id, name, parent_id FROM category WHERE parent_id IS NULL ORDER BY name ASC;",
        [],
        connection,
    )
}

/// Retrieve the children of `parent_id` ordered by name.
pub fn get_sub_categories(
    parent_id: CategoryId,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    query_categories(
        "SELECT id, name, parent_id FROM category WHERE parent_id = ?1 ORDER BY name ASC;",
        [parent_id],
        connection,
    )
}

fn query_categories(
    sql: &str,
    params: impl rusqlite::Params,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(sql)?
        .query_map(params, map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Rename a category and move it under `parent_id`.
///
/// # Errors
/// - [Error::InvalidParentCategory] if the parent is the category itself, is
///   missing, or is a sub-category.
/// - [Error::CategoryHasSubCategories] if a category with children would become a sub-category.
/// - [Error::DuplicateCategoryName] if the name is taken under the new parent.
/// - [Error::UpdateMissingCategory] if the category doesn't exist.
///
/// A category that becomes a sub-category loses its budget.
pub fn update_category(
    category_id: CategoryId,
    name: CategoryName,
    parent_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<(), Error> {
    if parent_id == Some(category_id) {
        return Err(Error::InvalidParentCategory);
    }

    validate_parent(parent_id, connection)?;

    if parent_id.is_some() && !get_sub_categories(category_id, connection)?.is_empty() {
        return Err(Error::CategoryHasSubCategories);
    }

    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction
        .execute(
            "UPDATE category SET name = ?1, parent_id = ?2 WHERE id = ?3",
            (name.as_ref(), parent_id, category_id),
        )
        .map_err(|error| map_duplicate_name(error, &name))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    if parent_id.is_some() {
        delete_budget(category_id, &transaction)?;
    }

    transaction.commit()?;

    Ok(())
}

/// Delete a category by ID.
///
/// Sub-categories and budgets go with it. Transactions keep their rows with
/// the category cleared.
///
/// # Errors
/// Returns [Error::DeleteMissingCategory] if the category doesn't exist.
pub fn delete_category(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

/// Initialize the category table and indexes.
///
/// Names are unique per parent. Primary categories are compared with a
/// parent of 0 since SQLite treats NULLs as distinct in unique indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES category(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_category_name_parent
            ON category(name, COALESCE(parent_id, 0));
        CREATE INDEX IF NOT EXISTS idx_category_parent ON category(parent_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let parent_id = row.get(2)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        parent_id,
    })
}

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        budget::{get_all_budgets, upsert_budget},
        category::{
            Category, CategoryName, create_category, get_all_categories, get_category,
            get_primary_categories, update_category,
        },
        db::initialize,
        transaction::{Transaction, create_transaction, get_transaction},
    };

    use super::{delete_category, get_sub_categories};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn name(name: &str) -> CategoryName {
        CategoryName::new_unchecked(name)
    }

    #[test]
    fn create_primary_category_succeeds() {
        let connection = get_test_db_connection();

        let category = create_category(name("Food"), None, &connection).unwrap();

        assert!(category.id > 0);
        assert_eq!(get_category(category.id, &connection), Ok(category));
    }

    #[test]
    fn create_sub_category_succeeds() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();

        let groceries = create_category(name("Groceries"), Some(food.id), &connection).unwrap();

        assert_eq!(groceries.parent_id, Some(food.id));
    }

    #[test]
    fn create_with_missing_parent_fails() {
        let connection = get_test_db_connection();

        let result = create_category(name("Groceries"), Some(42), &connection);

        assert_eq!(result, Err(Error::InvalidParentCategory));
    }

    #[test]
    fn create_under_sub_category_fails() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let groceries = create_category(name("Groceries"), Some(food.id), &connection).unwrap();

        let result = create_category(name("Fruit"), Some(groceries.id), &connection);

        assert_eq!(result, Err(Error::InvalidParentCategory));
    }

    #[test]
    fn duplicate_primary_name_fails() {
        let connection = get_test_db_connection();
        create_category(name("Food"), None, &connection).unwrap();

        let result = create_category(name("Food"), None, &connection);

        assert_eq!(result, Err(Error::DuplicateCategoryName("Food".to_owned())));
    }

    #[test]
    fn sub_category_name_can_repeat_under_other_parents() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let work = create_category(name("Work Expenses"), None, &connection).unwrap();
        create_category(name("Other"), Some(food.id), &connection).unwrap();

        assert!(create_category(name("Other"), Some(work.id), &connection).is_ok());
        assert_eq!(
            create_category(name("Other"), Some(food.id), &connection),
            Err(Error::DuplicateCategoryName("Other".to_owned()))
        );
    }

    #[test]
    fn get_all_lists_primaries_first() {
        let connection = get_test_db_connection();
        let utilities = create_category(name("Utilities"), None, &connection).unwrap();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let internet = create_category(name("Internet"), Some(utilities.id), &connection).unwrap();
        let bakery = create_category(name("Bakery"), Some(food.id), &connection).unwrap();

        let got = get_all_categories(&connection).unwrap();

        assert_eq!(got, [food.clone(), utilities.clone(), bakery.clone(), internet.clone()]);
        assert_eq!(get_primary_categories(&connection), Ok(vec![food.clone(), utilities]));
        assert_eq!(get_sub_categories(food.id, &connection), Ok(vec![bakery]));
    }

    #[test]
    fn update_renames_and_moves() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let coffee = create_category(name("Coffee"), None, &connection).unwrap();

        update_category(coffee.id, name("Cafes"), Some(food.id), &connection).unwrap();

        assert_eq!(
            get_category(coffee.id, &connection),
            Ok(Category {
                id: coffee.id,
                name: name("Cafes"),
                parent_id: Some(food.id),
            })
        );
    }

    #[test]
    fn update_with_self_as_parent_fails() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();

        let result = update_category(food.id, name("Food"), Some(food.id), &connection);

        assert_eq!(result, Err(Error::InvalidParentCategory));
    }

    #[test]
    fn demoting_parent_with_children_fails() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let housing = create_category(name("Housing"), None, &connection).unwrap();
        create_category(name("Groceries"), Some(food.id), &connection).unwrap();

        let result = update_category(food.id, name("Food"), Some(housing.id), &connection);

        assert_eq!(result, Err(Error::CategoryHasSubCategories));
    }

    #[test]
    fn demoting_primary_removes_its_budget() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let housing = create_category(name("Housing"), None, &connection).unwrap();
        upsert_budget(food.id, 400.0, OffsetDateTime::now_utc(), &connection).unwrap();
        upsert_budget(housing.id, 1200.0, OffsetDateTime::now_utc(), &connection).unwrap();

        update_category(food.id, name("Food"), Some(housing.id), &connection).unwrap();

        let budgeted: Vec<_> = get_all_budgets(&connection)
            .unwrap()
            .into_iter()
            .map(|budget| budget.category_id)
            .collect();
        assert_eq!(budgeted, [housing.id]);
    }

    #[test]
    fn renaming_primary_keeps_its_budget() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        upsert_budget(food.id, 400.0, OffsetDateTime::now_utc(), &connection).unwrap();

        update_category(food.id, name("Groceries"), None, &connection).unwrap();

        let budgets = get_all_budgets(&connection).unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].category_id, food.id);
    }

    #[test]
    fn update_missing_category_fails() {
        let connection = get_test_db_connection();

        let result = update_category(99, name("Food"), None, &connection);

        assert_eq!(result, Err(Error::UpdateMissingCategory));
    }

    #[test]
    fn delete_cascades_to_children_and_clears_transactions() {
        let connection = get_test_db_connection();
        let food = create_category(name("Food"), None, &connection).unwrap();
        let groceries = create_category(name("Groceries"), Some(food.id), &connection).unwrap();
        let transaction = create_transaction(
            Transaction::build(date!(2025 - 01 - 01), "Supermarket")
                .debit(Some(50.0))
                .category_1_id(Some(food.id))
                .category_2_id(Some(groceries.id)),
            &connection,
        )
        .unwrap();

        delete_category(food.id, &connection).unwrap();

        assert_eq!(get_category(groceries.id, &connection), Err(Error::NotFound));
        let got = get_transaction(transaction.id, &connection).unwrap();
        assert_eq!(got.category_1_id, None);
        assert_eq!(got.category_2_id, None);
    }

    #[test]
    fn delete_missing_category_fails() {
        let connection = get_test_db_connection();

        assert_eq!(
            delete_category(1, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }
}
