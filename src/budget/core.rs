//! Monthly spending limits on primary categories.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{CategoryId, CategoryKind, get_category},
};

/// Database identifier for a budget.
pub type BudgetId = i64;

/// How much may be spent on a primary category each month.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub id: BudgetId,
    /// The primary category the limit applies to.
    pub category_id: CategoryId,
    /// The most that should be spent per month, never negative.
    pub monthly_limit: f64,
    /// When the budget was first saved, in UTC.
    pub created_at: OffsetDateTime,
    /// When the limit was last changed, in UTC.
    pub updated_at: OffsetDateTime,
}

pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL UNIQUE,
            monthly_limit REAL NOT NULL CHECK (monthly_limit >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Set the monthly limit of `category_id`, creating the budget if there is none yet.
///
/// `now` becomes `updated_at`, and also `created_at` for a new budget.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeBudgetLimit] if `monthly_limit` is negative or not a number,
/// - [Error::InvalidBudgetCategory] if `category_id` is not a stored primary category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_budget(
    category_id: CategoryId,
    monthly_limit: f64,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Budget, Error> {
    if !monthly_limit.is_finite() || monthly_limit < 0.0 {
        return Err(Error::NegativeBudgetLimit);
    }

    match get_category(category_id, connection) {
        Ok(category) if category.kind() == CategoryKind::Primary => {}
        Ok(_) | Err(Error::NotFound) => return Err(Error::InvalidBudgetCategory(category_id)),
        Err(error) => return Err(error),
    }

    connection
        .prepare(
            "INSERT INTO budget (category_id, monthly_limit, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(category_id) DO UPDATE SET
                monthly_limit = excluded.monthly_limit,
                updated_at = excluded.updated_at
            RETURNING id, category_id, monthly_limit, created_at, updated_at",
        )?
        .query_row((category_id, monthly_limit, now), map_budget_row)
        .map_err(Error::from)
}

/// Remove the budget of `category_id`, if it has one.
///
/// Used when a primary category becomes a sub-category, since only primary
/// categories can carry a budget.
pub fn delete_budget(category_id: CategoryId, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM budget WHERE category_id = ?1", [category_id])?;

    Ok(())
}

/// Every stored budget, ordered by category.
pub fn get_all_budgets(connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, category_id, monthly_limit, created_at, updated_at
            FROM budget ORDER BY category_id",
        )?
        .query_map([], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        category_id: row.get(1)?,
        monthly_limit: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod budget_tests {
    use rusqlite::Connection;
    use time::{Duration, macros::datetime};

    use crate::{
        Error,
        category::{Category, CategoryName, create_category, delete_category},
        db::initialize,
    };

    use super::{get_all_budgets, upsert_budget};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn create_primary(name: &str, connection: &Connection) -> Category {
        create_category(CategoryName::new_unchecked(name), None, connection).unwrap()
    }

    #[test]
    fn upsert_inserts_new_budget() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);
        let now = datetime!(2025-01-15 10:00 UTC);

        let budget = upsert_budget(food.id, 400.0, now, &connection).unwrap();

        assert_eq!(budget.category_id, food.id);
        assert_eq!(budget.monthly_limit, 400.0);
        assert_eq!(budget.created_at, now);
        assert_eq!(budget.updated_at, now);
        assert_eq!(get_all_budgets(&connection), Ok(vec![budget]));
    }

    #[test]
    fn upsert_updates_existing_budget() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);
        let created_at = datetime!(2025-01-15 10:00 UTC);
        let updated_at = created_at + Duration::days(3);
        let original = upsert_budget(food.id, 400.0, created_at, &connection).unwrap();

        let updated = upsert_budget(food.id, 350.5, updated_at, &connection).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.monthly_limit, 350.5);
        assert_eq!(updated.created_at, created_at);
        assert_eq!(updated.updated_at, updated_at);
        assert_eq!(get_all_budgets(&connection).unwrap().len(), 1);
    }

    #[test]
    fn zero_limit_is_allowed() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);

        let budget = upsert_budget(food.id, 0.0, datetime!(2025-01-15 10:00 UTC), &connection);

        assert_eq!(budget.map(|budget| budget.monthly_limit), Ok(0.0));
    }

    #[test]
    fn negative_limit_is_rejected() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);

        let result = upsert_budget(food.id, -0.01, datetime!(2025-01-15 10:00 UTC), &connection);

        assert_eq!(result, Err(Error::NegativeBudgetLimit));
        assert_eq!(get_all_budgets(&connection), Ok(vec![]));
    }

    #[test]
    fn sub_category_is_rejected() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);
        let groceries = create_category(
            CategoryName::new_unchecked("Groceries"),
            Some(food.id),
            &connection,
        )
        .unwrap();

        let result = upsert_budget(groceries.id, 10.0, datetime!(2025-01-15 10:00 UTC), &connection);

        assert_eq!(result, Err(Error::InvalidBudgetCategory(groceries.id)));
    }

    #[test]
    fn missing_category_is_rejected() {
        let connection = get_test_connection();

        let result = upsert_budget(42, 10.0, datetime!(2025-01-15 10:00 UTC), &connection);

        assert_eq!(result, Err(Error::InvalidBudgetCategory(42)));
    }

    #[test]
    fn deleting_category_deletes_budget() {
        let connection = get_test_connection();
        let food = create_primary("Food", &connection);
        let housing = create_primary("Housing", &connection);
        let now = datetime!(2025-01-15 10:00 UTC);
        upsert_budget(food.id, 400.0, now, &connection).unwrap();
        let kept = upsert_budget(housing.id, 1500.0, now, &connection).unwrap();

        delete_category(food.id, &connection).unwrap();

        assert_eq!(get_all_budgets(&connection), Ok(vec![kept]));
    }
}
