//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row, Statement, params};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::AccountId,
    category::CategoryId,
    dates::month_end,
    is_foreign_key_violation,
};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a transaction.
pub type TransactionId = i64;

/// A single ledger entry: money that went out of (debit) or into (credit) an account.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// Money spent, as a positive number.
    pub debit: Option<f64>,
    /// Money received, as a positive number.
    pub credit: Option<f64>,
    pub account_id: Option<AccountId>,
    /// A primary category.
    pub category_1_id: Option<CategoryId>,
    /// A sub-category of `category_1_id`.
    pub category_2_id: Option<CategoryId>,
    /// Whether the transaction was a work expense.
    pub is_work: bool,
    pub notes: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(date: Date, description: &str) -> TransactionBuilder {
        TransactionBuilder {
            date,
            description: description.to_owned(),
            debit: None,
            credit: None,
            account_id: None,
            category_1_id: None,
            category_2_id: None,
            is_work: false,
            notes: None,
        }
    }
}

/// The fields of a [Transaction] that has not been stored yet.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// use crate::transaction::Transaction;
///
/// let builder = Transaction::build(date!(2025-01-15), "Coffee")
///     .debit(Some(4.5))
///     .account_id(Some(1));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    pub date: Date,
    pub description: String,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub account_id: Option<AccountId>,
    pub category_1_id: Option<CategoryId>,
    pub category_2_id: Option<CategoryId>,
    pub is_work: bool,
    pub notes: Option<String>,
}

impl TransactionBuilder {
    pub fn debit(mut self, debit: Option<f64>) -> Self {
        self.debit = debit;
        self
    }

    pub fn credit(mut self, credit: Option<f64>) -> Self {
        self.credit = credit;
        self
    }

    pub fn account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn category_1_id(mut self, category_1_id: Option<CategoryId>) -> Self {
        self.category_1_id = category_1_id;
        self
    }

    pub fn category_2_id(mut self, category_2_id: Option<CategoryId>) -> Self {
        self.category_2_id = category_2_id;
        self
    }

    pub fn is_work(mut self, is_work: bool) -> Self {
        self.is_work = is_work;
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

// ============================================================================
// DUPLICATE DETECTION
// ============================================================================

/// Anything that can be compared when looking for duplicate ledger entries.
pub trait LedgerEntry {
    fn entry_date(&self) -> Date;
    fn entry_description(&self) -> &str;
    fn debit_amount(&self) -> Option<f64>;
    fn credit_amount(&self) -> Option<f64>;
}

impl LedgerEntry for Transaction {
    fn entry_date(&self) -> Date {
        self.date
    }

    fn entry_description(&self) -> &str {
        &self.description
    }

    fn debit_amount(&self) -> Option<f64> {
        self.debit
    }

    fn credit_amount(&self) -> Option<f64> {
        self.credit
    }
}

impl LedgerEntry for TransactionBuilder {
    fn entry_date(&self) -> Date {
        self.date
    }

    fn entry_description(&self) -> &str {
        &self.description
    }

    fn debit_amount(&self) -> Option<f64> {
        self.debit
    }

    fn credit_amount(&self) -> Option<f64> {
        self.credit
    }
}

/// Whether `new` matches an entry in `existing`.
///
/// A match has the same date and exactly the same description, and either the
/// same debit or the same credit. Two missing amounts count as the same, so
/// two debits on the same day with the same description match even if the
/// debit amounts differ.
pub fn is_duplicate_transaction<N, E>(new: &N, existing: &[E]) -> bool
where
    N: LedgerEntry,
    E: LedgerEntry,
{
    existing.iter().any(|entry| {
        entry.entry_date() == new.entry_date()
            && entry.entry_description() == new.entry_description()
            && (entry.debit_amount() == new.debit_amount()
                || entry.credit_amount() == new.credit_amount())
    })
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str = "id, date, description, debit, credit, account_id, \
    category_1_id, category_2_id, is_work, notes";

/// Work out which reference a foreign key failure was about.
///
/// SQLite does not say which constraint failed, so the account is checked
/// first and the categories are blamed otherwise.
fn foreign_key_error(builder: &TransactionBuilder, connection: &Connection) -> Error {
    let exists = |table: &str, id: i64| -> bool {
        connection
            .query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
                [id],
                |row| row.get(0),
            )
            .unwrap_or(false)
    };

    if let Some(account_id) = builder.account_id {
        if !exists("account_map", account_id) {
            return Error::InvalidAccount(Some(account_id));
        }
    }

    let missing_category = [builder.category_1_id, builder.category_2_id]
        .into_iter()
        .flatten()
        .find(|&category_id| !exists("category", category_id));

    Error::InvalidCategory(missing_category)
}

fn map_write_error(
    error: rusqlite::Error,
    builder: &TransactionBuilder,
    connection: &Connection,
) -> Error {
    if is_foreign_key_violation(&error) {
        foreign_key_error(builder, connection)
    } else {
        error.into()
    }
}

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAccount] if the account ID does not refer to a stored account,
/// - or [Error::InvalidCategory] if a category ID does not refer to a stored category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let mut statement = prepare_insert(connection)?;

    insert_transaction(&mut statement, &builder)
        .map_err(|error| map_write_error(error, &builder, connection))
}

/// Insert many transactions and return them in the same order.
///
/// The rows are inserted one at a time, so wrap the call in a database
/// transaction if a failure part way through should leave nothing behind.
pub fn create_transactions(
    builders: Vec<TransactionBuilder>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    if builders.is_empty() {
        return Ok(Vec::new());
    }

    let mut statement = prepare_insert(connection)?;

    builders
        .iter()
        .map(|builder| {
            insert_transaction(&mut statement, builder)
                .map_err(|error| map_write_error(error, builder, connection))
        })
        .collect()
}

fn prepare_insert(connection: &Connection) -> Result<Statement<'_>, rusqlite::Error> {
    connection.prepare(&format!(
        "INSERT INTO \"transaction\" (date, description, debit, credit, account_id,
            category_1_id, category_2_id, is_work, notes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING {SELECT_COLUMNS}"
    ))
}

fn insert_transaction(
    statement: &mut Statement,
    builder: &TransactionBuilder,
) -> Result<Transaction, rusqlite::Error> {
    statement.query_row(
        params![
            builder.date,
            builder.description,
            builder.debit,
            builder.credit,
            builder.account_id,
            builder.category_1_id,
            builder.category_2_id,
            builder.is_work,
            builder.notes,
        ],
        map_transaction_row,
    )
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// All transactions, newest first.
pub fn get_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\" ORDER BY date DESC, id DESC"
        ))?
        .query_map([], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Transactions between `start` and `end`, including both days, newest first.
pub fn get_transactions_in_date_range(
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\"
            WHERE date BETWEEN ?1 AND ?2
            ORDER BY date DESC, id DESC"
        ))?
        .query_map((start, end), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Transactions in the month that starts on `month_start`, newest first.
pub fn get_transactions_in_month(
    month_start: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    get_transactions_in_date_range(month_start, month_end(month_start), connection)
}

/// The first day of every month that has at least one transaction, newest first.
pub fn get_transaction_months(connection: &Connection) -> Result<Vec<Date>, Error> {
    connection
        .prepare(
            "SELECT DISTINCT strftime('%Y-%m-01', date) AS month FROM \"transaction\"
            ORDER BY month DESC",
        )?
        .query_map([], |row| row.get(0))?
        .map(|maybe_month| maybe_month.map_err(Error::from))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Overwrite every field of the transaction with `id`.
///
/// # Errors
/// - [Error::UpdateMissingTransaction] if there is no such transaction.
/// - [Error::InvalidAccount] or [Error::InvalidCategory] for unknown references.
pub fn update_transaction(
    id: TransactionId,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE \"transaction\" SET date = ?1, description = ?2, debit = ?3, credit = ?4,
                account_id = ?5, category_1_id = ?6, category_2_id = ?7, is_work = ?8,
                notes = ?9
            WHERE id = ?10",
            params![
                builder.date,
                builder.description,
                builder.debit,
                builder.credit,
                builder.account_id,
                builder.category_1_id,
                builder.category_2_id,
                builder.is_work,
                builder.notes,
                id,
            ],
        )
        .map_err(|error| map_write_error(error, &builder, connection))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Flip the work flag of the transaction with `id` and return the new value.
///
/// # Errors
/// Returns [Error::UpdateMissingTransaction] if there is no such transaction.
pub fn toggle_is_work(id: TransactionId, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "UPDATE \"transaction\" SET is_work = NOT is_work WHERE id = ?1 RETURNING is_work",
            [id],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingTransaction,
            error => error.into(),
        })
}

/// Delete the transaction with `id`.
///
/// # Errors
/// Returns [Error::DeleteMissingTransaction] if there is no such transaction.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            debit REAL,
            credit REAL,
            account_id INTEGER REFERENCES account_map(id) ON DELETE SET NULL,
            category_1_id INTEGER REFERENCES category(id) ON DELETE SET NULL,
            category_2_id INTEGER REFERENCES category(id) ON DELETE SET NULL,
            is_work INTEGER NOT NULL DEFAULT 0,
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);
        CREATE INDEX IF NOT EXISTS idx_transaction_account ON \"transaction\"(account_id);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        date: row.get(1)?,
        description: row.get(2)?,
        debit: row.get(3)?,
        credit: row.get(4)?,
        account_id: row.get(5)?,
        category_1_id: row.get(6)?,
        category_2_id: row.get(7)?,
        is_work: row.get(8)?,
        notes: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
