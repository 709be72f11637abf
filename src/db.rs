//! Creating the SQLite schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, account::create_account_table, auth::create_user_table,
    budget::create_budget_table, category::create_category_table,
    transaction::create_transaction_table,
};

/// Create every table the app needs, if they do not already exist.
///
/// Foreign key enforcement is switched on for `connection` first. SQLite
/// ignores that pragma inside a transaction, so it cannot be part of the
/// batch below.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the statements fail. In that case
/// none of the tables are created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
