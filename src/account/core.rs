//! Account maps: the display names shown for raw bank account numbers.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, is_unique_violation};

/// Database identifier for an account map.
pub type AccountId = i64;

/// A bank account number and the name the user knows it by.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountMap {
    pub id: AccountId,
    /// The identifier the bank uses, e.g. "12-3456-7890123-00".
    pub account_number: String,
    /// What to show in tables, e.g. "Everyday".
    pub display_name: String,
}

/// The validated fields of an account map that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccountMap {
    account_number: String,
    display_name: String,
}

impl NewAccountMap {
    /// Trim and check both fields.
    ///
    /// # Errors
    /// - [Error::EmptyAccountNumber] if `account_number` is blank.
    /// - [Error::EmptyDisplayName] if `display_name` is blank.
    pub fn new(account_number: &str, display_name: &str) -> Result<Self, Error> {
        let account_number = account_number.trim();
        let display_name = display_name.trim();

        if account_number.is_empty() {
            return Err(Error::EmptyAccountNumber);
        }

        if display_name.is_empty() {
            return Err(Error::EmptyDisplayName);
        }

        Ok(Self {
            account_number: account_number.to_owned(),
            display_name: display_name.to_owned(),
        })
    }
}

/// Form data for creating and editing account maps.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountFormData {
    pub account_number: String,
    pub display_name: String,
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_map (
            id INTEGER PRIMARY KEY,
            account_number TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn map_duplicate_number(error: rusqlite::Error, account_number: &str) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateAccountNumber(account_number.to_owned())
    } else {
        error.into()
    }
}

/// Insert an account map and return it with its new ID.
///
/// # Errors
/// Returns [Error::DuplicateAccountNumber] if the number is already mapped.
pub fn create_account_map(
    account: &NewAccountMap,
    connection: &Connection,
) -> Result<AccountMap, Error> {
    connection
        .execute(
            "INSERT INTO account_map (account_number, display_name) VALUES (?1, ?2)",
            (&account.account_number, &account.display_name),
        )
        .map_err(|error| map_duplicate_number(error, &account.account_number))?;

    Ok(AccountMap {
        id: connection.last_insert_rowid(),
        account_number: account.account_number.clone(),
        display_name: account.display_name.clone(),
    })
}

pub fn get_account_map(id: AccountId, connection: &Connection) -> Result<AccountMap, Error> {
    connection
        .prepare("SELECT id, account_number, display_name FROM account_map WHERE id = :id")?
        .query_row(&[(":id", &id)], map_row_to_account_map)
        .map_err(Error::from)
}

/// All account maps, sorted by display name.
pub fn get_all_account_maps(connection: &Connection) -> Result<Vec<AccountMap>, Error> {
    connection
        .prepare(
            "SELECT id, account_number, display_name FROM account_map
            ORDER BY display_name ASC, id ASC",
        )?
        .query_map([], map_row_to_account_map)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Replace the fields of the account map with `id`.
///
/// # Errors
/// - [Error::UpdateMissingAccount] if there is no such account map.
/// - [Error::DuplicateAccountNumber] if another map already uses the number.
pub fn update_account_map(
    id: AccountId,
    account: &NewAccountMap,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE account_map SET account_number = ?1, display_name = ?2 WHERE id = ?3",
            (&account.account_number, &account.display_name, id),
        )
        .map_err(|error| map_duplicate_number(error, &account.account_number))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    Ok(())
}

/// Delete the account map with `id`. Its transactions are kept without an account.
///
/// # Errors
/// Returns [Error::DeleteMissingAccount] if there is no such account map.
pub fn delete_account_map(id: AccountId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM account_map WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingAccount);
    }

    Ok(())
}

fn map_row_to_account_map(row: &Row) -> Result<AccountMap, rusqlite::Error> {
    Ok(AccountMap {
        id: row.get(0)?,
        account_number: row.get(1)?,
        display_name: row.get(2)?,
    })
}


#[cfg(test)]
mod account_map_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        db::initialize,
        transaction::{Transaction, create_transaction, get_transaction},
    };

    use super::{
        AccountMap, NewAccountMap, create_account_map, delete_account_map, get_account_map,
        get_all_account_maps, update_account_map,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn new_account(account_number: &str, display_name: &str) -> NewAccountMap {
        NewAccountMap::new(account_number, display_name).unwrap()
    }

    #[test]
    fn create_then_get() {
        let connection = get_test_connection();

        let account = create_account_map(&new_account("1234", "Everyday"), &connection).unwrap();

        assert_eq!(
            account,
            AccountMap {
                id: 1,
                account_number: "1234".to_owned(),
                display_name: "Everyday".to_owned(),
            }
        );
        assert_eq!(get_account_map(account.id, &connection), Ok(account));
    }

    #[test]
    fn create_duplicate_number_fails() {
        let connection = get_test_connection();
        create_account_map(&new_account("1234", "Everyday"), &connection).unwrap();

        let result = create_account_map(&new_account("1234", "Other"), &connection);

        assert_eq!(result, Err(Error::DuplicateAccountNumber("1234".to_owned())));
    }

    #[test]
    fn get_missing_account_is_not_found() {
        let connection = get_test_connection();

        assert_eq!(get_account_map(42, &connection), Err(Error::NotFound));
    }

    #[test]
    fn get_all_sorts_by_display_name() {
        let connection = get_test_connection();
        create_account_map(&new_account("3", "Savings"), &connection).unwrap();
        create_account_map(&new_account("1", "Credit Card"), &connection).unwrap();
        create_account_map(&new_account("2", "Everyday"), &connection).unwrap();

        let names = get_all_account_maps(&connection)
            .unwrap()
            .into_iter()
            .map(|account| account.display_name)
            .collect::<Vec<_>>();

        assert_eq!(names, ["Credit Card", "Everyday", "Savings"]);
    }

    #[test]
    fn update_replaces_fields() {
        let connection = get_test_connection();
        let account = create_account_map(&new_account("1234", "Everyday"), &connection).unwrap();

        update_account_map(account.id, &new_account("5678", "Bills"), &connection).unwrap();

        let got = get_account_map(account.id, &connection).unwrap();
        assert_eq!(got.account_number, "5678");
        assert_eq!(got.display_name, "Bills");
    }

    #[test]
    fn update_missing_account_fails() {
        let connection = get_test_connection();

        let result = update_account_map(1, &new_account("1234", "Everyday"), &connection);

        assert_eq!(result, Err(Error::UpdateMissingAccount));
    }

    #[test]
    fn update_to_existing_number_fails() {
        let connection = get_test_connection();
        create_account_map(&new_account("1234", "Everyday"), &connection).unwrap();
        let other = create_account_map(&new_account("5678", "Bills"), &connection).unwrap();

        let result = update_account_map(other.id, &new_account("1234", "Bills"), &connection);

        assert_eq!(result, Err(Error::DuplicateAccountNumber("1234".to_owned())));
    }

    #[test]
    fn delete_missing_account_fails() {
        let connection = get_test_connection();

        assert_eq!(
            delete_account_map(1, &connection),
            Err(Error::DeleteMissingAccount)
        );
    }

    #[test]
    fn delete_keeps_transactions_without_account() {
        let connection = get_test_connection();
        let account = create_account_map(&new_account("1234", "Everyday"), &connection).unwrap();
        let transaction = create_transaction(
            Transaction::build(date!(2025 - 01 - 01), "Coffee")
                .debit(Some(4.5))
                .account_id(Some(account.id)),
            &connection,
        )
        .unwrap();

        delete_account_map(account.id, &connection).unwrap();

        let got = get_transaction(transaction.id, &connection).unwrap();
        assert_eq!(got.account_id, None);
        assert_eq!(get_account_map(account.id, &connection), Err(Error::NotFound));
    }
}
