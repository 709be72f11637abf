//! Default categories and account maps for a fresh database.

use rusqlite::Connection;

use crate::{
    Error,
    account::{NewAccountMap, create_account_map},
    category::{CategoryId, CategoryName, create_category, get_primary_categories},
};

/// Primary categories and the sub-categories that go under them.
const DEFAULT_CATEGORIES: [(&str, &[&str]); 8] = [
    ("Housing", &["Rent", "Mortgage"]),
    ("Transportation", &["Car Payment", "Fuel"]),
    ("Food", &["Groceries", "Restaurants"]),
    ("Utilities", &["Electricity", "Internet"]),
    ("Entertainment", &["Movies"]),
    ("Income", &["Salary"]),
    ("Savings", &["Investment"]),
    ("Work Expenses", &["Software"]),
];

/// Account numbers and their display names.
const DEFAULT_ACCOUNTS: [(&str, &str); 3] = [
    ("90593060", "Credit Card"),
    ("12345678", "Checking Account"),
    ("87654321", "Savings Account"),
];

/// Insert the default categories and account maps.
///
/// Safe to run more than once: rows that already exist are left alone.
///
/// # Errors
/// Returns an error if any insert fails for a reason other than the row
/// already existing. Nothing is written in that case.
pub fn seed_defaults(connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    seed_categories(&transaction)?;
    seed_accounts(&transaction)?;

    transaction.commit()?;

    Ok(())
}

fn seed_categories(connection: &Connection) -> Result<(), Error> {
    let existing_primaries = get_primary_categories(connection)?;

    for (primary_name, sub_names) in DEFAULT_CATEGORIES {
        let primary_id = match existing_primaries
            .iter()
            .find(|category| category.name.as_ref() == primary_name)
        {
            Some(category) => category.id,
            None => create_category(CategoryName::new_unchecked(primary_name), None, connection)?.id,
        };

        for sub_name in sub_names {
            seed_sub_category(sub_name, primary_id, connection)?;
        }
    }

    Ok(())
}

fn seed_sub_category(
    name: &str,
    parent_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    match create_category(CategoryName::new_unchecked(name), Some(parent_id), connection) {
        Ok(_) | Err(Error::DuplicateCategoryName(_)) => Ok(()),
        Err(error) => Err(error),
    }
}

fn seed_accounts(connection: &Connection) -> Result<(), Error> {
    for (account_number, display_name) in DEFAULT_ACCOUNTS {
        let account = NewAccountMap::new(account_number, display_name)?;

        match create_account_map(&account, connection) {
            Ok(_) | Err(Error::DuplicateAccountNumber(_)) => {}
            Err(error) => return Err(error),
        }
    }

    Ok(())
}
