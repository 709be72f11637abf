//! Lists the account maps and how many transactions each one has.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::{AccountId, AccountMap, get_all_account_maps},
    endpoints::{self, format_endpoint},
    html::{
        ACCOUNT_BADGE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, edit_delete_action_links,
    },
    navigation::NavBar,
};

/// The state needed for the [get_accounts_page](crate::account::get_accounts_page) route handler.
#[derive(Debug, Clone)]
pub struct AccountsPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The account data to display in the view
#[derive(Debug, PartialEq)]
struct AccountTableRow {
    account_number: String,
    display_name: String,
    transaction_count: u32,
    edit_url: String,
    delete_url: String,
}

impl AccountTableRow {
    fn new(account: AccountMap, transaction_count: u32) -> Self {
        Self {
            edit_url: format_endpoint(endpoints::EDIT_ACCOUNT_VIEW, account.id),
            delete_url: format_endpoint(endpoints::ACCOUNT, account.id),
            account_number: account.account_number,
            display_name: account.display_name,
            transaction_count,
        }
    }

    fn confirm_message(&self) -> String {
        format!(
            "Are you sure you want to delete the account '{}'? \
            Its {} transaction(s) will be kept without an account.",
            self.display_name, self.transaction_count
        )
    }
}

/// Renders the accounts page showing all account maps.
pub async fn get_accounts_page(
    State(state): State<AccountsPageState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let accounts = get_all_account_maps(&connection)
        .inspect_err(|error| tracing::error!("could not get all accounts: {error}"))?;
    let transactions_per_account = count_transactions_per_account(&connection)
        .inspect_err(|error| tracing::error!("could not count transactions per account: {error}"))?;

    let rows = accounts
        .into_iter()
        .map(|account| {
            let transaction_count = *transactions_per_account.get(&account.id).unwrap_or(&0);
            AccountTableRow::new(account, transaction_count)
        })
        .collect::<Vec<_>>();

    Ok(accounts_view(&rows).into_response())
}

fn count_transactions_per_account(
    connection: &Connection,
) -> Result<HashMap<AccountId, u32>, Error> {
    let result: Result<HashMap<AccountId, u32>, rusqlite::Error> = connection
        .prepare(
            "SELECT account_id, COUNT(1) FROM \"transaction\"
            WHERE account_id IS NOT NULL GROUP BY account_id",
        )?
        .query_map((), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect();

    result.map_err(Error::from)
}

fn accounts_view(accounts: &[AccountTableRow]) -> Markup {
    let create_account_page_url = endpoints::NEW_ACCOUNT_VIEW;
    let nav_bar = NavBar::new(endpoints::ACCOUNTS_VIEW).into_html();

    let table_row = |account: &AccountTableRow| {
        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                th
                    scope="row"
                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                {
                    span class=(ACCOUNT_BADGE_STYLE) { (account.display_name) }
                }

                td class=(TABLE_CELL_STYLE) { (account.account_number) }

                td class="px-6 py-4 text-right tabular-nums" { (account.transaction_count) }

                td class=(TABLE_CELL_STYLE)
                {
                    div class="flex gap-4"
                    {
                        (edit_delete_action_links(
                            &account.edit_url,
                            &account.delete_url,
                            &account.confirm_message(),
                            "closest tr",
                            "delete",
                        ))
                    }
                }
            }
        )
    };

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Accounts" }

                    a href=(create_account_page_url) class=(LINK_STYLE)
                    {
                        "Add Account"
                    }
                }

                (accounts_cards_view(accounts, create_account_page_url))

                section class="hidden lg:block w-full overflow-x-auto lg:overflow-visible dark:bg-gray-800 lg:max-w-5xl lg:w-full lg:mx-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Account Number" }
                                th scope="col" class="px-6 py-3 text-right" { "Transactions" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody
                        {
                            @for account in accounts {
                                (table_row(account))
                            }

                            @if accounts.is_empty() {
                                tr
                                {
                                    td
                                        colspan="4"
                                        class="px-6 py-4 text-center
                                            text-gray-500 dark:text-gray-400"
                                    {
                                        "No accounts found. Create an account "
                                        a href=(create_account_page_url) class=(LINK_STYLE)
                                        {
                                            "here"
                                        }
                                        "."
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Accounts", &[], &content)
}

fn accounts_cards_view(accounts: &[AccountTableRow], create_account_page_url: &str) -> Markup {
    html!(
        ul class="lg:hidden space-y-4"
        {
            @for account in accounts {
                li class="rounded border border-gray-200 bg-white px-4 py-3 shadow-sm dark:border-gray-700 dark:bg-gray-800"
                    data-account-card="true"
                {
                    div class="flex items-start justify-between gap-3"
                    {
                        span class=(ACCOUNT_BADGE_STYLE) { (account.display_name) }
                        div class="text-sm tabular-nums text-right text-gray-900 dark:text-white"
                        { (account.transaction_count) " transactions" }
                    }

                    div class="mt-1 text-xs text-gray-500 dark:text-gray-400"
                    { (account.account_number) }

                    div class="mt-2 flex items-center gap-4 text-sm"
                    {
                        (edit_delete_action_links(
                            &account.edit_url,
                            &account.delete_url,
                            &account.confirm_message(),
                            "closest [data-account-card='true']",
                            "outerHTML",
                        ))
                    }
                }
            }

            @if accounts.is_empty() {
                li class="rounded border border-dashed border-gray-300 bg-white px-4 py-6 text-center text-sm text-gray-500 dark:border-gray-700 dark:bg-gray-800 dark:text-gray-400"
                {
                    "No accounts found. Create an account "
                    a href=(create_account_page_url) class=(LINK_STYLE)
                    {
                        "here"
                    }
                    "."
                }
            }
        }
    )
}
