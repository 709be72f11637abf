//! The transactions page: every ledger entry grouped by month, with an optional month filter.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    account::get_all_account_maps,
    category::get_all_categories,
    dates::{
        format_display_date, month_index, month_start, parse_month_index, week_start,
        year_month_label,
    },
    endpoints::{self, format_endpoint},
    html::{
        ACCOUNT_BADGE_STYLE, CATEGORY_BADGE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, edit_delete_action_links,
        format_currency, truncate_graphemes,
    },
    navigation::NavBar,
    transaction::{
        Transaction, TransactionId, get_transaction_months, get_transactions,
        get_transactions_in_month, is_work::is_work_toggle,
    },
};

const NOTES_MAX_GRAPHEMES: usize = 32;
const COLUMN_COUNT: u8 = 10;

/// The state needed for the transactions page.
#[derive(Debug, Clone)]
pub struct TransactionsPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Query parameters for the transactions page.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    /// Only show this month, as `YYYYMM`.
    pub month: Option<String>,
}

/// A transaction with its account and category names resolved for display.
#[derive(Debug, PartialEq)]
struct TransactionTableRow {
    id: TransactionId,
    date: Date,
    description: String,
    debit: Option<f64>,
    credit: Option<f64>,
    account_name: Option<String>,
    category_1_name: Option<String>,
    category_2_name: Option<String>,
    is_work: bool,
    notes: Option<String>,
    edit_url: String,
    delete_url: String,
}

impl TransactionTableRow {
    fn confirm_message(&self) -> String {
        format!(
            "Are you sure you want to delete the transaction '{}'? This cannot be undone.",
            self.description
        )
    }
}

/// The rows of one calendar month and their totals.
#[derive(Debug, PartialEq)]
struct MonthGroup {
    month: Date,
    credit_total: f64,
    debit_total: f64,
    rows: Vec<TransactionTableRow>,
}

/// A link in the month filter bar.
struct MonthLink {
    label: String,
    url: String,
    is_current: bool,
}

/// Render the transactions table, optionally limited to `?month=YYYYMM`.
pub async fn get_transactions_page(
    State(state): State<TransactionsPageState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, Error> {
    let selected_month = query.month.as_deref().and_then(|month| {
        parse_month_index(month)
            .inspect_err(|_| {
                tracing::warn!("ignoring invalid month filter \"{month}\", showing all transactions")
            })
            .ok()
    });

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = match selected_month {
        Some(month) => get_transactions_in_month(month, &connection),
        None => get_transactions(&connection),
    }
    .inspect_err(|error| tracing::error!("could not get transactions: {error}"))?;

    let months = get_transaction_months(&connection)
        .inspect_err(|error| tracing::error!("could not get transaction months: {error}"))?;
    let rows = build_table_rows(transactions, &connection)?;
    let groups = group_by_month(rows);

    Ok(transactions_view(&groups, &month_links(&months, selected_month)).into_response())
}

fn build_table_rows(
    transactions: Vec<Transaction>,
    connection: &Connection,
) -> Result<Vec<TransactionTableRow>, Error> {
    let account_names: HashMap<_, _> = get_all_account_maps(connection)
        .inspect_err(|error| tracing::error!("could not get accounts: {error}"))?
        .into_iter()
        .map(|account| (account.id, account.display_name))
        .collect();
    let category_names: HashMap<_, _> = get_all_categories(connection)
        .inspect_err(|error| tracing::error!("could not get categories: {error}"))?
        .into_iter()
        .map(|category| (category.id, category.name.to_string()))
        .collect();

    let rows = transactions
        .into_iter()
        .map(|transaction| TransactionTableRow {
            edit_url: format_endpoint(endpoints::EDIT_TRANSACTION_VIEW, transaction.id),
            delete_url: format_endpoint(endpoints::TRANSACTION, transaction.id),
            id: transaction.id,
            date: transaction.date,
            account_name: transaction
                .account_id
                .and_then(|id| account_names.get(&id).cloned()),
            category_1_name: transaction
                .category_1_id
                .and_then(|id| category_names.get(&id).cloned()),
            category_2_name: transaction
                .category_2_id
                .and_then(|id| category_names.get(&id).cloned()),
            description: transaction.description,
            debit: transaction.debit,
            credit: transaction.credit,
            is_work: transaction.is_work,
            notes: transaction.notes,
        })
        .collect();

    Ok(rows)
}

/// Split rows that are already sorted newest first into consecutive months.
fn group_by_month(rows: Vec<TransactionTableRow>) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();

    for row in rows {
        let month = month_start(row.date);

        if groups.last().is_none_or(|current| current.month != month) {
            groups.push(MonthGroup {
                month,
                credit_total: 0.0,
                debit_total: 0.0,
                rows: Vec::new(),
            });
        }

        let Some(group) = groups.last_mut() else {
            continue;
        };

        group.credit_total += row.credit.unwrap_or(0.0);
        group.debit_total += row.debit.unwrap_or(0.0);
        group.rows.push(row);
    }

    groups
}

fn month_links(months: &[Date], selected_month: Option<Date>) -> Vec<MonthLink> {
    let all = MonthLink {
        label: "All".to_owned(),
        url: endpoints::TRANSACTIONS_VIEW.to_owned(),
        is_current: selected_month.is_none(),
    };

    std::iter::once(all)
        .chain(months.iter().map(|&month| MonthLink {
            label: year_month_label(month),
            url: format!(
                "{}?month={}",
                endpoints::TRANSACTIONS_VIEW,
                month_index(month)
            ),
            is_current: selected_month == Some(month),
        }))
        .collect()
}

fn month_links_view(links: &[MonthLink]) -> Markup {
    html! {
        nav class="flex flex-wrap gap-2 text-sm" aria-label="Filter by month" data-month-links="true"
        {
            @for link in links {
                @if link.is_current {
                    a href=(link.url)
                        aria-current="page"
                        class="rounded px-2 py-1 font-semibold bg-blue-100 text-blue-800 dark:bg-blue-900 dark:text-blue-300"
                    { (link.label) }
                } @else {
                    a href=(link.url) class={ "rounded px-2 py-1 " (LINK_STYLE) } { (link.label) }
                }
            }
        }
    }
}

fn amount_cell(amount: Option<f64>, style: &str) -> Markup {
    html! {
        @match amount {
            Some(amount) => {
                td class={ "px-6 py-4 text-right tabular-nums " (style) } { (format_currency(amount)) }
            }
            None => {
                td class="px-6 py-4 text-right text-gray-400 dark:text-gray-500" { "-" }
            }
        }
    }
}

fn month_header_row_view(group: &MonthGroup) -> Markup {
    html! {
        tr class="bg-gray-50 dark:bg-gray-700" data-month-header="true"
        {
            td colspan=(COLUMN_COUNT) class="px-6 py-3"
            {
                div class="flex items-center justify-between font-semibold text-gray-900 dark:text-white"
                {
                    span { (year_month_label(group.month)) }
                    span class="flex items-center gap-4"
                    {
                        span class="text-green-700 dark:text-green-300 whitespace-nowrap" data-credit-total="true"
                        { (format_currency(group.credit_total)) }
                        span class="text-red-700 dark:text-red-300 whitespace-nowrap" data-debit-total="true"
                        { (format_currency(group.debit_total)) }
                    }
                }
            }
        }
    }
}

fn transaction_row_view(row: &TransactionTableRow) -> Markup {
    let week_tooltip = format!("Week of {}", format_display_date(week_start(row.date)));
    let notes = row
        .notes
        .as_deref()
        .map(|notes| truncate_graphemes(notes, NOTES_MAX_GRAPHEMES));

    html! {
        tr class=(TABLE_ROW_STYLE) data-transaction-row="true"
        {
            td class="px-6 py-4 whitespace-nowrap" title=(week_tooltip)
            {
                time datetime=(row.date) { (format_display_date(row.date)) }
            }
            td class=(TABLE_CELL_STYLE)
            {
                @if let Some(ref account_name) = row.account_name {
                    span class=(ACCOUNT_BADGE_STYLE) { (account_name) }
                } @else {
                    span class="text-gray-400 dark:text-gray-500" { "N/A" }
                }
            }
            td class=(TABLE_CELL_STYLE) { (row.description) }
            (amount_cell(row.credit, "text-green-700 dark:text-green-300"))
            (amount_cell(row.debit, "text-red-700 dark:text-red-300"))
            td class=(TABLE_CELL_STYLE)
            {
                @if let Some(ref name) = row.category_1_name {
                    span class=(CATEGORY_BADGE_STYLE) { (name) }
                } @else {
                    span class="text-gray-400 dark:text-gray-500" { "Uncategorized" }
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                @if let Some(ref name) = row.category_2_name {
                    span class=(CATEGORY_BADGE_STYLE) { (name) }
                } @else {
                    span class="text-gray-400 dark:text-gray-500" { "-" }
                }
            }
            td class=(TABLE_CELL_STYLE) { (is_work_toggle(row.id, row.is_work)) }
            @match notes {
                Some((ref text, tooltip)) => {
                    td class=(TABLE_CELL_STYLE) title=[tooltip] { (text) }
                }
                None => {
                    td class="px-6 py-4 text-gray-400 dark:text-gray-500" { "-" }
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                div class="flex gap-4"
                {
                    (edit_delete_action_links(
                        &row.edit_url,
                        &row.delete_url,
                        &row.confirm_message(),
                        "closest tr",
                        "delete",
                    ))
                }
            }
        }
    }
}

fn transaction_card_view(row: &TransactionTableRow) -> Markup {
    html! {
        div class="rounded border border-gray-200 bg-gray-50 px-3 py-3 shadow-sm dark:border-gray-700 dark:bg-gray-900/30"
            data-transaction-card="true"
        {
            div class="flex items-start justify-between gap-3"
            {
                div class="min-w-0 flex-1 truncate text-sm font-medium text-gray-900 dark:text-white"
                    title=(row.description)
                { (row.description) }
                div class="shrink-0 text-sm tabular-nums text-right whitespace-nowrap"
                {
                    @if let Some(credit) = row.credit {
                        span class="text-green-700 dark:text-green-300" { (format_currency(credit)) }
                    }
                    @if let Some(debit) = row.debit {
                        span class="text-red-700 dark:text-red-300" { (format_currency(-debit)) }
                    }
                }
            }

            div class="mt-1 text-xs text-gray-500 dark:text-gray-400"
            {
                (format_display_date(row.date))
                " · "
                (row.account_name.as_deref().unwrap_or("N/A"))
                " · "
                (row.category_1_name.as_deref().unwrap_or("Uncategorized"))
            }

            div class="mt-3 flex items-center justify-between gap-3 border-t border-gray-200 pt-2 text-sm dark:border-gray-700/80"
            {
                (is_work_toggle(row.id, row.is_work))

                div class="flex items-center gap-4 text-gray-900 dark:text-white"
                {
                    (edit_delete_action_links(
                        &row.edit_url,
                        &row.delete_url,
                        &row.confirm_message(),
                        "closest [data-transaction-card='true']",
                        "delete",
                    ))
                }
            }
        }
    }
}

fn transactions_view(groups: &[MonthGroup], month_links: &[MonthLink]) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();
    let is_empty = groups.is_empty();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4"
            {
                header class="flex justify-between flex-wrap items-end gap-2"
                {
                    h1 class="text-xl font-bold" { "Transactions" }

                    div class="flex gap-4"
                    {
                        a href=(endpoints::IMPORT_VIEW) class=(LINK_STYLE) { "Import" }
                        a href=(endpoints::NEW_TRANSACTION_VIEW) class=(LINK_STYLE) { "Add Transaction" }
                    }
                }

                (month_links_view(month_links))

                div class="lg:hidden space-y-6"
                {
                    @for group in groups {
                        section class="space-y-2"
                        {
                            h2 class="flex justify-between text-sm font-semibold text-gray-900 dark:text-white"
                            {
                                span { (year_month_label(group.month)) }
                                span class="flex gap-3"
                                {
                                    span class="text-green-700 dark:text-green-300" { (format_currency(group.credit_total)) }
                                    span class="text-red-700 dark:text-red-300" { (format_currency(group.debit_total)) }
                                }
                            }

                            @for row in &group.rows {
                                (transaction_card_view(row))
                            }
                        }
                    }

                    @if is_empty {
                        p class="text-center text-gray-500 dark:text-gray-400" { "No transactions found." }
                    }
                }

                section class="hidden lg:block w-full overflow-x-auto dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Account" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Description" }
                                th scope="col" class="px-6 py-3 text-right" { "Credit" }
                                th scope="col" class="px-6 py-3 text-right" { "Debit" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category 1" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category 2" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Work" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Notes" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        @for group in groups {
                            tbody data-month-group=(month_index(group.month))
                            {
                                (month_header_row_view(group))

                                @for row in &group.rows {
                                    (transaction_row_view(row))
                                }
                            }
                        }

                        @if is_empty {
                            tbody
                            {
                                tr
                                {
                                    td colspan=(COLUMN_COUNT) class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                                    { "No transactions found." }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base("Transactions", &[], &content)
}
