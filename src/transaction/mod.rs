//! Ledger entries: storage, duplicate detection and the pages for browsing and editing them.

mod core;
mod create;
mod delete;
mod edit;
mod form;
mod is_work;
mod transactions_page;

pub use core::{
    Transaction, TransactionBuilder, TransactionId, create_transaction_table, create_transactions,
    get_transaction_months, get_transactions, get_transactions_in_date_range,
    get_transactions_in_month, is_duplicate_transaction,
};
#[cfg(test)]
pub use core::{count_transactions, create_transaction, get_transaction};
pub use create::{create_transaction_endpoint, get_new_transaction_page};
pub use delete::delete_transaction_endpoint;
pub use edit::{get_edit_transaction_page, update_transaction_endpoint};
pub use is_work::toggle_is_work_endpoint;
pub use transactions_page::get_transactions_page;
