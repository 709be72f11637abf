//! Importing ING bank statements exported as CSV.

mod import_page;
mod import_transactions;
mod ing;

pub use import_page::get_import_page;
pub use import_transactions::import_transactions;
