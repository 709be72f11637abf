//! Monthly budgets for primary categories.

mod budgets_page;
mod core;
mod save;

pub use budgets_page::get_budgets_page;
pub use core::{create_budget_table, delete_budget, get_all_budgets, upsert_budget};
pub use save::save_budgets_endpoint;
