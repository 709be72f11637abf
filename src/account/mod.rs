//! Account maps and the pages for managing them.

mod accounts_page;
mod core;
mod create;
mod delete;
mod edit;
mod form;

pub use accounts_page::get_accounts_page;
pub use core::{
    AccountId, AccountMap, NewAccountMap, create_account_map, create_account_table,
    delete_account_map, get_account_map, get_all_account_maps, update_account_map,
};
pub use create::{create_account_endpoint, get_new_account_page};
pub use delete::delete_account_endpoint;
pub use edit::{get_edit_account_page, update_account_endpoint};
