//! The form shared by the new and edit transaction pages.

use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::{AccountId, AccountMap, get_all_account_maps},
    category::{Category, CategoryId, CategoryKind, get_all_categories, get_category},
    html::{
        FORM_CHECKBOX_STYLE, FORM_LABEL_STYLE, FORM_RADIO_GROUP_STYLE, FORM_RADIO_INPUT_STYLE,
        FORM_RADIO_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
    },
    timezone::get_local_offset,
    transaction::{Transaction, TransactionBuilder},
};

/// Which amount column the form's amount goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

/// The raw form fields for creating or editing a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFormData {
    pub date: Date,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub category_1_id: Option<CategoryId>,
    #[serde(default)]
    pub category_2_id: Option<CategoryId>,
    #[serde(default)]
    pub is_work: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the form inputs are filled in with.
#[derive(Debug, Clone)]
pub(super) struct TransactionFormValues {
    pub date: Date,
    pub description: String,
    pub amount: Option<f64>,
    pub transaction_type: TransactionType,
    pub account_id: Option<AccountId>,
    pub category_1_id: Option<CategoryId>,
    pub category_2_id: Option<CategoryId>,
    pub is_work: bool,
    pub notes: Option<String>,
}

impl TransactionFormValues {
    /// An empty form dated `date`.
    pub fn blank(date: Date) -> Self {
        Self {
            date,
            description: String::new(),
            amount: None,
            transaction_type: TransactionType::Debit,
            account_id: None,
            category_1_id: None,
            category_2_id: None,
            is_work: false,
            notes: None,
        }
    }
}

impl From<&TransactionFormData> for TransactionFormValues {
    fn from(form: &TransactionFormData) -> Self {
        Self {
            date: form.date,
            description: form.description.clone(),
            amount: Some(form.amount),
            transaction_type: form.transaction_type,
            account_id: form.account_id,
            category_1_id: form.category_1_id,
            category_2_id: form.category_2_id,
            is_work: form.is_work,
            notes: form.notes.clone(),
        }
    }
}

impl From<&Transaction> for TransactionFormValues {
    fn from(transaction: &Transaction) -> Self {
        let (amount, transaction_type) = match (transaction.debit, transaction.credit) {
            (None, Some(credit)) => (Some(credit), TransactionType::Credit),
            (debit, _) => (debit, TransactionType::Debit),
        };

        Self {
            date: transaction.date,
            description: transaction.description.clone(),
            amount,
            transaction_type,
            account_id: transaction.account_id,
            category_1_id: transaction.category_1_id,
            category_2_id: transaction.category_2_id,
            is_work: transaction.is_work,
            notes: transaction.notes.clone(),
        }
    }
}

/// The accounts and categories the selects offer.
#[derive(Debug, Clone)]
pub(super) struct FormOptions {
    pub accounts: Vec<AccountMap>,
    pub primary_categories: Vec<Category>,
    pub sub_categories: Vec<Category>,
}

impl FormOptions {
    pub fn load(connection: &Connection) -> Result<Self, Error> {
        let accounts = get_all_account_maps(connection)?;
        let (primary_categories, sub_categories) = get_all_categories(connection)?
            .into_iter()
            .partition(|category| category.kind() == CategoryKind::Primary);

        Ok(Self {
            accounts,
            primary_categories,
            sub_categories,
        })
    }
}

/// Today's date in `timezone`.
pub(super) fn local_today(timezone: &str) -> Result<Date, Error> {
    let Some(local_offset) = get_local_offset(timezone) else {
        tracing::error!("Invalid timezone {timezone}");
        return Err(Error::InvalidTimezoneError(timezone.to_owned()));
    };

    Ok(OffsetDateTime::now_utc().to_offset(local_offset).date())
}

/// Errors that are shown inside the form rather than as an alert.
pub(super) fn is_form_error(error: &Error) -> bool {
    matches!(
        error,
        Error::EmptyDescription
            | Error::NonPositiveAmount
            | Error::AccountRequired
            | Error::CategoryNotPrimary
            | Error::SubCategoryMismatch
    )
}

/// Check the form and turn it into a transaction.
///
/// Category 2 is only kept when `allow_category_2` is set; new transactions
/// are created with just a primary category.
///
/// # Errors
/// - [Error::EmptyDescription] if the description is blank.
/// - [Error::NonPositiveAmount] if the amount is zero or less.
/// - [Error::FutureDate] if the date is after `today`.
/// - [Error::AccountRequired] if no account was picked.
/// - [Error::InvalidCategory] if a category does not exist.
/// - [Error::CategoryNotPrimary] if category 1 is a sub-category.
/// - [Error::SubCategoryMismatch] if category 2 is not a child of category 1.
pub(super) fn validate_transaction_form(
    form: &TransactionFormData,
    today: Date,
    allow_category_2: bool,
    connection: &Connection,
) -> Result<TransactionBuilder, Error> {
    let description = form.description.trim();
    if description.is_empty() {
        return Err(Error::EmptyDescription);
    }

    if !form.amount.is_finite() || form.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }

    if form.date > today {
        return Err(Error::FutureDate(form.date));
    }

    let Some(account_id) = form.account_id else {
        return Err(Error::AccountRequired);
    };

    if let Some(category_1_id) = form.category_1_id {
        let category_1 = find_category(category_1_id, connection)?;

        if category_1.kind() != CategoryKind::Primary {
            return Err(Error::CategoryNotPrimary);
        }
    }

    let category_2_id = if allow_category_2 { form.category_2_id } else { None };

    if let Some(category_2_id) = category_2_id {
        let category_2 = find_category(category_2_id, connection)?;

        if form.category_1_id.is_none() || category_2.parent_id != form.category_1_id {
            return Err(Error::SubCategoryMismatch);
        }
    }

    let (debit, credit) = match form.transaction_type {
        TransactionType::Debit => (Some(form.amount), None),
        TransactionType::Credit => (None, Some(form.amount)),
    };

    let notes = form
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|notes| !notes.is_empty())
        .map(str::to_owned);

    Ok(Transaction::build(form.date, description)
        .debit(debit)
        .credit(credit)
        .account_id(Some(account_id))
        .category_1_id(form.category_1_id)
        .category_2_id(category_2_id)
        .is_work(form.is_work)
        .notes(notes))
}

fn find_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    get_category(category_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidCategory(Some(category_id)),
        error => error,
    })
}

/// The inputs of the transaction form, without the surrounding `form` element.
pub(super) fn transaction_form_fields(
    values: &TransactionFormValues,
    options: &FormOptions,
    max_date: Date,
    show_category_2: bool,
) -> Markup {
    let is_debit = values.transaction_type == TransactionType::Debit;
    let amount_str = values.amount.map(|amount| format!("{amount:.2}"));

    html! {
        div
        {
            label for="date" class=(FORM_LABEL_STYLE) { "Date" }

            input
                name="date"
                id="date"
                type="date"
                max=(max_date)
                value=(values.date)
                required
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label for="description" class=(FORM_LABEL_STYLE) { "Description" }

            input
                name="description"
                id="description"
                type="text"
                placeholder="Description"
                value=(values.description)
                required
                autofocus
                class=(FORM_TEXT_INPUT_STYLE);
        }

        fieldset class="space-y-2"
        {
            legend class=(FORM_LABEL_STYLE) { "Transaction type" }

            div class=(FORM_RADIO_GROUP_STYLE)
            {
                div class="flex items-center gap-3"
                {
                    input
                        name="transaction_type"
                        id="transaction-type-debit"
                        type="radio"
                        value="debit"
                        checked[is_debit]
                        required
                        class=(FORM_RADIO_INPUT_STYLE);

                    label for="transaction-type-debit" class=(FORM_RADIO_LABEL_STYLE)
                    {
                        "Debit"
                    }
                }

                div class="flex items-center gap-3"
                {
                    input
                        name="transaction_type"
                        id="transaction-type-credit"
                        type="radio"
                        value="credit"
                        checked[!is_debit]
                        required
                        class=(FORM_RADIO_INPUT_STYLE);

                    label for="transaction-type-credit" class=(FORM_RADIO_LABEL_STYLE)
                    {
                        "Credit"
                    }
                }
            }
        }

        div
        {
            label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

            div class="input-wrapper w-full"
            {
                input
                    name="amount"
                    id="amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    placeholder="0.00"
                    value=[amount_str.as_deref()]
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }
        }

        div
        {
            label for="account_id" class=(FORM_LABEL_STYLE) { "Account" }

            select
                name="account_id"
                id="account_id"
                required
                class=(FORM_TEXT_INPUT_STYLE)
            {
                option value="" { "Select an account" }

                @for account in &options.accounts {
                    option
                        value=(account.id)
                        selected[values.account_id == Some(account.id)]
                    {
                        (account.display_name)
                    }
                }
            }
        }

        div
        {
            label for="category_1_id" class=(FORM_LABEL_STYLE) { "Category 1" }

            select
                name="category_1_id"
                id="category_1_id"
                class=(FORM_TEXT_INPUT_STYLE)
            {
                option value="" { "Uncategorized" }

                @for category in &options.primary_categories {
                    option
                        value=(category.id)
                        selected[values.category_1_id == Some(category.id)]
                    {
                        (category.name)
                    }
                }
            }
        }

        @if show_category_2 {
            div
            {
                label for="category_2_id" class=(FORM_LABEL_STYLE) { "Category 2" }

                select
                    name="category_2_id"
                    id="category_2_id"
                    class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "None" }

                    @for parent in &options.primary_categories {
                        @let children = options
                            .sub_categories
                            .iter()
                            .filter(|sub| sub.parent_id == Some(parent.id))
                            .collect::<Vec<_>>();

                        @if !children.is_empty() {
                            optgroup label=(parent.name)
                            {
                                @for sub in children {
                                    option
                                        value=(sub.id)
                                        selected[values.category_2_id == Some(sub.id)]
                                    {
                                        (sub.name)
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        div class="flex items-center gap-3"
        {
            input
                name="is_work"
                id="is_work"
                type="checkbox"
                value="true"
                checked[values.is_work]
                class=(FORM_CHECKBOX_STYLE);

            label for="is_work" class="text-sm font-medium text-gray-900 dark:text-white"
            {
                "Work expense"
            }
        }

        div
        {
            label for="notes" class=(FORM_LABEL_STYLE) { "Notes" }

            textarea
                name="notes"
                id="notes"
                rows="3"
                placeholder="Optional"
                class=(FORM_TEXT_INPUT_STYLE)
            {
                (values.notes.as_deref().unwrap_or_default())
            }
        }
    }
}
