use maud::{Markup, html};

use crate::{
    account::core::AccountFormData,
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE},
};

/// The account number and display name inputs.
pub(super) fn account_form_fields(form_data: &AccountFormData) -> Markup {
    html! {
        div
        {
            label
                for="account_number"
                class=(FORM_LABEL_STYLE)
            {
                "Account Number"
            }

            input
                id="account_number"
                type="text"
                name="account_number"
                placeholder="e.g. 12-3456-7890123-00"
                value=(form_data.account_number)
                required
                autofocus
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label
                for="display_name"
                class=(FORM_LABEL_STYLE)
            {
                "Display Name"
            }

            input
                id="display_name"
                type="text"
                name="display_name"
                placeholder="e.g. Everyday"
                value=(form_data.display_name)
                required
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}
