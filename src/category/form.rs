//! The fields shared by the create and edit category forms.

use maud::{Markup, html};

use crate::{
    category::{Category, CategoryId},
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE},
};

/// The name input and the parent select.
///
/// `parent_options` should only hold primary categories. Leaving the parent
/// blank makes the category a primary category.
pub(super) fn category_form_fields(
    name: &str,
    parent_options: &[Category],
    selected_parent: Option<CategoryId>,
) -> Markup {
    html! {
        div
        {
            label
                for="name"
                class=(FORM_LABEL_STYLE)
            {
                "Category Name"
            }

            input
                id="name"
                type="text"
                name="name"
                placeholder="Category Name"
                value=(name)
                required
                autofocus
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label
                for="parent_id"
                class=(FORM_LABEL_STYLE)
            {
                "Parent Category"
            }

            select
                id="parent_id"
                name="parent_id"
                class=(FORM_TEXT_INPUT_STYLE)
            {
                option value="" selected[selected_parent.is_none()] { "None (primary category)" }

                @for parent in parent_options {
                    option
                        value=(parent.id)
                        selected[selected_parent == Some(parent.id)]
                    {
                        (parent.name)
                    }
                }
            }
        }
    }
}
