//! Selector catalog for the target CRM's pages
//!
//! Element lookup over CDP is CSS-only, so selectors that key on visible
//! text or on proximity to a text anchor are modeled as explicit variants
//! and resolved in-page by the backend (see [`crate::backend`]).

use std::borrow::Cow;
use std::fmt;

/// Logical element selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Plain CSS selector
    Css(Cow<'static, str>),

    /// Deepest element whose normalized text content equals the value
    Text(Cow<'static, str>),

    /// Elements matching the CSS selector whose text contains the value
    /// (case-insensitive)
    CssWithText(Cow<'static, str>, Cow<'static, str>),

    /// Elements matching `css` inside the nearest ancestor of an element
    /// containing `anchor` text. `text` additionally filters candidates by
    /// contained text when non-empty.
    Near {
        css: Cow<'static, str>,
        text: Cow<'static, str>,
        anchor: Cow<'static, str>,
    },
}

impl Selector {
    pub const fn css(css: &'static str) -> Self {
        Selector::Css(Cow::Borrowed(css))
    }

    pub const fn text(text: &'static str) -> Self {
        Selector::Text(Cow::Borrowed(text))
    }

    pub const fn css_with_text(css: &'static str, text: &'static str) -> Self {
        Selector::CssWithText(Cow::Borrowed(css), Cow::Borrowed(text))
    }

    pub const fn near(css: &'static str, anchor: &'static str) -> Self {
        Selector::Near {
            css: Cow::Borrowed(css),
            text: Cow::Borrowed(""),
            anchor: Cow::Borrowed(anchor),
        }
    }

    pub const fn near_with_text(
        css: &'static str,
        text: &'static str,
        anchor: &'static str,
    ) -> Self {
        Selector::Near {
            css: Cow::Borrowed(css),
            text: Cow::Borrowed(text),
            anchor: Cow::Borrowed(anchor),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css:{css}"),
            Selector::Text(text) => write!(f, "text:{text:?}"),
            Selector::CssWithText(css, text) => write!(f, "css:{css} text:{text:?}"),
            Selector::Near { css, text, anchor } => {
                if text.is_empty() {
                    write!(f, "css:{css} near:{anchor:?}")
                } else {
                    write!(f, "css:{css} text:{text:?} near:{anchor:?}")
                }
            }
        }
    }
}

/// Static selector catalog for the CRM pages
pub mod catalog {
    use super::Selector;

    // Login
    pub const LOGIN_START_BTN: Selector = Selector::text("Entrar com e-mail");
    pub const LOGIN_EMAIL_INPUT: Selector = Selector::css(r#"[data-cy="input-email"]"#);
    // The OTP widget renders 6 of these
    pub const LOGIN_CODE_INPUT: Selector = Selector::css("input.otp-input");
    pub const LOGIN_SUBMIT_BTN: Selector = Selector::css(r#"[data-cy="button-sign-in"] button"#);
    pub const LOGIN_SUBMIT_OTP_BTN: Selector =
        Selector::css(r#"[data-cy="button-sign-in-otp"] button"#);

    // Admin / account search
    pub const ADMIN_SEARCH_INPUT: Selector = Selector::css(r#"input[placeholder="Buscar..."]"#);
    pub const ACCESS_BTN: Selector = Selector::text("Acessar");
    pub const ACCESS_MODAL_TITLE: Selector =
        Selector::text("Selecione com qual usuário deseja acessar:");
    pub const ACCESS_MODAL_SEARCH: Selector =
        Selector::near("input", "Selecione com qual usuário deseja acessar:");

    // Panels
    pub const NEW_PANEL_BTN: Selector = Selector::text("Novo painel");
    pub const PANEL_MODAL: Selector = Selector::css("mat-dialog-container");
    pub const PANEL_MODAL_TITLE: Selector = Selector::text("Criação de painel");
    // Title is the first input in the modal, description the first textarea
    pub const PANEL_NAME_INPUT: Selector = Selector::css("mat-dialog-container input");
    pub const PANEL_DESCRIPTION_INPUT: Selector = Selector::css("mat-dialog-container textarea");
    pub const PANEL_SAVE_BTN: Selector =
        Selector::css_with_text("mat-dialog-container button", "Salvar");
    pub const ADD_STAGE_BTN: Selector =
        Selector::css_with_text("mat-dialog-container button", "adicionar fase");
    pub const STAGE_NAME_INPUT: Selector =
        Selector::css(r#"mat-dialog-container input[placeholder="Nova fase"]"#);
    pub const STAGE_TYPE_SELECT: Selector = Selector::css("mat-dialog-container mat-select");
    pub const STAGE_TYPE_OPTION: Selector = Selector::css("mat-option");
    pub const DELETE_STAGE_BTN: Selector = Selector::css(
        r#"mat-dialog-container button:has(mat-icon[data-mat-icon-name="trash"])"#,
    );
    pub const PANEL_MODAL_BODY: Selector =
        Selector::css("mat-dialog-container mat-dialog-content");

    // Contacts / tags
    pub const FIRST_CONTACT_ROW: Selector = Selector::css("tbody tr:first-child");
    pub const TAGS_EDIT_ICON: Selector = Selector::near(
        r#"button:has(mat-icon[data-mat-icon-name="pencil"])"#,
        "Etiquetas",
    );
    pub const TAGS_EDIT_FALLBACK: Selector = Selector::near("button", "Etiquetas");
    pub const ADD_TAG_BTN: Selector =
        Selector::css(r#"button:has(mat-icon[data-mat-icon-name="plus-circle"])"#);
    pub const TAG_DIALOG: Selector = Selector::css("mat-dialog-container");
    pub const TAG_NAME_INPUT: Selector = Selector::css("mat-dialog-container input");
    pub const TAG_SAVE_BTN: Selector =
        Selector::css_with_text("mat-dialog-container button", "Salvar");
    // The final save control is a styled div, not a button
    pub const TAG_FINAL_SAVE_BTN: Selector =
        Selector::css_with_text("div.cursor-pointer", "Salvar etiquetas");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_css() {
        let sel = Selector::css("tbody tr:first-child");
        assert_eq!(sel.to_string(), "css:tbody tr:first-child");
    }

    #[test]
    fn test_display_text_variants() {
        assert_eq!(
            Selector::text("Novo painel").to_string(),
            r#"text:"Novo painel""#
        );
        assert_eq!(
            Selector::css_with_text("button", "Salvar").to_string(),
            r#"css:button text:"Salvar""#
        );
        assert_eq!(
            Selector::near("input", "Etiquetas").to_string(),
            r#"css:input near:"Etiquetas""#
        );
    }

    #[test]
    fn test_catalog_selectors_compare() {
        assert_eq!(catalog::PANEL_MODAL, catalog::TAG_DIALOG);
        assert_ne!(catalog::LOGIN_SUBMIT_BTN, catalog::LOGIN_SUBMIT_OTP_BTN);
    }
}
