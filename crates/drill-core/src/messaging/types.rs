use crate::{codec::CallbackToken, Result};

/// Inline keyboard: ordered rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub token: CallbackToken,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, token: CallbackToken) -> Self {
        Self {
            label: label.into(),
            token,
        }
    }

    /// Wire form of the token, as attached to the platform button.
    pub fn callback_data(&self) -> Result<String> {
        self.token.encode()
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    pub fn push_row(&mut self, row: Vec<InlineButton>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }

    /// First button whose token matches, if any.
    pub fn find(&self, pred: impl Fn(&CallbackToken) -> bool) -> Option<&InlineButton> {
        self.buttons().find(|b| pred(&b.token))
    }
}
