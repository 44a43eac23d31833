use crate::commands::{self, PendingAction};
use crate::domain::{ChatId, MessageRef};

/// Incoming update model, translated from the wire by the adapter.
///
/// The two kinds are mutually exclusive per update; transport-specific
/// fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingEvent {
    Text(TextEvent),
    Callback(CallbackEvent),
}

/// A plain text message.
#[derive(Clone, Debug)]
pub struct TextEvent {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub sender_name: String,
    pub text: String,
}

/// A button press on a confirmation prompt.
#[derive(Clone, Debug)]
pub struct CallbackEvent {
    pub callback_id: String,
    pub username: Option<String>,
    pub sender_name: String,
    pub data: String,
    /// The prompt message the button belongs to. Absent when the transport
    /// has discarded the originating message.
    pub message: Option<MessageRef>,
}

/// Ephemeral inline buttons attached to a confirmation prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// The one-row yes/cancel keyboard for confirming `action`.
    pub fn confirm(action: PendingAction) -> Self {
        Self {
            buttons: vec![
                InlineButton {
                    label: commands::BUTTON_YES.to_string(),
                    callback_data: action.token().to_string(),
                },
                InlineButton {
                    label: commands::BUTTON_CANCEL.to_string(),
                    callback_data: commands::CMD_CANCEL.to_string(),
                },
            ],
        }
    }
}
