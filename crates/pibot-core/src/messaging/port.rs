use async_trait::async_trait;

use crate::{
    domain::{ChatId, GeoPoint, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// Transport port.
///
/// Telegram is the only implementation today; the agent is written against
/// this trait so the dispatch logic stays testable without a network.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send a plain text message. The adapter attaches the persistent
    /// command keyboard to every plain send.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send a confirmation prompt carrying yes/cancel inline buttons.
    async fn send_confirm(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Share a location; `live_period` marks it live-updating for that many
    /// seconds.
    async fn send_location(
        &self,
        chat_id: ChatId,
        point: GeoPoint,
        live_period: Option<u32>,
    ) -> Result<MessageRef>;

    /// Best-effort typing indicator.
    async fn send_typing(&self, chat_id: ChatId) -> Result<()>;

    /// Acknowledge a callback query, optionally with a transient notice.
    async fn answer_callback(&self, callback_id: &str, notice: Option<&str>) -> Result<()>;

    /// Replace a message's text in place, stripping its inline buttons.
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()>;
}
