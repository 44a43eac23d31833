//! Telegram adapter (teloxide).
//!
//! This crate implements the `pibot-core` MessagingPort over the Telegram
//! Bot API.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use pibot_core::{
    domain::{ChatId, GeoPoint, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    /// The persistent command keyboard, built once at startup and attached
    /// to every plain send.
    command_keyboard: KeyboardMarkup,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, keyboard_rows: Vec<Vec<&'static str>>) -> Self {
        Self {
            bot,
            command_keyboard: command_keyboard(keyboard_rows),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .reply_markup(ReplyMarkup::Keyboard(self.command_keyboard.clone()))
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_confirm(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = confirm_markup(keyboard);

        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_location(
        &self,
        chat_id: ChatId,
        point: GeoPoint,
        live_period: Option<u32>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let req = self.bot.send_location(
                    Self::tg_chat(chat_id),
                    point.latitude,
                    point.longitude,
                );
                match live_period {
                    Some(period) => req.live_period(period),
                    None => req,
                }
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_chat_action(Self::tg_chat(chat_id), teloxide::types::ChatAction::Typing)
        })
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, notice: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = notice {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
        // Editing without a reply markup also strips the inline buttons.
        self.with_retry(|| {
            self.bot.edit_message_text(
                Self::tg_chat(message.chat_id),
                Self::tg_msg_id(message.message_id),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }
}

fn command_keyboard(rows: Vec<Vec<&'static str>>) -> KeyboardMarkup {
    let buttons: Vec<Vec<KeyboardButton>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(buttons).resize_keyboard(true)
}

fn confirm_markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = keyboard
        .buttons
        .into_iter()
        .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
        .collect();
    InlineKeyboardMarkup::new(vec![row])
}

#[cfg(test)]
mod tests {
    use super::*;

    use pibot_core::commands::{keyboard_rows, PendingAction};

    #[test]
    fn command_keyboard_keeps_the_row_layout() {
        let markup = command_keyboard(keyboard_rows());
        let labels: Vec<Vec<&str>> = markup
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.as_str()).collect())
            .collect();
        assert_eq!(
            labels,
            vec![vec!["/status", "/where", "/help"], vec!["/reboot", "/shutdown"]]
        );
    }

    #[test]
    fn confirm_markup_is_a_single_row_of_buttons() {
        let markup = confirm_markup(InlineKeyboard::confirm(PendingAction::Reboot));
        assert_eq!(markup.inline_keyboard.len(), 1);
        let labels: Vec<&str> = markup.inline_keyboard[0]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(labels, vec!["Yes", "Cancel"]);
    }
}
