//! Update translation: teloxide types into the core event model.

use std::sync::Arc;

use teloxide::{prelude::*, types::User};

use pibot_core::{
    agent::Agent,
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{CallbackEvent, IncomingEvent, TextEvent},
};

pub async fn handle_message(msg: Message, agent: Arc<Agent>) -> ResponseResult<()> {
    // Non-text messages (photos, stickers, ...) are not part of the command
    // surface.
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let (username, sender_name) = sender_identity(msg.from());

    agent
        .handle_event(IncomingEvent::Text(TextEvent {
            chat_id: ChatId(msg.chat.id.0),
            username,
            sender_name,
            text: text.to_string(),
        }))
        .await;

    Ok(())
}

pub async fn handle_callback(q: CallbackQuery, agent: Arc<Agent>) -> ResponseResult<()> {
    let (username, sender_name) = sender_identity(Some(&q.from));

    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });

    agent
        .handle_event(IncomingEvent::Callback(CallbackEvent {
            callback_id: q.id.clone(),
            username,
            sender_name,
            data: q.data.clone().unwrap_or_default(),
            message,
        }))
        .await;

    Ok(())
}

fn sender_identity(user: Option<&User>) -> (Option<String>, String) {
    match user {
        Some(u) => (u.username.clone(), u.first_name.clone()),
        None => (None, String::new()),
    }
}
