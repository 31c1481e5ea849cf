//! Inbound update envelope. Only the fields the pipeline consumes are
//! modeled; everything else in the Bot API payload is ignored by
//! serde.

use serde::Deserialize;
use thiserror::Error;

use courier_core::domain::reply::CallbackAction;

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateParseError {
    #[error("update carries neither message nor callback query")]
    Empty,
    #[error("message has no sender")]
    MissingSender,
    #[error("unrecognized callback data: `{0}`")]
    UnknownCallback(String),
}

/// What an update means to the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    Message { user_id: String, chat_id: i64, display_name: String, text: String, reply_to_id: Option<i64> },
    Callback { user_id: String, chat_id: i64, action: CallbackAction },
    /// Bot echoes, empty texts, and media-only messages are skipped.
    Ignored,
}

impl TelegramUpdate {
    pub fn into_event(self) -> Result<InboundEvent, UpdateParseError> {
        if let Some(callback) = self.callback_query {
            let Some(data) = callback.data else {
                return Ok(InboundEvent::Ignored);
            };
            let action = CallbackAction::parse(&data)
                .ok_or(UpdateParseError::UnknownCallback(data))?;
            let chat_id = callback
                .message
                .as_ref()
                .map(|message| message.chat.id)
                .unwrap_or(callback.from.id);
            return Ok(InboundEvent::Callback {
                user_id: callback.from.id.to_string(),
                chat_id,
                action,
            });
        }

        if let Some(message) = self.message {
            let from = message.from.ok_or(UpdateParseError::MissingSender)?;
            if from.is_bot {
                return Ok(InboundEvent::Ignored);
            }
            let Some(text) = message.text.filter(|text| !text.trim().is_empty()) else {
                return Ok(InboundEvent::Ignored);
            };
            return Ok(InboundEvent::Message {
                user_id: from.id.to_string(),
                chat_id: message.chat.id,
                display_name: from.first_name,
                text,
                reply_to_id: message.reply_to_message.map(|replied| replied.message_id),
            });
        }

        Err(UpdateParseError::Empty)
    }
}
