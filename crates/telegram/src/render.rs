//! Render [`Reply`] values into Bot-API `sendMessage` payloads.

use serde::Serialize;

use courier_core::domain::reply::Reply;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendMessagePayload {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

pub fn render_reply(chat_id: i64, reply: &Reply) -> SendMessagePayload {
    match reply {
        Reply::Plain(text) => {
            SendMessagePayload { chat_id, text: text.clone(), reply_markup: None }
        }
        Reply::Interactive { text, buttons } => {
            let row: Vec<InlineKeyboardButton> = buttons
                .iter()
                .map(|button| InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: button.action.as_callback_data(),
                })
                .collect();
            SendMessagePayload {
                chat_id,
                text: text.clone(),
                reply_markup: Some(InlineKeyboardMarkup { inline_keyboard: vec![row] }),
            }
        }
    }
}
