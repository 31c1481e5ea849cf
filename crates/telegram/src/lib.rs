//! Telegram transport boundary: typed update envelopes in, rendered
//! Bot-API payloads out. The core never sees Telegram JSON and this
//! crate never inspects reply text; the [`courier_core::Reply`] enum
//! is the whole contract between them.

pub mod render;
pub mod update;

pub use render::{render_reply, InlineKeyboardButton, InlineKeyboardMarkup, SendMessagePayload};
pub use update::{InboundEvent, TelegramUpdate, UpdateParseError};
