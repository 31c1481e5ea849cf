use serde::{Deserialize, Serialize};

use super::transfer::TransferId;

/// Callback payloads carried by interactive buttons. Encoded as
/// `transfer.confirm:<id>` / `transfer.cancel:<id>` on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackAction {
    ConfirmTransfer(TransferId),
    CancelTransfer(TransferId),
}

impl CallbackAction {
    pub fn as_callback_data(&self) -> String {
        match self {
            Self::ConfirmTransfer(id) => format!("transfer.confirm:{}", id.0),
            Self::CancelTransfer(id) => format!("transfer.cancel:{}", id.0),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let (action, id) = data.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match action {
            "transfer.confirm" => Some(Self::ConfirmTransfer(TransferId(id.to_string()))),
            "transfer.cancel" => Some(Self::CancelTransfer(TransferId(id.to_string()))),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub label: String,
    pub action: CallbackAction,
}

/// The single transport contract: either a plain string or a message
/// with action buttons. The transport layer renders this verbatim and
/// never inspects reply text for structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Plain(String),
    Interactive { text: String, buttons: Vec<ReplyButton> },
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Interactive { text, .. } => text,
        }
    }

    pub fn confirm_cancel(text: impl Into<String>, transfer_id: &TransferId) -> Self {
        Self::Interactive {
            text: text.into(),
            buttons: vec![
                ReplyButton {
                    label: "Confirm".to_string(),
                    action: CallbackAction::ConfirmTransfer(transfer_id.clone()),
                },
                ReplyButton {
                    label: "Cancel".to_string(),
                    action: CallbackAction::CancelTransfer(transfer_id.clone()),
                },
            ],
        }
    }
}
