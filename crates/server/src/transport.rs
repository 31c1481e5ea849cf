//! Thin long-polling wrapper around the Bot API. Everything
//! interesting happens in the orchestrator; this loop only shuttles
//! updates in and rendered payloads out.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use courier_agent::Orchestrator;
use courier_telegram::{render_reply, InboundEvent, TelegramUpdate};

const POLL_TIMEOUT_SECS: u64 = 30;
const ERROR_BACKOFF_SECS: u64 = 5;

pub struct LongPollRunner {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    orchestrator: Arc<Orchestrator>,
}

impl LongPollRunner {
    pub fn new(
        api_base_url: impl Into<String>,
        bot_token: SecretString,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            bot_token,
            orchestrator,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base_url.trim_end_matches('/'),
            self.bot_token.expose_secret()
        )
    }

    /// Poll until the surrounding task is cancelled.
    pub async fn run(&self) {
        let mut offset: i64 = 0;

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(err) => {
                    tracing::warn!(error = %err, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.handle_update(update).await;
            }
        }
    }

    async fn handle_update(&self, update: TelegramUpdate) {
        let event = match update.into_event() {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed update");
                return;
            }
        };

        let (chat_id, reply) = match event {
            InboundEvent::Message { user_id, chat_id, display_name, text, .. } => {
                let reply =
                    self.orchestrator.handle_message(&user_id, &display_name, &text).await;
                (chat_id, reply)
            }
            InboundEvent::Callback { user_id, chat_id, action } => {
                let reply = self.orchestrator.handle_callback(&user_id, &action).await;
                (chat_id, reply)
            }
            InboundEvent::Ignored => return,
        };

        let payload = render_reply(chat_id, &reply);
        if let Err(err) =
            self.client.post(self.method_url("sendMessage")).json(&payload).send().await
        {
            tracing::warn!(chat_id, error = %err, "sendMessage failed");
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>, reqwest::Error> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", POLL_TIMEOUT_SECS.to_string())])
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await?;

        let body: Value = response.json().await?;
        let updates = body["result"]
            .as_array()
            .map(|updates| {
                updates
                    .iter()
                    .filter_map(|update| {
                        serde_json::from_value::<TelegramUpdate>(update.clone()).ok()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(updates)
    }
}
