//! Tiered completion-provider router.
//!
//! Every call is time-boxed and normalized into a [`ProviderCallResult`]
//! value: network errors, non-2xx responses, and timeouts all fold into
//! the same shape so callers branch on the status field and never catch
//! anything. The three-tier router returns the first usable result; the
//! last tier's result is final whether it succeeded or not, and the
//! caller keeps its own offline fallback for that case.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::time::timeout;

use courier_core::config::{ProviderTierConfig, ProvidersConfig};

/// Token budget ceiling applied to the last-resort fast tier: favor
/// speed over depth once the better tiers are gone.
pub const FAST_TIER_TOKEN_CEILING: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderCallResult {
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub status: u16,
    pub text: String,
    pub error: Option<String>,
}

impl ProviderCallResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && !self.text.is_empty()
    }

    fn failure(tier: &ProviderTierConfig, status: u16, error: impl Into<String>) -> Self {
        Self {
            provider: tier.name.clone(),
            model: tier.model.clone(),
            latency_ms: 0,
            status,
            text: String::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        tier: &ProviderTierConfig,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> ProviderCallResult;
}

pub struct HttpCompletionBackend {
    client: reqwest::Client,
}

impl HttpCompletionBackend {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpCompletionBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(
        &self,
        tier: &ProviderTierConfig,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> ProviderCallResult {
        let Some(api_key) = tier.api_key.as_ref() else {
            return ProviderCallResult::failure(tier, 401, "missing api key");
        };

        let body = json!({
            "model": tier.model,
            "messages": messages
                .iter()
                .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
                .collect::<Vec<_>>(),
            "max_tokens": max_tokens,
        });

        let url = format!("{}/chat/completions", tier.base_url.trim_end_matches('/'));
        let started = std::time::Instant::now();

        let round_trip = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(api_key.expose_secret())
                .json(&body)
                .send()
                .await?;

            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();
            Ok::<(u16, String), reqwest::Error>((status, raw))
        };

        // Dropping the future on expiry aborts the in-flight request,
        // so an unresponsive tier stops consuming resources once the
        // router moves on.
        let outcome = timeout(Duration::from_secs(tier.timeout_secs), round_trip).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => ProviderCallResult {
                latency_ms,
                ..ProviderCallResult::failure(
                    tier,
                    408,
                    format!("timed out after {}s", tier.timeout_secs),
                )
            },
            Ok(Err(err)) => ProviderCallResult {
                latency_ms,
                ..ProviderCallResult::failure(tier, 500, err.to_string())
            },
            Ok(Ok((status, raw))) if !(200..300).contains(&status) => ProviderCallResult {
                latency_ms,
                ..ProviderCallResult::failure(tier, status, truncate(&raw, 200))
            },
            Ok(Ok((status, raw))) => {
                let text = serde_json::from_str::<serde_json::Value>(&raw)
                    .ok()
                    .and_then(|value| {
                        value["choices"][0]["message"]["content"].as_str().map(str::to_string)
                    })
                    .unwrap_or_default();

                ProviderCallResult {
                    provider: tier.name.clone(),
                    model: tier.model.clone(),
                    latency_ms,
                    status,
                    text,
                    error: None,
                }
            }
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Priority-ordered three-tier router used by the conversational path.
pub struct CompletionRouter {
    primary: ProviderTierConfig,
    fallback: ProviderTierConfig,
    fast: ProviderTierConfig,
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionRouter {
    pub fn new(providers: &ProvidersConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            primary: providers.primary.clone(),
            fallback: providers.fallback.clone(),
            fast: providers.fast.clone(),
            backend,
        }
    }

    /// Cascade through the tiers. The fast tier's result is returned
    /// whether or not it succeeded; the caller owns the offline path.
    pub async fn chat(&self, messages: &[ChatMessage]) -> ProviderCallResult {
        let tier1 = self.backend.complete(&self.primary, messages, self.primary.max_tokens).await;
        if tier1.is_success() {
            return tier1;
        }
        tracing::warn!(
            provider = %tier1.provider,
            model = %tier1.model,
            status = tier1.status,
            error = tier1.error.as_deref().unwrap_or("empty completion"),
            "primary completion tier failed, trying fallback"
        );

        let tier2 =
            self.backend.complete(&self.fallback, messages, self.fallback.max_tokens).await;
        if tier2.is_success() {
            return tier2;
        }
        tracing::warn!(
            provider = %tier2.provider,
            model = %tier2.model,
            status = tier2.status,
            error = tier2.error.as_deref().unwrap_or("empty completion"),
            "fallback completion tier failed, trying fast tier"
        );

        let budget = self.fast.max_tokens.min(FAST_TIER_TOKEN_CEILING);
        self.backend.complete(&self.fast, messages, budget).await
    }
}

/// Two-provider cascade for the single-shot ask path: primary then
/// secondary, same normalization, second result is final.
pub struct AskRouter {
    primary: ProviderTierConfig,
    secondary: ProviderTierConfig,
    backend: Arc<dyn CompletionBackend>,
}

impl AskRouter {
    pub fn new(providers: &ProvidersConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            primary: providers.primary.clone(),
            secondary: providers.fallback.clone(),
            backend,
        }
    }

    pub async fn ask(&self, system_prompt: &str, question: &str, context: &str) -> ProviderCallResult {
        let content = if context.is_empty() {
            question.to_string()
        } else {
            format!("CONTEXT:\n{context}\n\nUSER REQUEST: {question}")
        };
        let messages =
            [ChatMessage::system(system_prompt), ChatMessage::user(content)];

        let first = self.backend.complete(&self.primary, &messages, self.primary.max_tokens).await;
        if first.is_success() {
            return first;
        }
        tracing::warn!(
            provider = %first.provider,
            status = first.status,
            "primary ask provider failed, trying secondary"
        );

        self.backend.complete(&self.secondary, &messages, self.secondary.max_tokens).await
    }
}
