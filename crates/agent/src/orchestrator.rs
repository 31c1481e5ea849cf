//! Per-message pipeline: parse, let skills preempt, drive the transfer
//! confirmation flow, try the provider chain, and fall back to the
//! deterministic offline path. One inbound message in, one [`Reply`]
//! out.
//!
//! Write discipline follows two tracks: safety-machine writes (drafts,
//! status transitions, rate counters, session keys) must land before
//! the reply can claim success, while episode logging and fact
//! extraction are best-effort telemetry that never block a reply.

use std::sync::Arc;

use chrono::{Duration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::json;

use courier_core::config::AppConfig;
use courier_core::domain::memory::Episode;
use courier_core::domain::reply::{CallbackAction, Reply};
use courier_core::domain::session::{SessionKey, SessionKeyId, WAITING_WALLET};
use courier_core::domain::transfer::{window_date, RateLimitKind};
use courier_core::nlu::{Intent, IntentParser, NluResult};
use courier_core::planner::TransferPlanner;
use courier_core::rewrite::SelfCheck;
use courier_core::skills::SkillBook;
use courier_db::repositories::{
    EpisodeRepository, FactRepository, IdentityRepository, KnowledgeRepository,
    RateLimitRepository, SessionKeyRepository, TransferRepository,
};

use crate::context::{package_context, SYSTEM_PROMPT};
use crate::executor::TransferExecutor;
use crate::providers::{AskRouter, ChatMessage, CompletionBackend, CompletionRouter};
use crate::retrieval::{RetrievalEngine, RetrievalSource};
use crate::safety::{ConfirmOutcome, DraftOutcome, TransferSafetyMachine};
use crate::session;
use crate::tools::{DocumentFetcher, ToolDispatcher, ToolName};

const HELP_TEXT: &str = "Here's what I can do:\n\
• remember things — \"remember that …\", \"my name is …\"\n\
• answer from what I've read — ask, or send a link to study\n\
• draft token transfers — \"send 5 USDC to @sam\" or a 0x address\n\
• execute only after you authorize a session and press Confirm\n\
• status — ask \"status\" any time";

/// Repository handles the pipeline needs, bundled so bootstrap and
/// tests wire them in one place.
pub struct RepositoryHandles {
    pub facts: Arc<dyn FactRepository>,
    pub episodes: Arc<dyn EpisodeRepository>,
    pub knowledge: Arc<dyn KnowledgeRepository>,
    pub identities: Arc<dyn IdentityRepository>,
    pub sessions: Arc<dyn SessionKeyRepository>,
    pub transfers: Arc<dyn TransferRepository>,
    pub rate_limits: Arc<dyn RateLimitRepository>,
}

pub struct Orchestrator {
    parser: IntentParser,
    planner: TransferPlanner,
    skills: SkillBook,
    self_check: SelfCheck,
    tools: ToolDispatcher,
    retrieval: RetrievalEngine,
    safety: TransferSafetyMachine,
    completion: CompletionRouter,
    ask: AskRouter,
    facts: Arc<dyn FactRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    identities: Arc<dyn IdentityRepository>,
    sessions: Arc<dyn SessionKeyRepository>,
    transfers: Arc<dyn TransferRepository>,
    rate_limits: Arc<dyn RateLimitRepository>,
    signature_re: Regex,
    providers_enabled: bool,
    completion_daily_limit: u32,
    episode_retention: u32,
    default_token: String,
    session_ttl_hours: i64,
    session_daily_cap: String,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        repos: RepositoryHandles,
        executor: Arc<dyn TransferExecutor>,
        backend: Arc<dyn CompletionBackend>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        let tools = ToolDispatcher::new(
            repos.facts.clone(),
            repos.knowledge.clone(),
            repos.transfers.clone(),
            repos.identities.clone(),
            fetcher,
        );
        let retrieval = RetrievalEngine::new(
            repos.knowledge.clone(),
            repos.episodes.clone(),
            config.agent.retrieval_confidence,
        );
        let safety = TransferSafetyMachine::new(
            repos.transfers.clone(),
            repos.sessions.clone(),
            repos.rate_limits.clone(),
            executor,
            config.agent.draft_daily_limit,
        );

        Self {
            parser: IntentParser::new(config.agent.default_token.clone()),
            planner: TransferPlanner,
            skills: SkillBook::default(),
            self_check: SelfCheck::new(config.agent.self_check_similarity),
            tools,
            retrieval,
            safety,
            completion: CompletionRouter::new(&config.providers, backend.clone()),
            ask: AskRouter::new(&config.providers, backend),
            facts: repos.facts,
            episodes: repos.episodes,
            knowledge: repos.knowledge,
            identities: repos.identities,
            sessions: repos.sessions,
            transfers: repos.transfers,
            rate_limits: repos.rate_limits,
            signature_re: Regex::new(r"0x[a-fA-F0-9]{130}").expect("signature regex is valid"),
            providers_enabled: config.providers.enabled,
            completion_daily_limit: config.providers.completion_daily_limit,
            episode_retention: config.agent.episode_retention,
            default_token: config.agent.default_token.clone(),
            session_ttl_hours: config.agent.session_ttl_hours,
            session_daily_cap: config.agent.session_daily_cap.clone(),
        }
    }

    pub async fn handle_message(
        &self,
        user_id: &str,
        display_name: &str,
        text: &str,
    ) -> Reply {
        let nlu = self.parser.parse(text);
        tracing::debug!(
            user_id,
            intent = nlu.intent.as_str(),
            confidence = nlu.confidence,
            "parsed inbound message"
        );

        // A pasted 65-byte signature completes a pending session
        // authorization regardless of what else the message matched.
        if let Some(signature) = self.signature_re.find(text).map(|m| m.as_str().to_string()) {
            match self.sessions.latest_waiting(user_id).await {
                Ok(Some(waiting)) => {
                    let reply = self.complete_authorization(user_id, waiting, &signature).await;
                    return self.finalize(user_id, display_name, text, &nlu, reply, false).await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(user_id, error = %err, "waiting-session lookup failed");
                }
            }
        }

        if let Some(skill) = self.skills.find(text) {
            let plan = self.skills.run(skill);
            let lines: Vec<String> = plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step.description))
                .collect();
            let reply = Reply::plain(format!(
                "Here's the {} drill:\n{}",
                skill.name.replace('_', " "),
                lines.join("\n")
            ));
            return self.finalize(user_id, display_name, text, &nlu, reply, false).await;
        }

        let reply = match nlu.intent {
            Intent::TxConfirm => self.handle_confirm(user_id).await,
            Intent::TxCancel => self.handle_cancel(user_id).await,
            Intent::Connect => self.handle_connect(user_id).await,
            Intent::TransferIntent => self.handle_transfer(user_id, &nlu).await,
            Intent::DeepResearch => {
                let reply = Reply::plain(self.research(user_id, text).await);
                return self.finalize(user_id, display_name, text, &nlu, reply, true).await;
            }
            _ => {
                let reply = self.handle_general(user_id, display_name, text, &nlu).await;
                return self.finalize(user_id, display_name, text, &nlu, reply, true).await;
            }
        };

        self.finalize(user_id, display_name, text, &nlu, reply, false).await
    }

    /// Button callbacks from the transport, keyed by transfer id.
    pub async fn handle_callback(&self, user_id: &str, action: &CallbackAction) -> Reply {
        match action {
            CallbackAction::ConfirmTransfer(id) => {
                match self.safety.confirm_by_id(user_id, id).await {
                    Ok(outcome) => self.render_confirm_outcome(outcome),
                    Err(err) => self.safety_write_failure("confirm", err),
                }
            }
            CallbackAction::CancelTransfer(id) => {
                match self.safety.cancel_by_id(user_id, id).await {
                    Ok(true) => Reply::plain("Cancelled that draft. Nothing was sent."),
                    Ok(false) => Reply::plain("That draft was already handled."),
                    Err(err) => self.safety_write_failure("cancel", err),
                }
            }
        }
    }

    async fn handle_confirm(&self, user_id: &str) -> Reply {
        match self.safety.confirm_latest(user_id).await {
            Ok(outcome) => self.render_confirm_outcome(outcome),
            Err(err) => self.safety_write_failure("confirm", err),
        }
    }

    fn render_confirm_outcome(&self, outcome: ConfirmOutcome) -> Reply {
        match outcome {
            ConfirmOutcome::Executed { transfer, tx_hash } => Reply::plain(format!(
                "Done — sent {} {} to {}.\nHash: {tx_hash}",
                transfer.amount, transfer.token, transfer.recipient
            )),
            ConfirmOutcome::Failed { error, .. } => Reply::plain(format!(
                "The transfer failed: {error}. The draft is marked failed and won't be retried."
            )),
            ConfirmOutcome::NoPendingTransfer => {
                Reply::plain("There's no pending transfer to confirm.")
            }
            ConfirmOutcome::NoActiveSession => Reply::plain(
                "Your signing session is missing or expired. Say \"connect\" to authorize a new one first.",
            ),
        }
    }

    async fn handle_cancel(&self, user_id: &str) -> Reply {
        match self.safety.cancel_all(user_id).await {
            Ok(0) => Reply::plain("Nothing was pending, so there's nothing to cancel."),
            Ok(count) => Reply::plain(format!("Cancelled {count} pending draft(s). Nothing was sent.")),
            Err(err) => self.safety_write_failure("cancel", err),
        }
    }

    async fn handle_connect(&self, user_id: &str) -> Reply {
        let material = session::create_session_signer();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.session_ttl_hours);

        let waiting = SessionKey {
            id: SessionKeyId::generate(),
            user_id: user_id.to_string(),
            wallet_address: WAITING_WALLET.to_string(),
            session_public_key: material.address.clone(),
            session_private_key: material.private_key,
            scope: "transfer".to_string(),
            expires_at,
            created_at: now,
        };
        if let Err(err) = self.sessions.save(&waiting).await {
            return self.safety_write_failure("authorize", err.into());
        }

        let message = session::generate_auth_message(
            &material.address,
            user_id,
            &self.session_daily_cap,
            expires_at,
        );
        Reply::plain(format!(
            "Let's authorize a signing session. Sign this exact message with your wallet and paste the signature here:\n\n{message}"
        ))
    }

    async fn complete_authorization(
        &self,
        user_id: &str,
        waiting: SessionKey,
        signature: &str,
    ) -> Reply {
        let message = session::generate_auth_message(
            &waiting.session_public_key,
            user_id,
            &self.session_daily_cap,
            waiting.expires_at,
        );

        let recovered = match session::recover_address(&message, signature) {
            Ok(address) => address,
            Err(err) => return Reply::plain(format!("That signature didn't check out: {err}")),
        };

        match self.identities.find_by_user(user_id).await {
            Ok(Some(identity))
                if !recovered.eq_ignore_ascii_case(&identity.wallet_address) =>
            {
                return Reply::plain(
                    "That signature wasn't made by your linked wallet, so the session stays locked.",
                );
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "identity lookup failed during authorization");
            }
            _ => {}
        }

        let activated = SessionKey { wallet_address: recovered.clone(), ..waiting };
        if let Err(err) = self.sessions.save(&activated).await {
            return self.safety_write_failure("authorize", err.into());
        }

        tracing::info!(user_id, wallet = %recovered, "session key activated");
        Reply::plain(format!(
            "Session active until {} for wallet {recovered}. You can confirm transfers now.",
            activated.expires_at.to_rfc3339()
        ))
    }

    async fn handle_transfer(&self, user_id: &str, nlu: &NluResult) -> Reply {
        let mention_wallet = match &nlu.entities.mention {
            Some(mention) => {
                let outcome = self
                    .tools
                    .execute(ToolName::ResolveRecipient, &json!({ "mention": mention }))
                    .await;
                outcome
                    .result
                    .as_ref()
                    .and_then(|value| value["address"].as_str())
                    .map(str::to_string)
            }
            None => None,
        };

        let Some(plan) = self.planner.create(nlu, mention_wallet.as_deref()) else {
            return Reply::plain("Tell me the amount and who it goes to and I'll draft it.");
        };

        if !plan.ready_to_draft() {
            if let (Some(mention), None, None) =
                (&nlu.entities.mention, &nlu.entities.address, &mention_wallet)
            {
                return Reply::plain(format!(
                    "I don't have a wallet on file for {mention}. Share a 0x address, or have them link one, and I'll draft it."
                ));
            }
            let missing = plan
                .next_pending()
                .map(|step| step.description.clone())
                .unwrap_or_else(|| "a detail".to_string());
            return Reply::plain(format!("Almost there — next I need: {missing}"));
        }

        let Some(amount_raw) = nlu.entities.amount.as_deref() else {
            return Reply::plain("Tell me the amount and who it goes to and I'll draft it.");
        };
        let Ok(amount) = amount_raw.parse::<Decimal>() else {
            return Reply::plain(format!("I couldn't read `{amount_raw}` as an amount."));
        };
        let recipient = nlu
            .entities
            .address
            .clone()
            .or(mention_wallet)
            .unwrap_or_default();
        let token =
            nlu.entities.token.clone().unwrap_or_else(|| self.default_token.clone());

        match self.safety.draft(user_id, &recipient, &token, amount).await {
            Ok(DraftOutcome::Created(transfer)) => Reply::confirm_cancel(
                format!(
                    "Draft ready: send {amount} {token} to {recipient}.\nConfirm to execute or Cancel to drop it."
                ),
                &transfer.id,
            ),
            Ok(DraftOutcome::RateLimited { limit }) => Reply::plain(format!(
                "You've hit the daily draft limit ({limit} per day). Try again tomorrow, or cancel something pending first."
            )),
            Ok(DraftOutcome::UnresolvedRecipient { mention }) => Reply::plain(format!(
                "I don't have a wallet on file for {mention}. Share a 0x address, or have them link one, and I'll draft it."
            )),
            Err(err) => self.safety_write_failure("draft", err),
        }
    }

    async fn handle_general(
        &self,
        user_id: &str,
        display_name: &str,
        text: &str,
        nlu: &NluResult,
    ) -> Reply {
        if self.providers_enabled && self.within_completion_quota(user_id).await {
            let context = self.build_context(user_id, text).await;
            let user_content = if context.is_empty() {
                text.to_string()
            } else {
                format!("CONTEXT:\n{context}\n\nUSER: {text}")
            };
            let messages =
                [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_content)];

            let result = self.completion.chat(&messages).await;
            if result.is_success() {
                tracing::debug!(
                    provider = %result.provider,
                    model = %result.model,
                    latency_ms = result.latency_ms,
                    "provider reply accepted"
                );
                return Reply::plain(result.text);
            }

            tracing::warn!(
                user_id,
                provider = %result.provider,
                status = result.status,
                "all completion tiers failed, answering offline"
            );
            let offline = self.offline_reply(user_id, display_name, text, nlu).await;
            return Reply::plain(format!(
                "Small connection hiccup on my side — continuing offline.\n\n{offline}"
            ));
        }

        Reply::plain(self.offline_reply(user_id, display_name, text, nlu).await)
    }

    async fn offline_reply(
        &self,
        user_id: &str,
        display_name: &str,
        text: &str,
        nlu: &NluResult,
    ) -> String {
        match nlu.intent {
            Intent::WhoAmI => match self.facts.find(user_id, "name").await {
                Ok(Some(fact)) => format!(
                    "You're {}. I keep your facts on file and can draft transfers for you.",
                    fact.value
                ),
                _ => format!(
                    "I don't know you well yet, {display_name} — tell me \"my name is …\" and I'll remember."
                ),
            },
            Intent::Greet => format!("Hey {display_name}, good to see you. What do you need?"),
            Intent::Help => HELP_TEXT.to_string(),
            Intent::Status => self.status_summary(user_id).await,
            Intent::KbList => self.list_documents().await,
            Intent::KbAdd => self.learn_from(user_id, text).await,
            _ => self.answer_from_memory(user_id, display_name, text, nlu).await,
        }
    }

    /// Deep-research path: grounded knowledge answer first; only if the
    /// index has nothing does the single-shot ask chain get a chance.
    async fn research(&self, user_id: &str, text: &str) -> String {
        let ask = self.tools.execute(ToolName::KnowledgeAsk, &json!({ "question": text })).await;
        if ask.success {
            return render_knowledge_answer(ask.result.as_ref());
        }

        if self.providers_enabled && self.within_completion_quota(user_id).await {
            let context = self.build_context(user_id, text).await;
            let result = self.ask.ask(SYSTEM_PROMPT, text, &context).await;
            if result.is_success() {
                return result.text;
            }
        }

        "I don't have sources on that yet. Send me a link to study and ask again.".to_string()
    }

    async fn answer_from_memory(
        &self,
        user_id: &str,
        display_name: &str,
        text: &str,
        nlu: &NluResult,
    ) -> String {
        if let Some(name) = extract_taught_name(text) {
            return match self.facts.store(user_id, "name", &name, 1.0).await {
                Ok(()) => format!("Nice to meet you, {name}! I'll remember that."),
                Err(err) => {
                    tracing::warn!(user_id, error = %err, "fact storage failed");
                    format!("Nice to meet you, {name} — though my memory hiccuped, so remind me later.")
                }
            };
        }
        if let Some(note) = extract_taught_note(text) {
            let key: String = note.chars().take(30).collect();
            return match self.facts.store(user_id, &key, &note, 1.0).await {
                Ok(()) => "Noted — I've saved that.".to_string(),
                Err(err) => {
                    tracing::warn!(user_id, error = %err, "fact storage failed");
                    "I tried to save that but my memory hiccuped — tell me again later.".to_string()
                }
            };
        }

        let ask = self.tools.execute(ToolName::KnowledgeAsk, &json!({ "question": text })).await;
        if ask.success {
            return render_knowledge_answer(ask.result.as_ref());
        }

        match self.retrieval.retrieve(user_id, text).await {
            Ok(hits) => {
                if let Some(best) = hits.first() {
                    if self.retrieval.is_confident(best) {
                        let origin = match &best.source {
                            RetrievalSource::Knowledge { title, .. } => {
                                format!("(source: {title})")
                            }
                            RetrievalSource::Episode { .. } => {
                                "(from our earlier conversation)".to_string()
                            }
                        };
                        return format!("Here's what I know: {} {origin}", best.text);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "retrieval failed");
            }
        }

        template_reply(nlu.intent, display_name)
    }

    async fn status_summary(&self, user_id: &str) -> String {
        let now = Utc::now();
        let session = self.sessions.active_for_user(user_id, now).await.ok().flatten();
        let pending = self.transfers.latest_pending(user_id).await.ok().flatten();

        let session_line = match &session {
            Some(key) => format!("active until {}", key.expires_at.to_rfc3339()),
            None => "none — say \"connect\" to authorize one".to_string(),
        };
        let pending_line = match &pending {
            Some(transfer) => {
                format!("{} {} to {}", transfer.amount, transfer.token, transfer.recipient)
            }
            None => "none".to_string(),
        };
        let providers_line = if self.providers_enabled { "on" } else { "off" };

        format!(
            "Status report:\n• signing session: {session_line}\n• pending transfer: {pending_line}\n• smart replies: {providers_line}"
        )
    }

    async fn list_documents(&self) -> String {
        match self.knowledge.documents().await {
            Ok(documents) if documents.is_empty() => {
                "The knowledge base is empty. Send me a link and I'll read it.".to_string()
            }
            Ok(documents) => {
                let lines: Vec<String> =
                    documents.iter().map(|doc| format!("• {}", doc.title)).collect();
                format!("I've read:\n{}", lines.join("\n"))
            }
            Err(err) => {
                tracing::warn!(error = %err, "document listing failed");
                "I couldn't reach the knowledge base just now.".to_string()
            }
        }
    }

    async fn learn_from(&self, user_id: &str, text: &str) -> String {
        if let Some(url) = extract_url(text) {
            let outcome =
                self.tools.execute(ToolName::KnowledgeIngest, &json!({ "url": url })).await;
            return match outcome.result {
                Some(result) if outcome.success => {
                    let title = result["title"].as_str().unwrap_or("the document");
                    if result["duplicate"].as_bool().unwrap_or(false) {
                        format!("I've already read {title}; nothing new to index.")
                    } else {
                        let tldr = result["tldr"].as_str().unwrap_or("");
                        format!("Read and indexed {title}. TL;DR: {tldr}")
                    }
                }
                _ => format!(
                    "I couldn't ingest that: {}",
                    outcome.error.unwrap_or_else(|| "unknown failure".to_string())
                ),
            };
        }
        self.answer_from_memory(user_id, "", text, &self.parser.parse(text)).await
    }

    async fn within_completion_quota(&self, user_id: &str) -> bool {
        let today = window_date(Utc::now());
        let used = match self
            .rate_limits
            .current(user_id, &today, RateLimitKind::Completion)
            .await
        {
            Ok(used) => used,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "completion quota check failed");
                return false;
            }
        };
        if used >= self.completion_daily_limit {
            return false;
        }
        // Count the call before making it so a retried message can
        // never double-dip the quota.
        match self.rate_limits.increment(user_id, &today, RateLimitKind::Completion).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "completion quota increment failed");
                false
            }
        }
    }

    async fn build_context(&self, user_id: &str, text: &str) -> String {
        let facts = self.facts.all_for_user(user_id).await.unwrap_or_default();
        let episodes = self.episodes.recent(user_id, 3).await.unwrap_or_default();
        let hits = self.retrieval.retrieve(user_id, text).await.unwrap_or_default();
        package_context(&facts, &episodes, &hits)
    }

    fn safety_write_failure(
        &self,
        action: &str,
        err: crate::safety::SafetyError,
    ) -> Reply {
        tracing::error!(action, error = %err, "safety-machine write failed");
        Reply::plain(format!(
            "I couldn't safely record that {action}, so I'm treating it as not done. Please try again."
        ))
    }

    async fn finalize(
        &self,
        user_id: &str,
        display_name: &str,
        input: &str,
        nlu: &NluResult,
        reply: Reply,
        apply_self_check: bool,
    ) -> Reply {
        let reply = match (&reply, apply_self_check) {
            (Reply::Plain(draft), true) => {
                let recent = self.recent_replies(user_id).await;
                Reply::Plain(self.self_check.review(draft, display_name, &recent))
            }
            _ => reply,
        };

        let episode =
            Episode::new(user_id, input, nlu.intent, nlu.entities.clone(), reply.text());
        if let Err(err) = self.episodes.log(&episode, self.episode_retention).await {
            tracing::warn!(user_id, error = %err, "episode logging failed; reply still sent");
        }

        reply
    }

    async fn recent_replies(&self, user_id: &str) -> Vec<String> {
        self.episodes
            .recent(user_id, 5)
            .await
            .map(|episodes| episodes.into_iter().map(|episode| episode.output_text).collect())
            .unwrap_or_default()
    }
}

fn render_knowledge_answer(result: Option<&serde_json::Value>) -> String {
    let Some(result) = result else {
        return "I found something but couldn't render it.".to_string();
    };
    let answer = result["answer"].as_str().unwrap_or("");
    let citations = result["citations"]
        .as_array()
        .map(|citations| {
            citations
                .iter()
                .enumerate()
                .map(|(i, citation)| {
                    format!(
                        "[{}] {} — {}",
                        i + 1,
                        citation["title"].as_str().unwrap_or("untitled"),
                        citation["source"].as_str().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if citations.is_empty() {
        answer.to_string()
    } else {
        format!("{answer}\n\nSources:\n{citations}")
    }
}

fn template_reply(intent: Intent, display_name: &str) -> String {
    match intent {
        Intent::Troubleshoot => {
            "Walk me through what's failing and I'll check it against what I know.".to_string()
        }
        Intent::Explain | Intent::Summarize => {
            "I can explain or summarize things I've read — ask about one of my sources or send a new link.".to_string()
        }
        Intent::Distribute => {
            "Bulk distribution isn't wired up; I can draft transfers one at a time.".to_string()
        }
        Intent::KbSearch => {
            "Nothing on file matches that. Send me a link to study and ask again.".to_string()
        }
        _ => format!(
            "I don't have anything solid on that yet, {display_name}. Teach me with \"remember that …\" or send a link to read."
        ),
    }
}

fn extract_taught_name(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    // Lowercasing can shift byte offsets for a handful of scripts;
    // slicing by the lowered offsets is only sound when it didn't.
    if lowered.len() != text.len() {
        return None;
    }
    for prefix in ["my name is", "call me"] {
        if let Some(position) = lowered.find(prefix) {
            let name = text[position + prefix.len()..].trim().trim_end_matches('.').trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn extract_taught_note(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    if lowered.len() != text.len() {
        return None;
    }
    for prefix in ["remember that", "remember:"] {
        if let Some(position) = lowered.find(prefix) {
            let note = text[position + prefix.len()..].trim();
            if note.chars().count() > 2 {
                return Some(note.to_string());
            }
        }
    }
    None
}

fn extract_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        .map(str::to_string)
}
