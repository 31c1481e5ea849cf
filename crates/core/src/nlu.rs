//! Deterministic intent parsing.
//!
//! Matching is first-match over an ordered table of phrase groups: the
//! ordering below is a designed priority, not an accident, and tests
//! pin it. Entity extraction runs independently of intent via regex.
//! This module performs no I/O and never blocks.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greet,
    Help,
    WhoAmI,
    Connect,
    Status,
    TransferIntent,
    TxConfirm,
    TxCancel,
    KbSearch,
    DeepResearch,
    Distribute,
    KbAdd,
    KbList,
    Troubleshoot,
    Explain,
    Summarize,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::Help => "help",
            Self::WhoAmI => "whoami",
            Self::Connect => "connect",
            Self::Status => "status",
            Self::TransferIntent => "transfer_intent",
            Self::TxConfirm => "tx_confirm",
            Self::TxCancel => "tx_cancel",
            Self::KbSearch => "kb_search",
            Self::DeepResearch => "deep_research",
            Self::Distribute => "distribute",
            Self::KbAdd => "kb_add",
            Self::KbList => "kb_list",
            Self::Troubleshoot => "troubleshoot",
            Self::Explain => "explain",
            Self::Summarize => "summarize",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "greet" => Some(Self::Greet),
            "help" => Some(Self::Help),
            "whoami" => Some(Self::WhoAmI),
            "connect" => Some(Self::Connect),
            "status" => Some(Self::Status),
            "transfer_intent" => Some(Self::TransferIntent),
            "tx_confirm" => Some(Self::TxConfirm),
            "tx_cancel" => Some(Self::TxCancel),
            "kb_search" => Some(Self::KbSearch),
            "deep_research" => Some(Self::DeepResearch),
            "distribute" => Some(Self::Distribute),
            "kb_add" => Some(Self::KbAdd),
            "kb_list" => Some(Self::KbList),
            "troubleshoot" => Some(Self::Troubleshoot),
            "explain" => Some(Self::Explain),
            "summarize" => Some(Self::Summarize),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Structured values pulled out of the raw message text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl Entities {
    pub fn has_recipient_hint(&self) -> bool {
        self.mention.is_some() || self.address.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NluResult {
    pub intent: Intent,
    pub entities: Entities,
    pub confidence: f64,
}

/// Priority table. Earlier groups win when a message matches several;
/// e.g. "deep research" contains "search", so plain search outranks it.
/// The ordering is user-visible behavior and must not be re-sorted.
const PHRASE_GROUPS: &[(Intent, &[&str])] = &[
    (Intent::Greet, &["hi", "hello", "hey there", "ازيك", "يا هلا", "صباح", "مساء", "سلام"]),
    (Intent::Help, &["help", "commands", "ساعدني", "مساعده", "الاوامر"]),
    (Intent::WhoAmI, &["who am i", "what do you know about me", "انا مين", "تعرف ايه عني", "مين انا"]),
    (Intent::Connect, &["connect", "link my", "اربط", "وصل", "لينك"]),
    (Intent::Status, &["status", "are you ready", "الحاله", "جاهز"]),
    (Intent::TransferIntent, &["send", "transfer", "pay", "ابعت", "حول", "ارسل", "هات"]),
    (Intent::TxConfirm, &["confirm", "execute", "اكد", "نفذ", "تمام", "ماشي"]),
    (Intent::TxCancel, &["cancel", "الغاء", "كنسل", "لا خلاص"]),
    (Intent::KbSearch, &["search", "look up", "ابحث", "دور", "معلومات عن"]),
    (Intent::DeepResearch, &["deep research", "بحث عميق", "دور اوي"]),
    (Intent::Distribute, &["distribute", "airdrop", "وزع", "ايردروب"]),
    (Intent::KbAdd, &["kb_add", "ضيف معلومه", "سجل معلومه"]),
    (Intent::KbList, &["kb_list", "كل المعلومات", "قائمه"]),
    (Intent::Troubleshoot, &["troubleshoot", "not working", "مشكله", "مش شغال", "عطل"]),
    (Intent::Explain, &["explain", "what does", "اشرح", "يعني ايه"]),
    (Intent::Summarize, &["summarize", "لخص", "خلاصه", "ملخص"]),
];

pub struct IntentParser {
    default_token: String,
    amount_re: Regex,
    token_re: Regex,
    address_re: Regex,
    mention_re: Regex,
    tx_hash_re: Regex,
}

impl IntentParser {
    pub fn new(default_token: impl Into<String>) -> Self {
        Self {
            default_token: default_token.into(),
            amount_re: Regex::new(r"(\d+(?:\.\d+)?)").expect("amount regex is valid"),
            token_re: Regex::new(r"(?i)(USDC|ETH|USDT|GEM|ايثيريوم)").expect("token regex is valid"),
            address_re: Regex::new(r"0x[a-fA-F0-9]{40}").expect("address regex is valid"),
            mention_re: Regex::new(r"@\w+").expect("mention regex is valid"),
            tx_hash_re: Regex::new(r"0x[a-fA-F0-9]{64}").expect("tx hash regex is valid"),
        }
    }

    pub fn parse(&self, text: &str) -> NluResult {
        let normalized = normalize_text(text);

        let intent = PHRASE_GROUPS
            .iter()
            .find(|(_, phrases)| {
                phrases.iter().any(|phrase| normalized.contains(&normalize_text(phrase)))
            })
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Unknown);

        let entities = self.extract_entities(text, &normalized);

        let mut confidence = 0.5;
        if intent != Intent::Unknown {
            confidence = 0.9;
        }
        if intent == Intent::TransferIntent
            && (entities.amount.is_some() || entities.has_recipient_hint())
        {
            confidence = 1.0;
        }

        NluResult { intent, entities, confidence }
    }

    fn extract_entities(&self, raw: &str, normalized: &str) -> Entities {
        let mut entities = Entities::default();

        // A 64-hex transaction hash also starts with 40 valid address
        // characters; extract the hash first and suppress the shorter
        // match when it is merely the hash's prefix.
        let tx_hash = self.tx_hash_re.find(raw);
        entities.tx_hash = tx_hash.map(|m| m.as_str().to_string());

        if let Some(addr) = self.address_re.find(raw) {
            let shadowed_by_hash =
                tx_hash.map(|hash| hash.start() == addr.start()).unwrap_or(false);
            if !shadowed_by_hash {
                entities.address = Some(addr.as_str().to_string());
            }
        }

        entities.amount = self.amount_re.find(raw).map(|m| m.as_str().to_string());

        entities.token = self.token_re.find(raw).map(|m| {
            let symbol = m.as_str();
            if symbol == "ايثيريوم" {
                "ETH".to_string()
            } else {
                symbol.to_ascii_uppercase()
            }
        });
        if entities.token.is_none() && entities.amount.is_some() {
            entities.token = Some(self.default_token.clone());
        }

        entities.mention = self.mention_re.find(raw).map(|m| m.as_str().to_string());

        if normalized.contains("base") || normalized.contains("بيز") {
            entities.chain = Some("Base".to_string());
        }

        entities
    }
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new("USDC")
    }
}

#[cfg(test)]
mod tests {
    use super::{Entities, Intent, IntentParser};

    fn parser() -> IntentParser {
        IntentParser::default()
    }

    #[test]
    fn all_supported_trigger_phrases_resolve_to_expected_intent() {
        let cases = [
            ("hello there", Intent::Greet),
            ("يا هلا بيك", Intent::Greet),
            ("can you show the commands", Intent::Help),
            ("who am i to you", Intent::WhoAmI),
            ("connect my wallet", Intent::Connect),
            ("are you ready yet", Intent::Status),
            ("transfer 5 to @sam", Intent::TransferIntent),
            ("ابعت حاجه", Intent::TransferIntent),
            ("confirm it now", Intent::TxConfirm),
            ("cancel everything", Intent::TxCancel),
            ("معلومات عن التوكن", Intent::KbSearch),
            ("distribute the airdrop", Intent::Distribute),
            ("troubleshoot my node", Intent::Troubleshoot),
            ("explain gas fees", Intent::Explain),
            ("summarize the doc", Intent::Summarize),
            ("random chatter", Intent::Unknown),
        ];

        for (text, expected) in cases {
            assert_eq!(parser().parse(text).intent, expected, "{text}");
        }
    }

    #[test]
    fn earlier_priority_group_wins_on_overlap() {
        // "deep research" contains the plain-search trigger "search".
        let result = parser().parse("run a deep research on stablecoins");
        assert_eq!(result.intent, Intent::KbSearch);

        // Greeting outranks transfer when both phrase sets appear.
        let result = parser().parse("hello please send 5");
        assert_eq!(result.intent, Intent::Greet);
    }

    #[test]
    fn extracts_transfer_entities() {
        let result = parser().parse("send 12.5 USDT to @ahmed on base");
        assert_eq!(
            result.entities,
            Entities {
                amount: Some("12.5".to_string()),
                token: Some("USDT".to_string()),
                mention: Some("@ahmed".to_string()),
                address: None,
                chain: Some("Base".to_string()),
                tx_hash: None,
            }
        );
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn amount_without_symbol_defaults_to_configured_token() {
        let result = parser().parse("send 3 to @sam");
        assert_eq!(result.entities.token.as_deref(), Some("USDC"));
    }

    #[test]
    fn bare_transfer_phrase_has_matched_confidence_only() {
        let result = parser().parse("please transfer something");
        assert_eq!(result.intent, Intent::TransferIntent);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn unknown_intent_keeps_baseline_confidence() {
        let result = parser().parse("the weather is nice");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn extracts_hex_address() {
        let addr = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
        let result = parser().parse(&format!("send 1 to {addr}"));
        assert_eq!(result.entities.address.as_deref(), Some(addr));
        assert!(result.entities.tx_hash.is_none());
    }

    #[test]
    fn tx_hash_is_not_misread_as_address() {
        let hash = format!("0x{}", "ab".repeat(32));
        let result = parser().parse(&format!("what happened to {hash}"));
        assert_eq!(result.entities.tx_hash.as_deref(), Some(hash.as_str()));
        assert!(result.entities.address.is_none());
    }

    #[test]
    fn arabic_token_alias_maps_to_eth() {
        let result = parser().parse("ابعت 2 ايثيريوم");
        assert_eq!(result.entities.token.as_deref(), Some("ETH"));
    }

    #[test]
    fn intent_round_trips_through_storage_encoding() {
        let all = [
            Intent::Greet,
            Intent::Help,
            Intent::WhoAmI,
            Intent::Connect,
            Intent::Status,
            Intent::TransferIntent,
            Intent::TxConfirm,
            Intent::TxCancel,
            Intent::KbSearch,
            Intent::DeepResearch,
            Intent::Distribute,
            Intent::KbAdd,
            Intent::KbList,
            Intent::Troubleshoot,
            Intent::Explain,
            Intent::Summarize,
            Intent::Unknown,
        ];
        for intent in all {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
    }
}
