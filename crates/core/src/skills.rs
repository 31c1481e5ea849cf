//! Pre-authored procedures for known workflows. The book is a static
//! registry built at startup; skills are matched by case-insensitive
//! substring against their trigger phrases and preempt both the
//! planner and the provider router.

use serde_json::json;

use crate::planner::{Plan, PlanKind, PlanStep, StepAction, StepStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skill {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub steps: &'static [&'static str],
}

const BUILTIN_SKILLS: &[Skill] = &[
    Skill {
        name: "wallet_hygiene",
        triggers: &["wallet safety", "keep my wallet safe", "امن المحفظه"],
        steps: &[
            "Never share your seed phrase or private key with anyone, including me.",
            "Double-check the first and last four characters of any address before sending.",
            "Start with a small test amount when paying a new recipient.",
            "Revoke unused token approvals periodically.",
        ],
    },
    Skill {
        name: "session_authorization",
        triggers: &["authorize a session", "how do i authorize", "session key"],
        steps: &[
            "Ask me to start an authorization and I will generate a fresh session key.",
            "Sign the exact message I send you with your own wallet.",
            "Send the signature back; I verify it before the key can ever sign.",
            "The key expires after 24 hours and is capped by the daily limit.",
        ],
    },
    Skill {
        name: "first_transfer",
        triggers: &["how do i send", "first transfer", "ازاي ابعت"],
        steps: &[
            "Tell me the amount, the token, and who it goes to (an @handle or 0x address).",
            "I draft the transfer and show you a confirmation card.",
            "Nothing moves until you press Confirm on an active session.",
        ],
    },
];

#[derive(Clone, Debug)]
pub struct SkillBook {
    skills: Vec<Skill>,
}

impl Default for SkillBook {
    fn default() -> Self {
        Self { skills: BUILTIN_SKILLS.to_vec() }
    }
}

impl SkillBook {
    pub fn with_skills(skills: Vec<Skill>) -> Self {
        Self { skills }
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Linear scan, first match wins.
    pub fn find(&self, text: &str) -> Option<&Skill> {
        let haystack = text.to_lowercase();
        self.skills.iter().find(|skill| {
            skill.triggers.iter().any(|trigger| haystack.contains(&trigger.to_lowercase()))
        })
    }

    /// Convert a skill into an informational pseudo-plan. Skills carry
    /// no side effects; every step is an INFO line.
    pub fn run(&self, skill: &Skill) -> Plan {
        let steps = skill
            .steps
            .iter()
            .enumerate()
            .map(|(idx, line)| PlanStep {
                id: format!("skill_step_{idx}"),
                description: (*line).to_string(),
                action: StepAction::Info,
                params: json!({}),
                status: StepStatus::Pending,
            })
            .collect();
        Plan { kind: PlanKind::Skill(skill.name.to_string()), steps }
    }
}

#[cfg(test)]
mod tests {
    use crate::planner::{PlanKind, StepAction, StepStatus};

    use super::SkillBook;

    #[test]
    fn finds_skill_by_case_insensitive_trigger() {
        let book = SkillBook::default();
        let skill = book.find("tips for Wallet SAFETY please").expect("skill match");
        assert_eq!(skill.name, "wallet_hygiene");
    }

    #[test]
    fn returns_none_when_no_trigger_matches() {
        assert!(SkillBook::default().find("what is the weather").is_none());
    }

    #[test]
    fn first_matching_skill_wins() {
        let book = SkillBook::default();
        let skill = book.find("wallet safety and session key advice").expect("skill match");
        assert_eq!(skill.name, "wallet_hygiene");
    }

    #[test]
    fn run_converts_steps_into_pending_info_plan() {
        let book = SkillBook::default();
        let skill = book.find("how do i authorize").expect("skill match");
        let plan = book.run(skill);

        assert_eq!(plan.kind, PlanKind::Skill("session_authorization".to_string()));
        assert_eq!(plan.steps.len(), 4);
        assert!(plan
            .steps
            .iter()
            .all(|step| step.action == StepAction::Info && step.status == StepStatus::Pending));
    }
}
