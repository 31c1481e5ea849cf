//! Multi-step plan derivation. Only transfer intents need one today;
//! the planner describes readiness and never persists anything. The
//! orchestrator owns draft creation once steps are complete.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::nlu::{Intent, NluResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Resolve,
    Draft,
    Confirm,
    Info,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub action: StepAction,
    pub params: serde_json::Value,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlanKind {
    Intent(Intent),
    Skill(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub kind: PlanKind,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn next_pending(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.status == StepStatus::Pending)
    }

    /// True when recipient resolution and parameter drafting are both
    /// complete and only the confirmation wait remains.
    pub fn ready_to_draft(&self) -> bool {
        self.steps
            .iter()
            .filter(|step| matches!(step.action, StepAction::Resolve | StepAction::Draft))
            .all(|step| step.status == StepStatus::Completed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransferPlanner;

impl TransferPlanner {
    /// Derive a plan from parsed entities. `stored_wallet` is the
    /// wallet mapping the caller pre-fetched for the message's
    /// `@mention`, if any; passing it in keeps this type I/O-free.
    pub fn create(&self, nlu: &NluResult, stored_wallet: Option<&str>) -> Option<Plan> {
        if nlu.intent != Intent::TransferIntent {
            return None;
        }
        Some(self.transfer_plan(nlu, stored_wallet))
    }

    fn transfer_plan(&self, nlu: &NluResult, stored_wallet: Option<&str>) -> Plan {
        let entities = &nlu.entities;

        let resolved: Option<String> = entities
            .address
            .clone()
            .or_else(|| stored_wallet.map(str::to_string))
            .or_else(|| entities.mention.clone());
        let resolved_to_address = resolved
            .as_deref()
            .map(|recipient| recipient.starts_with("0x"))
            .unwrap_or(false);

        let mut steps = Vec::with_capacity(3);

        steps.push(PlanStep {
            id: "resolve_recipient".to_string(),
            description: format!(
                "Resolve recipient: {}",
                resolved.as_deref().unwrap_or("unknown")
            ),
            action: StepAction::Resolve,
            params: json!({ "recipient": resolved }),
            status: if resolved_to_address { StepStatus::Completed } else { StepStatus::Pending },
        });

        let amount = entities.amount.as_deref();
        let token = entities.token.as_deref().unwrap_or("USDC");
        steps.push(PlanStep {
            id: "draft_transfer".to_string(),
            description: format!("Draft transfer of {} {}", amount.unwrap_or("?"), token),
            action: StepAction::Draft,
            params: json!({ "amount": amount, "token": token, "recipient": resolved }),
            status: if amount.is_some() && resolved_to_address {
                StepStatus::Completed
            } else {
                StepStatus::Pending
            },
        });

        steps.push(PlanStep {
            id: "wait_confirm".to_string(),
            description: "Waiting for your confirmation".to_string(),
            action: StepAction::Confirm,
            params: json!({}),
            status: StepStatus::Pending,
        });

        Plan { kind: PlanKind::Intent(Intent::TransferIntent), steps }
    }
}

#[cfg(test)]
mod tests {
    use crate::nlu::IntentParser;

    use super::{StepStatus, TransferPlanner};

    fn plan_for(text: &str, stored_wallet: Option<&str>) -> super::Plan {
        let nlu = IntentParser::default().parse(text);
        TransferPlanner.create(&nlu, stored_wallet).expect("transfer plan")
    }

    #[test]
    fn non_transfer_intents_produce_no_plan() {
        let nlu = IntentParser::default().parse("hello there");
        assert!(TransferPlanner.create(&nlu, None).is_none());
    }

    #[test]
    fn literal_address_completes_resolution() {
        let plan = plan_for("send 5 to 0x00000000000000000000000000000000000000aa", None);
        assert_eq!(plan.steps[0].status, StepStatus::Completed);
        assert_eq!(plan.steps[1].status, StepStatus::Completed);
        assert_eq!(plan.steps[2].status, StepStatus::Pending);
        assert!(plan.ready_to_draft());
    }

    #[test]
    fn mention_with_stored_wallet_resolves() {
        let plan = plan_for("send 5 to @sam", Some("0x00000000000000000000000000000000000000bb"));
        assert!(plan.ready_to_draft());
        assert_eq!(
            plan.steps[1].params["recipient"],
            "0x00000000000000000000000000000000000000bb"
        );
    }

    #[test]
    fn unmapped_mention_leaves_resolution_pending() {
        let plan = plan_for("send 5 to @sam", None);
        assert_eq!(plan.steps[0].status, StepStatus::Pending);
        assert!(!plan.ready_to_draft());
        assert_eq!(plan.next_pending().map(|s| s.id.as_str()), Some("resolve_recipient"));
    }

    #[test]
    fn missing_amount_leaves_draft_pending() {
        let plan = plan_for("send to 0x00000000000000000000000000000000000000aa", None);
        assert_eq!(plan.steps[0].status, StepStatus::Completed);
        assert_eq!(plan.steps[1].status, StepStatus::Pending);
        assert!(!plan.ready_to_draft());
    }

    #[test]
    fn confirmation_step_always_starts_pending() {
        let plan = plan_for("send 1 to 0x00000000000000000000000000000000000000aa", None);
        assert_eq!(plan.steps[2].id, "wait_confirm");
        assert_eq!(plan.steps[2].status, StepStatus::Pending);
    }
}
