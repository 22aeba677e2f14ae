//! Free text → orchestration intent.
//!
//! The state machine only ever sees a [`TransitionIntent`]. Where intents come
//! from is behind [`IntentClassifier`], so structured commands can replace the
//! phrase heuristics without touching the transition table.

use regex::Regex;

use super::orchestration::TaskType;
use crate::patterns::{
    RE_ACTIVATE, RE_ACTIVATE_VETO, RE_APPROVE, RE_APPROVE_VETO, RE_CANCEL_OBJECT, RE_CANCEL_VERB,
    RE_CANCEL_VETO, RE_DONE, RE_DONE_VETO, RE_IMPLEMENTATION_TASK, RE_INTERVIEW_SUBJECT,
    RE_RECON_SUBJECT, RE_RESEARCH_TASK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionIntent {
    Activate { task_type: TaskType },
    ReconComplete,
    InterviewComplete,
    PlanApproved,
    Cancel,
}

pub trait IntentClassifier {
    fn classify(&self, input: &str) -> Option<TransitionIntent>;
}

/// Fires only when every positive pattern matches and no negative one does.
pub struct TriggerRule {
    pub positive: Vec<&'static Regex>,
    pub negative: Vec<&'static Regex>,
    pub intent: fn(&str) -> TransitionIntent,
}

impl TriggerRule {
    pub fn matches(&self, input: &str) -> bool {
        self.positive.iter().all(|re| re.is_match(input))
            && !self.negative.iter().any(|re| re.is_match(input))
    }
}

/// Ordered rule list; the first rule that matches wins.
pub struct PatternClassifier {
    rules: Vec<TriggerRule>,
}

impl PatternClassifier {
    pub fn with_rules(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        // Cancel comes first: "stop the orchestration" also mentions orchestration.
        Self::with_rules(vec![
            TriggerRule {
                positive: vec![&*RE_CANCEL_VERB, &*RE_CANCEL_OBJECT],
                negative: vec![&*RE_CANCEL_VETO],
                intent: |_| TransitionIntent::Cancel,
            },
            TriggerRule {
                positive: vec![&*RE_ACTIVATE],
                negative: vec![&*RE_ACTIVATE_VETO],
                intent: |input| TransitionIntent::Activate {
                    task_type: classify_task_type(input),
                },
            },
            TriggerRule {
                positive: vec![&*RE_RECON_SUBJECT, &*RE_DONE],
                negative: vec![&*RE_DONE_VETO],
                intent: |_| TransitionIntent::ReconComplete,
            },
            TriggerRule {
                positive: vec![&*RE_INTERVIEW_SUBJECT, &*RE_DONE],
                negative: vec![&*RE_DONE_VETO],
                intent: |_| TransitionIntent::InterviewComplete,
            },
            TriggerRule {
                positive: vec![&*RE_APPROVE],
                negative: vec![&*RE_APPROVE_VETO],
                intent: |_| TransitionIntent::PlanApproved,
            },
        ])
    }
}

impl IntentClassifier for PatternClassifier {
    fn classify(&self, input: &str) -> Option<TransitionIntent> {
        self.rules
            .iter()
            .find(|rule| rule.matches(input))
            .map(|rule| (rule.intent)(input))
    }
}

/// Implementation wording wins over research wording, since it is the stricter
/// gate.
pub fn classify_task_type(input: &str) -> TaskType {
    if RE_IMPLEMENTATION_TASK.is_match(input) {
        TaskType::Implementation
    } else if RE_RESEARCH_TASK.is_match(input) {
        TaskType::Research
    } else {
        TaskType::Unknown
    }
}
