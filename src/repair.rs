//! Turns failed checks into prompt amendments for the next generation attempt.

use crate::evaluator::{CheckKind, CheckOutcome, CheckResults};

/// Prompts longer than this many characters are truncated.
pub const MAX_PROMPT_CHARS: usize = 800;
/// Characters kept when truncating, before the ellipsis.
pub const TRUNCATED_PROMPT_CHARS: usize = 750;
pub const ELLIPSIS: &str = "...";
pub const MINOR_ISSUES: &str = "minor issues";

struct Rule {
    check: CheckKind,
    problem: &'static str,
    /// Appended to the prompt when set. Only failures the generator reliably
    /// corrects from text carry an instruction.
    instruction: Option<&'static str>,
}

const RULES: [Rule; 6] = [
    Rule {
        check: CheckKind::HandIntegrity,
        problem: "deformed fingers or hands",
        instruction: Some(
            "Hands and fingers must have a natural shape with no fused fingers. \
             Each hand must have five correctly formed fingers.",
        ),
    },
    Rule {
        check: CheckKind::NoSelfIntersection,
        problem: "arms intersecting the body",
        instruction: Some("Arms must not intersect the body or appear inside it."),
    },
    Rule {
        check: CheckKind::Proportions,
        problem: "unnatural body proportions",
        instruction: None,
    },
    Rule {
        check: CheckKind::JointAngles,
        problem: "unnatural joint angles",
        instruction: None,
    },
    Rule {
        check: CheckKind::Symmetry,
        problem: "asymmetric limbs",
        instruction: None,
    },
    Rule {
        check: CheckKind::LimbPresence,
        problem: "missing limbs",
        instruction: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Repair {
    pub prompt: String,
    pub problems: Vec<&'static str>,
}

impl Repair {
    /// Comma separated problem names, or [`MINOR_ISSUES`] when none were named.
    pub fn summary(&self) -> String {
        if self.problems.is_empty() {
            MINOR_ISSUES.to_owned()
        } else {
            self.problems.join(", ")
        }
    }
}

/// Build the prompt for the next attempt from the failed checks of this one.
pub fn repair_prompt(prompt: &str, checks: &CheckResults) -> Repair {
    let mut repaired = prompt.to_owned();
    let mut problems = Vec::new();

    for rule in RULES.iter() {
        if checks.get(rule.check) != CheckOutcome::Fail {
            continue;
        }
        problems.push(rule.problem);
        // prompts carried between attempts already hold earlier instructions
        if let Some(instruction) = rule.instruction.filter(|text| !repaired.contains(text)) {
            repaired.push(' ');
            repaired.push_str(instruction);
        }
    }

    Repair {
        prompt: truncate(repaired),
        problems,
    }
}

fn truncate(prompt: String) -> String {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        return prompt;
    }
    let mut truncated: String = prompt.chars().take(TRUNCATED_PROMPT_CHARS).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
