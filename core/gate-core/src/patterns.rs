//! Compiled regex patterns for classifying prompts, commands, and files.
//!
//! These patterns are compiled once on first use and reused by every
//! classifier. They are heuristics over conversational text, not a grammar;
//! each positive trigger is paired with disqualifiers that veto it.
//! Update these when the phrasing users rely on changes.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Orchestration Trigger Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_ACTIVATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(orchestrate|orchestration mode|orchestrator)\b").unwrap());
pub static RE_ACTIVATE_VETO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cancel|stop|exit|disable|abort|without)\b|\b(don't|do not)\b").unwrap()
});

pub static RE_RECON_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(recon|reconnaissance|exploration)\b").unwrap());
pub static RE_INTERVIEW_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(interview|questions)\b").unwrap());
pub static RE_DONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(complete|completed|done|finished|answered)\b").unwrap());
pub static RE_DONE_VETO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(not|isn't|incomplete|still|yet)\b").unwrap());

pub static RE_APPROVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(approve|approved|lgtm|looks good|ship it|go ahead|proceed)\b").unwrap()
});
pub static RE_APPROVE_VETO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(not|don't|no|wait|hold|revise|change|but)\b").unwrap()
});

pub static RE_CANCEL_VERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(cancel|exit|stop|abort|quit)\b").unwrap());
pub static RE_CANCEL_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(orchestrat\w*|workflow|gate)\b").unwrap());
pub static RE_CANCEL_VETO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(don't|do not|never)\b").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Task Type Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_IMPLEMENTATION_TASK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(implement|build|add|create|fix|refactor|write|migrate|integrate)\b")
        .unwrap()
});
pub static RE_RESEARCH_TASK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(research|investigate|explore|analy[sz]e|understand|explain|compare|evaluate)\b")
        .unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// Command And Agent Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// Test and lint runners in command position: at the start of the line or
/// after a separator, optionally behind env assignments or `time`. A tool
/// name that only appears as an argument (`cat pytest.ini`) does not count.
pub static RE_VERIFICATION_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^|[;&|(])\s*",
        r"(?:[A-Za-z_][A-Za-z0-9_]*=\S*\s+)*",
        r"(?:time\s+)?",
        r"(?:",
        r"(?:npm|pnpm|yarn|bun)\s+(?:run\s+)?(?:test|lint|typecheck)",
        r"|cargo\s+(?:test|clippy|nextest)",
        r"|go\s+(?:test|vet)",
        r"|make\s+(?:test|lint|check)",
        r"|python3?\s+-m\s+(?:pytest|unittest)",
        r"|npx\s+(?:jest|vitest|mocha|eslint|tsc)",
        r"|(?:pytest|jest|vitest|mocha|eslint|ruff|mypy|tsc|flake8|pylint|golangci-lint|rspec)",
        r")\b",
    ))
    .unwrap()
});

pub static RE_EXPLORATORY_AGENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(scout|explore|explorer|research|researcher|recon|oracle|analyst|search)")
        .unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// File Classification Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// Tool configs that look like code but are configuration.
pub static RE_CONFIG_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.config\.(js|ts|mjs|cjs)$").unwrap());

/// Source-code extensions. Anything else counts as configuration or docs.
pub static RE_CODE_EXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(ts|tsx|js|jsx|mjs|cjs|py|rs|go|java|kt|kts|swift|c|h|cc|cpp|hpp|cs|rb|php|scala|sh|bash|zsh|vue|svelte|sql|dart|lua|ex|exs|elm|hs|ml|clj|m|mm)$")
        .unwrap()
});
