//! System instruction assembly
//!
//! Sections are appended in a fixed order:
//!
//! 1. core behavioural contract (always)
//! 2. one intent addendum (coding, reasoning, research only)
//! 3. product addendum (only when the product detector fires)
//! 4. artifact/file generation addendum (always)
//! 5. clock context (always)
//! 6. user preference, verbatim (when non-empty)
//!
//! Identical inputs produce byte-identical output.

use crate::router::Intent;
use chrono::{DateTime, Utc};

pub const CORE_CONTRACT: &str = "\
You are a precise, knowledgeable assistant.

Before answering, work through these steps silently and never show them:
1. Identify what is actually being asked and what a complete answer needs.
2. Recall the relevant facts, and separate what you know from what you would be guessing.
3. Decide on the shortest structure that fully answers the question.

Formatting:
- Lead with the answer. No greetings, no restating the question, no preamble.
- Use Markdown headings and lists only when they make the answer easier to scan.
- Put code, commands and file contents in fenced code blocks with a language tag.
- Do not end with offers of further help or unsolicited follow-up questions.

Tone: direct, confident and neutral. Say so plainly when you are unsure.";

pub const CODING_ADDENDUM: &str = "\
Coding requests:
- Fix first, explanation after: give the corrected or complete code before any discussion.
- Return complete, runnable code, not fragments with placeholders.
- When debugging, name the root cause in one sentence, then show the fix.
- Keep explanations short and tied to specific lines.";

pub const REASONING_ADDENDUM: &str = "\
Analytical requests:
- State the conclusion first, then the reasoning that supports it.
- Make assumptions explicit and note where the answer would change if they fail.
- Weigh trade-offs side by side instead of listing them separately.";

pub const RESEARCH_ADDENDUM: &str = "\
Research requests:
- Prefer primary and authoritative sources and cite them.
- Distinguish established consensus from open debate.
- Give dates and figures precisely; do not round away meaningful detail.";

pub const PRODUCT_ADDENDUM: &str = "\
Product and shopping requests:
- Recommend specific current models with approximate prices and where they are sold.
- Explain who each option is best for in one line.
- Use a comparison table when comparing three or more products.
- Say when prices or availability may have changed since your sources were published.";

pub const ARTIFACT_ADDENDUM: &str = "\
Generated files:
- When asked to create a file, output its full contents in a single fenced block tagged with the file's language.
- Put the intended file name on the line directly above the block.
- Never split one file across several blocks.";

/// Intent-specific addendum, if the intent has one
pub fn intent_addendum(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Coding => Some(CODING_ADDENDUM),
        Intent::Reasoning => Some(REASONING_ADDENDUM),
        Intent::Research => Some(RESEARCH_ADDENDUM),
        Intent::Live | Intent::General | Intent::Math => None,
    }
}

/// Clock context block for `now`
pub fn clock_context(now: DateTime<Utc>) -> String {
    format!(
        "Current date and time: {} (UTC). Treat this as today when answering questions about recent or upcoming events.",
        now.format("%A, %B %-d, %Y %H:%M")
    )
}

/// Inputs to the assembler
#[derive(Debug, Clone, Copy)]
pub struct InstructionContext<'a> {
    pub intent: Intent,
    pub is_product_query: bool,
    pub user_preference: &'a str,
    pub now: DateTime<Utc>,
}

/// Ordered sections of the instruction set
pub fn sections(context: &InstructionContext<'_>) -> Vec<String> {
    let mut sections = vec![CORE_CONTRACT.to_string()];

    if let Some(addendum) = intent_addendum(context.intent) {
        sections.push(addendum.to_string());
    }

    if context.is_product_query {
        sections.push(PRODUCT_ADDENDUM.to_string());
    }

    sections.push(ARTIFACT_ADDENDUM.to_string());
    sections.push(clock_context(context.now));

    if !context.user_preference.trim().is_empty() {
        sections.push(format!("User preferences:\n{}", context.user_preference));
    }

    sections
}

/// Render the full system instruction
pub fn assemble(context: &InstructionContext<'_>) -> String {
    sections(context).join("\n\n")
}
