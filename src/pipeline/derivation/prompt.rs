use super::types::DerivationKind;

/// Only the head of a document is sent to the generator.
pub const MAX_PROMPT_CHARS: usize = 4000;

pub const SCOPE_SUMMARY_FALLBACK: &str = "Error generating scope summary";
pub const CLARIFYING_QUESTIONS_FALLBACK: &str = "Error generating clarifying questions";

pub const TICKETS_SYSTEM_PROMPT: &str =
    "You are a project manager who creates clear, actionable tickets from document content.";

pub const SCOPE_SUMMARY_SYSTEM_PROMPT: &str =
    "You are a project manager who creates clear, concise scope summaries.";

pub const CLARIFYING_QUESTIONS_SYSTEM_PROMPT: &str =
    "You are a senior project manager who identifies potential risks and ambiguities in requirements.";

/// First `MAX_PROMPT_CHARS` characters, never splitting a character.
pub fn truncate_for_prompt(text: &str) -> &str {
    match text.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn system_prompt(kind: DerivationKind) -> &'static str {
    match kind {
        DerivationKind::Tickets => TICKETS_SYSTEM_PROMPT,
        DerivationKind::ScopeSummary => SCOPE_SUMMARY_SYSTEM_PROMPT,
        DerivationKind::ClarifyingQuestions => CLARIFYING_QUESTIONS_SYSTEM_PROMPT,
    }
}

pub fn build_prompt(kind: DerivationKind, content: &str) -> String {
    match kind {
        DerivationKind::Tickets => build_tickets_prompt(content),
        DerivationKind::ScopeSummary => build_scope_summary_prompt(content),
        DerivationKind::ClarifyingQuestions => build_clarifying_questions_prompt(content),
    }
}

pub fn build_tickets_prompt(content: &str) -> String {
    let excerpt = truncate_for_prompt(content);
    format!(
        r#"Create actionable tickets from this document content:

{excerpt}

Create 3-5 specific tickets. Return them in this exact JSON format:
[
    {{
        "title": "Short, clear title",
        "description": "Detailed description of what needs to be done",
        "priority": "HIGH",
        "estimated_hours": 2.5
    }}
]

Important: Return ONLY the JSON array, no other text."#
    )
}

pub fn build_scope_summary_prompt(content: &str) -> String {
    let excerpt = truncate_for_prompt(content);
    format!(
        r#"Create a concise project scope summary from this document:

{excerpt}

Include:
1. Project Overview (2-3 sentences)
2. Key Deliverables (bullet points)
3. Major Constraints or Dependencies
4. Out of Scope Items (if any)

Write in a clear, natural format."#
    )
}

pub fn build_clarifying_questions_prompt(content: &str) -> String {
    let excerpt = truncate_for_prompt(content);
    format!(
        r#"Review this document content and generate important clarifying questions:

{excerpt}

Create 3-5 specific questions that would help clarify requirements or potential ambiguities.
For each question:
1. What needs to be clarified?
2. Why is this important?
3. What impact could this have on the project?

Write in a clear, natural format."#
    )
}
