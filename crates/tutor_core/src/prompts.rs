//! crates/tutor_core/src/prompts.rs
//!
//! Builds the system instruction sent to the completion gateway for one turn.
//! Two mutually exclusive templates cover assessment and explanation turns;
//! both share a fixed suffix of output-formatting constraints.

use crate::domain::{ChapterContext, Intent, QuestionRecord};

const ASSESSMENT_TEMPLATE: &str = r#"You are a strict but friendly examiner helping a {grade} student work through the chapter "{chapter_title}" in {subject}.

The student is being assessed on the following question, worth {max_marks} marks:

QUESTION:
{question_text}

Your role:
- Evaluate the student's message as an answer to the question above.
- Be fair but rigorous: award full marks only for a complete, correct answer, and partial marks for partially correct answers.
- Keep a warm, encouraging tone even when the answer is wrong.
- You may rephrase the question conversationally when you present it, but grade against its original wording.

Your reply MUST contain, on its own line, exactly:
Score: <awarded>/{max_marks}
where <awarded> is the whole number of marks you are awarding.

After the score line, give a short explanation of what was right or missing, then immediately continue by asking the student the next question so the assessment keeps moving."#;

const EXPLAIN_TEMPLATE: &str = r#"You are a supportive tutor helping a {grade} student understand the chapter "{chapter_title}" in {subject}.

Your role:
- Answer the student's doubt clearly and patiently, at a level appropriate for their grade.
- Use short, concrete explanations with everyday examples where they help.
- Do not quiz the student or assign marks. Wait for the student to raise a doubt; once it is resolved you may gently offer a quick knowledge check, but only as an offer."#;

const FORMAT_RULES: &str = r#"

Output rules:
- Plain conversational text only. No markdown tables, LaTeX, or heavy math notation.
- Write units and symbols out in words where possible (for example "square centimetres" rather than notation).
- Keep the reply focused; avoid long essays."#;

/// Fallback when a context field is unknown.
const DEFAULT_GRADE: &str = "appropriate grade";
const DEFAULT_SUBJECT: &str = "general";

/// Composes the system instruction for one turn.
///
/// The question text and max marks are embedded verbatim; this function never
/// paraphrases the question (only the model may rephrase it
/// conversationally). Assessment intent without a selected question (an empty
/// bank) degrades to the explain template rather than failing.
pub fn compose_instruction(
    intent: Intent,
    question: Option<&QuestionRecord>,
    context: &ChapterContext,
) -> String {
    let grade = context.grade.as_deref().unwrap_or(DEFAULT_GRADE);
    let subject = context.subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
    let chapter_title = context.chapter_title.as_deref().unwrap_or("this chapter");

    let body = match (intent, question) {
        (Intent::Assessment, Some(q)) => ASSESSMENT_TEMPLATE
            .replace("{question_text}", &q.text)
            .replace("{max_marks}", &q.max_marks.to_string()),
        _ => EXPLAIN_TEMPLATE.to_string(),
    };

    let mut instruction = body
        .replace("{grade}", grade)
        .replace("{subject}", subject)
        .replace("{chapter_title}", chapter_title);
    instruction.push_str(FORMAT_RULES);
    instruction
}
