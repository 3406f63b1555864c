//! LLM prompts for grading and content generation.
//!
//! Each collaborator call is a system prompt plus a user template with
//! `{placeholder}` slots filled by the `build_*` helpers below.

/// System prompt for per-concept comprehension grading.
pub const SCORER_SYSTEM: &str = r#"You are a strict but fair grader. You will read the student's submission snippets and assess their comprehension of a target concept.
Return concise JSON with keys: score (0-100), pain_points (array of short strings), evidence (array of short quotes).
Score rubric:
- 90-100: Mastery (precise, transferable, correct terminology)
- 70-89: Proficient (mostly correct, minor gaps)
- 50-69: Developing (partial understanding, notable gaps)
- 0-49: Beginning (confused, misconceptions or missing)"#;

const SCORER_USER_TEMPLATE: &str = r#"Target Concept: "{concept}"
Student: {student_name}
Relevant snippets (not verbatim full text, only selected chunks):
{snippets}
Instructions:
- Use only the snippets and general knowledge of the concept (avoid hallucinations).
- Output JSON ONLY, no markdown."#;

/// System prompt for the per-student report.
pub const REPORT_SYSTEM: &str = r#"You are a teaching assistant generating a brief, actionable student report based on comprehension scores per concept.
Return markdown structured with: Summary, Strengths (bullets), Pain Points (bullets), Recommended Next Steps (bullets)."#;

const REPORT_USER_TEMPLATE: &str = r#"Student: {student_name}
Per-concept results as JSON:
{results_json}"#;

/// System prompt for cohort-wide remedial lesson plans.
pub const LESSON_SYSTEM: &str = r#"You are a curriculum designer. Create a concise, high-impact lesson plan that improves comprehension gaps across the whole class.
Plan format (markdown): Goals, Prerequisites, Mini-lessons (15-20 min), Practice Activities, Formative Checks, Exit Ticket, Suggested Resources.
Be specific and pragmatic."#;

const LESSON_USER_TEMPLATE: &str = r#"Cohort-wide weaknesses (concepts with low scores): {weak_concepts}
Ground your suggestions in the short context snippets (if any).
Context:
{context}"#;

/// System prompt for personalized homework.
pub const HOMEWORK_SYSTEM: &str = r#"You are a teacher creating personalized homework focused on the student's weakest concepts.
Return markdown with sections by concept: 1) Micro-recap (100-150 words), 2) 3-5 targeted problems, 3) One extension/thought question."#;

const HOMEWORK_USER_TEMPLATE: &str = r#"Student: {student_name}
Weak concepts: {weak_concepts}
Use the lesson context (snippets) to shape tasks:
{context}"#;

/// Homework text for a student with no weak concept. No LLM call is made.
pub const NO_WEAK_CONCEPTS_HOMEWORK: &str =
    "Great job! No targeted homework. Consider enrichment tasks from the lesson resources.";

/// Separator between evidence snippets in the scorer prompt.
pub const SNIPPET_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between lesson context snippets.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Builds the scorer user prompt.
pub fn build_scorer_prompt(student: &str, concept: &str, snippets: &[String]) -> String {
    SCORER_USER_TEMPLATE
        .replace("{concept}", concept)
        .replace("{student_name}", student)
        .replace("{snippets}", &snippets.join(SNIPPET_SEPARATOR))
}

/// Builds the report user prompt from pre-rendered results JSON.
pub fn build_report_prompt(student: &str, results_json: &str) -> String {
    REPORT_USER_TEMPLATE
        .replace("{student_name}", student)
        .replace("{results_json}", results_json)
}

/// Builds the lesson plan user prompt.
pub fn build_lesson_prompt(weak_concepts: &[String], context: &str) -> String {
    LESSON_USER_TEMPLATE
        .replace("{weak_concepts}", &weak_concepts.join(", "))
        .replace("{context}", context)
}

/// Builds the homework user prompt.
pub fn build_homework_prompt(student: &str, weak_concepts: &[String], context: &str) -> String {
    HOMEWORK_USER_TEMPLATE
        .replace("{student_name}", student)
        .replace("{weak_concepts}", &weak_concepts.join(", "))
        .replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scorer_prompt_fills_placeholders() {
        let prompt = build_scorer_prompt(
            "Aarav",
            "Recursion",
            &["[hw1.txt] base case".to_string(), "[hw2.txt] stack".to_string()],
        );
        assert!(prompt.contains("Target Concept: \"Recursion\""));
        assert!(prompt.contains("Student: Aarav"));
        assert!(prompt.contains("[hw1.txt] base case\n\n---\n\n[hw2.txt] stack"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_lesson_and_homework_prompts() {
        let weak = vec!["Recursion".to_string(), "Graph Traversal".to_string()];
        let lesson = build_lesson_prompt(&weak, "ctx");
        assert!(lesson.contains("Recursion, Graph Traversal"));
        assert!(lesson.ends_with("ctx"));

        let homework = build_homework_prompt("Dev", &weak, "lesson ctx");
        assert!(homework.contains("Student: Dev"));
        assert!(homework.contains("Weak concepts: Recursion, Graph Traversal"));
    }

    #[test]
    fn test_report_prompt() {
        let prompt = build_report_prompt("Chitra", "{\"scores\": {}}");
        assert!(prompt.contains("Student: Chitra"));
        assert!(prompt.contains("{\"scores\": {}}"));
    }
}
