//! Instruction construction for the analysis service.
//!
//! Pure templating, no I/O. The model's output quality is gated entirely on
//! this formatting, so it must be exactly reproducible.

/// System prompt for resume feedback — enforces JSON-only output.
pub const ANALYSIS_SYSTEM: &str = "You are an expert resume reviewer and career coach. \
    Evaluate a resume against a target role and score it. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Feedback prompt template. Replace `{job_title}` and `{job_description}`
/// before sending.
const FEEDBACK_PROMPT_TEMPLATE: &str = r#"Analyze the resume below against the target role and rate it.

Target job title: {job_title}

Job description:
{job_description}

Return a JSON object with this EXACT schema (no extra fields):
{
  "overallScore": 82,
  "toneAndStyle": {"score": 90, "tips": [{"type": "improve", "tip": "short headline", "explanation": "longer elaboration"}]},
  "content": {"score": 75, "tips": []},
  "structure": {"score": 80, "tips": []},
  "skills": {"score": 85, "tips": []}
}

Rules:
- Every score is an INTEGER between 0 and 100 inclusive.
- Exactly these four categories: toneAndStyle, content, structure, skills. No others.
- Each tip "type" is exactly "good" or "improve".
- Each tip carries both "tip" (headline) and "explanation" (elaboration).
- 3-4 tips per category. Be specific to this resume and this role, not generic.
- If the job description is empty, rate the resume on general quality."#;

/// Renders the fixed instruction block with both fields embedded verbatim.
/// Total: always returns a string, never fails.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    FEEDBACK_PROMPT_TEMPLATE
        .replace("{job_title}", job_title)
        .replace("{job_description}", job_description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeds_both_fields_verbatim() {
        let rendered = prepare_instructions("Backend Engineer", "Go, distributed systems...");
        assert!(rendered.contains("Target job title: Backend Engineer"));
        assert!(rendered.contains("Go, distributed systems..."));
        assert!(!rendered.contains("{job_title}"));
        assert!(!rendered.contains("{job_description}"));
    }

    #[test]
    fn test_deterministic() {
        let a = prepare_instructions("QA", "Test things");
        let b = prepare_instructions("QA", "Test things");
        assert_eq!(a, b);
    }

    #[test]
    fn test_total_on_empty_inputs() {
        let rendered = prepare_instructions("", "");
        assert!(rendered.contains("overallScore"));
    }

    #[test]
    fn test_schema_braces_survive_templating() {
        // The schema example in the template uses literal braces; only the
        // two placeholders may be substituted.
        let rendered = prepare_instructions("X", "Y");
        assert!(rendered.contains(r#""toneAndStyle": {"score": 90"#));
    }
}
