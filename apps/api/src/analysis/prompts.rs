// Review prompt templates. Placeholders: {language}, {filename}, {content}.

pub const REVIEW_SYSTEM: &str = "\
You are a senior software engineer performing thorough, constructive code reviews. \
You MUST respond with valid JSON only, with no markdown fences and no explanations. \
Rate severity accurately: critical means the code will crash, corrupt data or be exploitable.";

pub const REVIEW_PROMPT_TEMPLATE: &str = r#"Review the following {language} file ({filename}).

Look for:
1. Bugs: runtime errors, logic flaws, unchecked edge cases, division by zero, out-of-bounds access.
2. Security: missing input validation, injection, hard-coded secrets.
3. Performance: needless work, poor algorithmic choices.
4. Design: function size, separation of concerns, coupling, error handling.
5. Readability and documentation.

OUTPUT SCHEMA (return exactly this structure):
{
  "overall_score": <number 1-10>,
  "summary": "string",
  "readability": "string",
  "modularity": "string",
  "potential_bugs": "string",
  "suggestions": ["string"],
  "quality_metrics": {"complexity_score": <number 1-10>, "maintainability_score": <number 1-10>},
  "line_wise_issues": [
    {
      "line": <line number>,
      "type": "bug" | "security" | "performance" | "style" | "documentation" | "maintainability",
      "severity": "critical" | "high" | "medium" | "low",
      "issue": "string",
      "fix_suggestion": "string"
    }
  ]
}

RULES:
1. Line numbers are 1-based and refer to the file below.
2. Every issue must use one of the four severities exactly.
3. Return ONLY the JSON object, without code fences.

FILE:
{content}"#;

pub fn build_review_prompt(language: &str, filename: &str, content: &str) -> String {
    // {content} last so file text containing a placeholder is not expanded.
    REVIEW_PROMPT_TEMPLATE
        .replace("{language}", language)
        .replace("{filename}", filename)
        .replace("{content}", content)
}
