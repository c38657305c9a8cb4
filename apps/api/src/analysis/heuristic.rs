use async_trait::async_trait;
use serde_json::{json, Value};

use crate::analysis::{AnalysisError, AnalysisRequest, CodeAnalyzer};
use crate::review::Severity;

const LONG_LINE_CHARS: usize = 100;
const MAX_ISSUES: usize = 10;

const COMMENT_PREFIXES: &[&str] = &["#", "//", "/*", "*", "--", "\"\"\"", "'''"];
const FUNCTION_PREFIXES: &[&str] = &[
    "def ", "async def ", "fn ", "pub fn ", "async fn ", "pub async fn ", "func ", "function ",
    "public function ", "private function ",
];

/// Line-by-line checks that need no network. Output uses the same JSON shape
/// the model is asked for, without a score, so the normalizer derives one.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn review_json(&self, content: &str) -> Value {
        let issues = scan(content);
        let stats = SourceStats::of(content);

        let mut suggestions = Vec::new();
        if issues.iter().any(|i| i.kind == "style") {
            suggestions.push("Keep lines short and route output through a logger.");
        }
        if issues.iter().any(|i| i.kind == "maintainability") {
            suggestions.push("Move hard-coded values and shared state into configuration.");
        }
        if issues.iter().any(|i| i.kind == "bug") {
            suggestions.push("Guard divisions against a zero divisor.");
        }
        if stats.comment_ratio() < 0.05 && stats.code_lines > 20 {
            suggestions.push("Document the non-obvious parts of the code.");
        }

        let potential_bugs = match issues.iter().filter(|i| i.kind == "bug").count() {
            0 => "No obvious runtime hazards were detected by static checks.".to_string(),
            n => format!("{n} potential division-by-zero site(s) found."),
        };

        json!({
            "readability": stats.readability(),
            "modularity": stats.modularity(),
            "potential_bugs": potential_bugs,
            "suggestions": suggestions,
            "line_wise_issues": issues.iter().map(Finding::to_json).collect::<Vec<_>>(),
        })
    }
}

#[async_trait]
impl CodeAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<String, AnalysisError> {
        Ok(self.review_json(request.content).to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Finding {
    line: usize,
    kind: &'static str,
    severity: Severity,
    issue: &'static str,
    fix: &'static str,
}

impl Finding {
    fn to_json(&self) -> Value {
        json!({
            "line": self.line,
            "type": self.kind,
            "severity": self.severity.as_str(),
            "issue": self.issue,
            "fix_suggestion": self.fix,
        })
    }
}

fn scan(content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim_start();

        if line.chars().count() > LONG_LINE_CHARS {
            findings.push(Finding {
                line: line_no,
                kind: "style",
                severity: Severity::Low,
                issue: "Line exceeds 100 characters.",
                fix: "Break the expression or statement across several lines.",
            });
        }
        if line.contains("http://") || line.contains("https://") {
            findings.push(Finding {
                line: line_no,
                kind: "maintainability",
                severity: Severity::Medium,
                issue: "Hard-coded URL.",
                fix: "Read the URL from configuration.",
            });
        }
        if trimmed.starts_with("global ") {
            findings.push(Finding {
                line: line_no,
                kind: "maintainability",
                severity: Severity::Medium,
                issue: "Use of a global variable.",
                fix: "Pass state explicitly or wrap it in an object.",
            });
        }
        if trimmed.starts_with("print(") {
            findings.push(Finding {
                line: line_no,
                kind: "style",
                severity: Severity::Low,
                issue: "Bare print statement.",
                fix: "Use the logging module instead of print.",
            });
        }
        if line.contains("TODO") || line.contains("FIXME") {
            findings.push(Finding {
                line: line_no,
                kind: "documentation",
                severity: Severity::Low,
                issue: "Unresolved TODO/FIXME marker.",
                fix: "Resolve the note or track it in the issue tracker.",
            });
        }
        if divides_by_identifier(line) {
            findings.push(Finding {
                line: line_no,
                kind: "bug",
                severity: Severity::Medium,
                issue: "Division by a variable that may be zero.",
                fix: "Check the divisor before dividing.",
            });
        }
    }

    findings.truncate(MAX_ISSUES);
    findings
}

/// True for assignment lines such as `avg = total / count`.
fn divides_by_identifier(line: &str) -> bool {
    let code = strip_line_comment(line);
    let Some(eq) = assignment_position(code) else {
        return false;
    };

    let rhs = &code[eq + 1..];
    let bytes = rhs.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' {
            // `//` and `/=` are not plain division.
            if matches!(bytes.get(i + 1), Some(b'/') | Some(b'=')) {
                i += 2;
                continue;
            }
            let divisor = rhs[i + 1..].trim_start();
            let ident: String = divisor
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if ident.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
                return true;
            }
        }
        i += 1;
    }
    false
}

fn strip_line_comment(line: &str) -> &str {
    let end = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

/// Byte index of the first `=` that is an assignment rather than a comparison.
fn assignment_position(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && bytes.get(i + 1) != Some(&b'=')
            && !matches!(
                i.checked_sub(1).and_then(|p| bytes.get(p)),
                Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>')
            )
    })
}

struct SourceStats {
    code_lines: usize,
    comment_lines: usize,
    functions: usize,
}

impl SourceStats {
    fn of(content: &str) -> Self {
        let mut stats = SourceStats {
            code_lines: 0,
            comment_lines: 0,
            functions: 0,
        };
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if COMMENT_PREFIXES.iter().any(|p| line.starts_with(p)) {
                stats.comment_lines += 1;
                continue;
            }
            stats.code_lines += 1;
            if FUNCTION_PREFIXES.iter().any(|p| line.starts_with(p)) {
                stats.functions += 1;
            }
        }
        stats
    }

    fn comment_ratio(&self) -> f64 {
        let total = self.code_lines + self.comment_lines;
        if total == 0 {
            return 0.0;
        }
        self.comment_lines as f64 / total as f64
    }

    fn readability(&self) -> String {
        let density = if self.comment_ratio() >= 0.15 {
            "well commented"
        } else if self.comment_ratio() >= 0.05 {
            "lightly commented"
        } else {
            "sparsely commented"
        };
        format!("{} lines of code, {density}.", self.code_lines)
    }

    fn modularity(&self) -> String {
        match self.functions {
            0 => "No function definitions found; logic runs at top level.".to_string(),
            n => {
                let per_fn = self.code_lines / n;
                format!("{n} function(s), about {per_fn} lines of code each.")
            }
        }
    }
}
