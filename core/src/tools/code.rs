use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile};
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub complexity: String,
}

impl Default for AnalysisReport {
    fn default() -> Self {
        Self {
            issues: Vec::new(),
            suggestions: Vec::new(),
            complexity: "low".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub language: Option<String>,
    pub results: Vec<CodeSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub title: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub source: String,
}

impl CodeSnippet {
    fn new(title: &str, code: &str, language: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            code: code.to_string(),
            language: language.map(String::from),
            source: "simulated".to_string(),
        }
    }
}

const PYTHON_SNIPPETS: &[(&str, &str)] = &[
    (
        "Example Python function",
        "def example_function(param1, param2):\n    \"\"\"Example function\"\"\"\n    return param1 + param2",
    ),
    (
        "Python class example",
        "class ExampleClass:\n    def __init__(self, name):\n        self.name = name\n\n    def greet(self):\n        return f\"Hello, {self.name}!\"",
    ),
];

const JAVASCRIPT_SNIPPETS: &[(&str, &str)] = &[
    (
        "Example JavaScript function",
        "function exampleFunction(param1, param2) {\n    return param1 + param2;\n}",
    ),
    (
        "JavaScript class example",
        "class ExampleClass {\n    constructor(name) {\n        this.name = name;\n    }\n\n    greet() {\n        return `Hello, ${this.name}!`;\n    }\n}",
    ),
];

fn write_temp_source(suffix: &str, code: &str) -> Result<NamedTempFile> {
    let mut file = Builder::new()
        .prefix("rondo_code_")
        .suffix(suffix)
        .tempfile()
        .with_context(|| "Failed to create temp file for code")?;
    file.write_all(code.as_bytes())
        .with_context(|| "Failed to write code to temp file")?;
    file.flush()?;
    Ok(file)
}

/// Execute a code snippet with the matching interpreter. The snippet is
/// written to a uniquely named temp file that is removed when the guard
/// drops, whatever the outcome.
pub async fn execute_code(code: &str, language: &str) -> ExecutionResult {
    let (interpreter, suffix) = match language.to_lowercase().as_str() {
        "python" => ("python3", ".py"),
        "javascript" => ("node", ".js"),
        _ => {
            return ExecutionResult {
                success: false,
                output: String::new(),
                error: format!("Unsupported language: {language}"),
            };
        }
    };

    match run_interpreter(interpreter, suffix, code).await {
        Ok(result) => result,
        Err(e) => ExecutionResult {
            success: false,
            output: String::new(),
            error: e.to_string(),
        },
    }
}

async fn run_interpreter(interpreter: &str, suffix: &str, code: &str) -> Result<ExecutionResult> {
    let file = write_temp_source(suffix, code)?;

    let output = Command::new(interpreter)
        .arg(file.path())
        .output()
        .await
        .with_context(|| format!("Failed to spawn {interpreter}"))?;

    if output.status.success() {
        Ok(ExecutionResult {
            success: true,
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            error: String::new(),
        })
    } else {
        Ok(ExecutionResult {
            success: false,
            output: String::new(),
            error: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Static analysis for one language (pylint); other supported languages
/// get canned findings and unsupported ones a single explanatory issue.
pub async fn analyze_code(code: &str, language: &str) -> AnalysisReport {
    let mut report = AnalysisReport::default();

    match language.to_lowercase().as_str() {
        "python" => {
            match run_pylint(code).await {
                Ok(issues) => report.issues = issues,
                Err(e) => report.issues.push(e.to_string()),
            }
            report.suggestions = vec![
                "Consider adding docstrings to functions".to_string(),
                "Use type hints for better code readability".to_string(),
                "Follow PEP 8 style guidelines".to_string(),
            ];
        }
        "javascript" => {
            report.issues = vec![
                "Missing semicolons".to_string(),
                "Unused variables".to_string(),
            ];
            report.suggestions = vec![
                "Use const/let instead of var".to_string(),
                "Add JSDoc comments for functions".to_string(),
                "Follow a consistent code style".to_string(),
            ];
        }
        _ => {
            report.issues.push(format!("Unsupported language: {language}"));
        }
    }

    report
}

async fn run_pylint(code: &str) -> Result<Vec<String>> {
    let file = write_temp_source(".py", code)?;

    let output = Command::new("pylint")
        .args(["--disable=all", "--enable=E,F"])
        .arg(file.path())
        .output()
        .await
        .with_context(|| "Failed to spawn pylint")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Illustrative snippets keyed by language. A stand-in for a real code
/// search backend.
pub fn search_code(query: &str, language: Option<&str>) -> SearchResults {
    let results = match language {
        Some(lang) => {
            info!("Searching for {query} in {lang}");
            let snippets: &[(&str, &str)] = match lang.to_lowercase().as_str() {
                "python" => PYTHON_SNIPPETS,
                "javascript" => JAVASCRIPT_SNIPPETS,
                _ => &[],
            };
            snippets
                .iter()
                .map(|(title, code)| CodeSnippet::new(title, code, None))
                .collect()
        }
        None => {
            info!("Searching for {query} in all languages");
            let python = PYTHON_SNIPPETS
                .iter()
                .take(1)
                .map(|(title, code)| CodeSnippet::new(title, code, Some("python")));
            let javascript = JAVASCRIPT_SNIPPETS
                .iter()
                .take(1)
                .map(|(title, code)| CodeSnippet::new(title, code, Some("javascript")));
            python.chain(javascript).collect()
        }
    };

    SearchResults {
        query: query.to_string(),
        language: language.map(String::from),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_python_captures_stdout() {
        if which::which("python3").is_err() {
            return;
        }

        let result = execute_code("print(1+1)", "python").await;
        assert!(result.success);
        assert_eq!(result.output, "2\n");
        assert_eq!(result.error, "");
    }

    #[tokio::test]
    async fn execute_python_failure_captures_stderr() {
        if which::which("python3").is_err() {
            return;
        }

        let result = execute_code("raise ValueError('boom')", "python").await;
        assert!(!result.success);
        assert_eq!(result.output, "");
        assert!(result.error.contains("ValueError"));
    }

    #[tokio::test]
    async fn execute_unsupported_language_reports_error() {
        let result = execute_code("puts 1", "ruby").await;
        assert!(!result.success);
        assert_eq!(result.error, "Unsupported language: ruby");
    }

    #[tokio::test]
    async fn analyze_unsupported_language_lists_single_issue() {
        let report = analyze_code("puts 1", "ruby").await;
        assert_eq!(report.issues, vec!["Unsupported language: ruby"]);
        assert!(report.suggestions.is_empty());
        assert_eq!(report.complexity, "low");
    }

    #[tokio::test]
    async fn analyze_javascript_returns_canned_findings() {
        let report = analyze_code("var x = 1", "javascript").await;
        assert!(!report.issues.is_empty());
        assert!(!report.suggestions.is_empty());
    }

    #[test]
    fn search_by_language_filters_results() {
        let results = search_code("sorting", Some("python"));
        assert_eq!(results.language.as_deref(), Some("python"));
        assert!(!results.results.is_empty());
        assert!(results.results.iter().all(|r| r.language.is_none()));
    }

    #[test]
    fn search_without_language_spans_languages() {
        let results = search_code("sorting", None);
        let languages: Vec<_> = results
            .results
            .iter()
            .filter_map(|r| r.language.as_deref())
            .collect();
        assert!(languages.contains(&"python"));
        assert!(languages.contains(&"javascript"));
    }

    #[test]
    fn search_unknown_language_is_empty() {
        let results = search_code("sorting", Some("cobol"));
        assert!(results.results.is_empty());
    }
}
