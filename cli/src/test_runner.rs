use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use termbook::parser::{ParseError, Parser};
use termbook::{expand_variables, sanitize_command};

/// Fixture files end in this suffix.
const FIXTURE_SUFFIX: &str = ".test.term";

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Block to expand.
    pub block: String,

    /// The only environment variables visible to the expansion.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Expected fully expanded command (trimmed comparison).
    #[serde(default)]
    pub expect_command: Option<String>,

    /// Expected expansion error; the error's Display string must contain this.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Whether the block body should trip the dangerous-command check.
    #[serde(default)]
    pub expect_dangerous: Option<bool>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Split a fixture into its TOML front matter and termbook source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- front matter delimiter")?;
    let after_open = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
        .unwrap_or(after_open);

    let close = after_open
        .find("\n---")
        .ok_or("missing closing --- front matter delimiter")?;
    let front_matter = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(front_matter).map_err(|e| format!("TOML parse error: {e}"))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(FIXTURE_SUFFIX))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match check_fixture(path) {
        Ok(description) => (description, TestOutcome::Pass),
        Err((description, reason)) => (description, TestOutcome::Fail(reason)),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

type Checked = Result<Option<String>, (Option<String>, String)>;

fn check_fixture(path: &Path) -> Checked {
    let content =
        std::fs::read_to_string(path).map_err(|e| (None, format!("cannot read file: {e}")))?;
    let (config, source) =
        parse_test_file(&content).map_err(|e| (None, format!("front matter error: {e}")))?;
    let description = config.description.clone();
    let fail = |reason: String| (description.clone(), reason);

    let termbook = Parser::new(source, 0).parse();

    if let Some(expected) = &config.expect_warnings {
        let warnings: Vec<ParseError> =
            termbook.lint().into_iter().filter(|d| d.is_warning()).collect();
        check_warnings(source, &warnings, expected).map_err(fail)?;
    }

    if let Some(expect_dangerous) = config.expect_dangerous {
        let body = termbook
            .get(&config.block)
            .map(|b| b.body.as_str())
            .unwrap_or_default();
        let dangerous = sanitize_command(body).is_err();
        if dangerous != expect_dangerous {
            return Err(fail(format!(
                "expected dangerous = {expect_dangerous}, got {dangerous}"
            )));
        }
    }

    let expanded = termbook
        .expand_block(&config.block)
        .map(|command| expand_variables(&command, termbook.variables(), &config.env));

    match (&config.expect_error, &config.expect_command, expanded) {
        (Some(expected), _, Err(err)) if err.to_string().contains(expected.as_str()) => {}
        (Some(expected), _, Err(err)) => {
            return Err(fail(format!(
                "expected error containing \"{expected}\", got: {err}"
            )));
        }
        (Some(expected), _, Ok(_)) => {
            return Err(fail(format!(
                "expected error containing \"{expected}\", but expansion succeeded"
            )));
        }
        (None, _, Err(err)) => return Err(fail(format!("unexpected error: {err}"))),
        (None, Some(expected), Ok(actual)) if actual.trim() != expected.trim() => {
            return Err(fail(format!(
                "command mismatch\n  expected: {}\n  actual:   {}",
                expected.trim(),
                actual.trim()
            )));
        }
        (None, _, Ok(_)) => {}
    }

    Ok(description)
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

fn check_warnings(
    source: &str,
    warnings: &[ParseError],
    expected: &[ExpectedWarning],
) -> Result<(), String> {
    if warnings.len() != expected.len() {
        let actual: Vec<String> = warnings
            .iter()
            .map(|w| format!("  - {}", w.message))
            .collect();
        return Err(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            warnings.len(),
            if actual.is_empty() {
                "    (none)".to_string()
            } else {
                actual.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Err(format!(
                "warning[{i}]: expected message containing \"{}\", got: {}",
                expected.contains, actual.message
            ));
        }
        if let Some(expected_line) = expected.line {
            let actual_line = byte_offset_to_line(source, actual.span.start);
            if actual_line != expected_line {
                return Err(format!(
                    "warning[{i}]: expected on line {expected_line}, but span is on line {actual_line}"
                ));
            }
        }
    }

    Ok(())
}

/// Fixture files grouped by sub-directory relative to `root`; files directly
/// in `root` have category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given fixture path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {FIXTURE_SUFFIX} files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{code}m{text}\x1b[0m")
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Pick the categories to run; unknown requests are reported and skipped.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{request}/");
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{request}' not found (available: {})",
                available.join(", ")
            );
        }
    }
    selected
}

/// Run every fixture under `path` (or a single file). If `categories` is
/// non-empty, only run fixtures in those categories. Returns the exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let groups: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {FIXTURE_SUFFIX} files found in {}", path.display());
            return 1;
        }
        select_categories(&all, categories)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    };
    if groups.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures = Vec::new();
    for (category, files) in &groups {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {line}");
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {passed} passed, 0 failed", style.paint("ok", "32"));
        0
    } else {
        eprintln!(
            "test result: {}. {passed} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
