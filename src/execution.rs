use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::Result;

pub const DEFAULT_TASK_TYPE: &str = "implementation";

const DEFAULT_IMPLEMENTATION_PATTERNS: &[&str] = &[
    r"\b(?:created|wrote|generated)\s+(?:a\s+|an\s+|the\s+)?(?:new\s+)?file\b",
    r"\bimplemented\b",
    r"\badded\s+(?:a\s+|an\s+|the\s+)?(?:new\s+)?(?:class|function|method|module|test)\b",
    r"\b(?:updated|modified)\s+(?:the\s+)?file\b",
    r"^\s*(?:import\s+\w+|from\s+\w[\w.]*\s+import\b)",
    r"^\s*(?:async\s+)?def\s+\w+\s*\(",
    r"^\s*class\s+\w+",
];

const DEFAULT_AVOIDANCE_PATTERNS: &[&str] = &[
    r"\bwould\s+(?:create|implement|add|write)\b",
    r"\bshould\s+(?:create|implement|add)\b",
    r"\bcould\s+(?:create|implement)\b",
    r"\bplan\s+to\b",
    r"\b(?:suggest|recommend)\s+(?:creating|implementing|adding)\b",
    r"\bhere\s+is\s+how\s+you\s+(?:could|would|can)\b",
];

const DEFAULT_PATH_PATTERNS: &[&str] = &[
    r"\bcreated\s+(?:a\s+|the\s+)?(?:new\s+)?file:?\s+[`'\x22]?([\w./\\-]+)",
    r"\bfile:\s*[`'\x22]?([\w./\\-]+)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Implementation,
    Avoidance,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    signal: Signal,
}

/// Ordered `(pattern, signal)` table plus the templates used to pull claimed
/// file paths out of worker output. Patterns match case-insensitively, with
/// `^`/`$` anchored per line.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
    path_patterns: Vec<Regex>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Scan {
    implementation: usize,
    avoidance: usize,
    matched_avoidance: Vec<String>,
}

fn compile(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
}

impl Classifier {
    pub fn new(rules: &[(&str, Signal)], path_patterns: &[&str]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|(pattern, signal)| -> Result<Rule> {
                Ok(Rule {
                    pattern: compile(pattern)?,
                    signal: *signal,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let path_patterns = path_patterns
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            path_patterns,
        })
    }

    /// Builds a classifier from optional replacement tables; a missing table
    /// falls back to the built-in one.
    pub fn with_overrides(
        implementation: Option<&[String]>,
        avoidance: Option<&[String]>,
        paths: Option<&[String]>,
    ) -> Result<Self> {
        fn pick<'a>(custom: Option<&'a [String]>, builtin: &'a [&'a str]) -> Vec<&'a str> {
            match custom {
                Some(patterns) => patterns.iter().map(String::as_str).collect(),
                None => builtin.to_vec(),
            }
        }

        let mut rules: Vec<(&str, Signal)> = pick(implementation, DEFAULT_IMPLEMENTATION_PATTERNS)
            .into_iter()
            .map(|p| (p, Signal::Implementation))
            .collect();
        rules.extend(
            pick(avoidance, DEFAULT_AVOIDANCE_PATTERNS)
                .into_iter()
                .map(|p| (p, Signal::Avoidance)),
        );

        Self::new(&rules, &pick(paths, DEFAULT_PATH_PATTERNS))
    }

    fn scan(&self, text: &str) -> Scan {
        let mut scan = Scan::default();

        for rule in &self.rules {
            let matches = rule.pattern.find_iter(text).count();
            if matches == 0 {
                continue;
            }
            match rule.signal {
                Signal::Implementation => scan.implementation += matches,
                Signal::Avoidance => {
                    scan.avoidance += matches;
                    scan.matched_avoidance.push(rule.pattern.as_str().to_string());
                }
            }
        }

        scan
    }

    /// Claimed paths in order of appearance per template, duplicates kept.
    fn claimed_paths(&self, text: &str) -> Vec<String> {
        self.path_patterns
            .iter()
            .flat_map(|pattern| pattern.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches(['.', ',', ':', ';']).to_string())
            .filter(|path| !path.is_empty())
            .collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_overrides(None, None, None).expect("built-in patterns compile")
    }
}

/// Answers whether a claimed artifact exists.
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Checks the local filesystem, resolving relative paths against `root`.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for LocalFiles {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileProbe for LocalFiles {
    fn exists(&self, path: &Path) -> bool {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        match fs::metadata(&resolved) {
            Ok(_) => true,
            Err(e) => {
                debug!("Treating '{}' as missing: {}", resolved.display(), e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub executed: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub files_created: Vec<PathBuf>,
}

pub struct ExecutionValidator<P: FileProbe = LocalFiles> {
    classifier: Classifier,
    probe: P,
}

impl Default for ExecutionValidator<LocalFiles> {
    fn default() -> Self {
        Self::new(Classifier::default(), LocalFiles::default())
    }
}

impl<P: FileProbe> ExecutionValidator<P> {
    pub fn new(classifier: Classifier, probe: P) -> Self {
        Self { classifier, probe }
    }

    /// Decides whether `output` describes work that was actually carried out.
    ///
    /// Avoidance language wins over any implementation evidence. A positive
    /// verdict is withdrawn when none of the files the output claims to have
    /// created can be found.
    #[instrument(level = "debug", skip(self, output), fields(len = output.len()))]
    pub fn validate(&self, output: &str, task_type: &str) -> ValidationResult {
        let scan = self.classifier.scan(output);

        let mut issues: Vec<String> = scan
            .matched_avoidance
            .iter()
            .map(|pattern| format!("Found avoidance pattern: {}", pattern))
            .collect();

        let (mut executed, mut confidence) = if scan.avoidance > 0 {
            (false, 0.2)
        } else if scan.implementation > 3 {
            (true, 0.9)
        } else if scan.implementation > 0 {
            (scan.implementation > scan.avoidance, 0.6)
        } else {
            (false, 0.0)
        };

        let mut seen = HashSet::new();
        let mut files_created = Vec::new();
        for claimed in self.classifier.claimed_paths(output) {
            if !seen.insert(claimed.clone()) {
                continue;
            }
            let path = PathBuf::from(&claimed);
            if self.probe.exists(&path) {
                files_created.push(path);
            } else {
                issues.push(format!("File not found: {}", claimed));
            }
        }

        if executed && files_created.is_empty() {
            executed = false;
            confidence = 0.3;
            issues.push("No actual files were created".to_string());
        }

        debug!(
            task_type,
            implementation = scan.implementation,
            avoidance = scan.avoidance,
            executed,
            confidence,
            "Validated worker output"
        );

        ValidationResult {
            executed,
            confidence,
            issues,
            files_created,
        }
    }
}

/// Lower-cased task type, defaulting to `implementation` when blank.
pub fn normalize_task_type(task_type: &str) -> String {
    let trimmed = task_type.trim();
    if trimmed.is_empty() {
        DEFAULT_TASK_TYPE.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct FakeFiles(HashSet<PathBuf>);

    impl FakeFiles {
        fn with(paths: &[&str]) -> Self {
            FakeFiles(paths.iter().map(PathBuf::from).collect())
        }
    }

    impl FileProbe for FakeFiles {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    fn validator(existing: &[&str]) -> ExecutionValidator<FakeFiles> {
        ExecutionValidator::new(Classifier::default(), FakeFiles::with(existing))
    }

    fn five_matches(path: &str) -> String {
        format!(
            "Created file {}\n\
             Implemented the retry loop.\n\
             Added a new function parse_line.\n\
             import os\n\
             def main():\n",
            path
        )
    }

    #[test]
    fn test_avoidance_language_is_not_executed() {
        let result = validator(&[]).validate("I would create a file called foo.py", DEFAULT_TASK_TYPE);

        assert!(!result.executed);
        assert_eq!(result.confidence, 0.2);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].starts_with("Found avoidance pattern: "));
        assert!(result.files_created.is_empty());
    }

    #[test]
    fn test_strong_evidence_with_existing_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("worker_output.py");
        fs::write(&file, "print('hi')").unwrap();
        let path = file.to_string_lossy().to_string();

        let validator = ExecutionValidator::new(Classifier::default(), LocalFiles::default());
        let result = validator.validate(&five_matches(&path), DEFAULT_TASK_TYPE);

        assert!(result.executed);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.files_created, vec![file]);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_strong_evidence_without_file_is_overridden() {
        let result = validator(&[]).validate(&five_matches("src/missing.py"), DEFAULT_TASK_TYPE);

        assert!(!result.executed);
        assert_eq!(result.confidence, 0.3);
        assert!(result.files_created.is_empty());
        assert_eq!(
            result.issues,
            vec![
                "File not found: src/missing.py".to_string(),
                "No actual files were created".to_string(),
            ]
        );
    }

    #[test]
    fn test_weak_evidence_gets_mid_confidence() {
        let result = validator(&["notes.md"]).validate(
            "Implemented the change. File: notes.md",
            DEFAULT_TASK_TYPE,
        );

        assert!(result.executed);
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.files_created, vec![PathBuf::from("notes.md")]);
    }

    #[test]
    fn test_no_signal_defaults_to_not_executed() {
        let result = validator(&[]).validate("Looked around the repository.", "research");

        assert!(!result.executed);
        assert_eq!(result.confidence, 0.0);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_avoidance_beats_implementation_evidence() {
        let text = "Implemented the parser.\nimplemented tests\nimplemented docs\nimplemented CI\n\
                    Next I plan to refactor. I would also suggest creating a cache.";
        let result = validator(&[]).validate(text, DEFAULT_TASK_TYPE);

        assert!(!result.executed);
        assert_eq!(result.confidence, 0.2);
        assert_eq!(
            result
                .issues
                .iter()
                .filter(|i| i.starts_with("Found avoidance pattern"))
                .count(),
            2
        );
        assert!(!result.issues.contains(&"No actual files were created".to_string()));
    }

    #[test]
    fn test_claimed_paths_are_deduplicated_and_trimmed() {
        let classifier = Classifier::default();
        let paths = classifier.claimed_paths(
            "I created the file: `src/lib.rs`. Then File: src/lib.rs, and file: docs/README.md.",
        );
        assert_eq!(paths, vec!["src/lib.rs", "src/lib.rs", "src/lib.rs", "docs/README.md"]);

        let result = validator(&["src/lib.rs"]).validate(
            "Implemented it. Created file src/lib.rs. File: src/lib.rs",
            DEFAULT_TASK_TYPE,
        );
        assert_eq!(result.files_created, vec![PathBuf::from("src/lib.rs")]);
    }

    #[test]
    fn test_injected_rules_replace_builtins() {
        let classifier = Classifier::new(
            &[("shipped", Signal::Implementation), ("todo", Signal::Avoidance)],
            &[r"artifact=(\S+)"],
        )
        .unwrap();
        let validator = ExecutionValidator::new(classifier, FakeFiles::with(&["out.bin"]));

        let result = validator.validate("shipped shipped shipped shipped artifact=out.bin", "build");
        assert!(result.executed);
        assert_eq!(result.confidence, 0.9);

        let result = validator.validate("TODO: ship", "build");
        assert_eq!(result.issues, vec!["Found avoidance pattern: todo".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let custom = vec!["(unclosed".to_string()];
        assert!(Classifier::with_overrides(Some(&custom), None, None).is_err());
    }

    #[test]
    fn test_local_files_resolve_against_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("made.txt"), "x").unwrap();

        let probe = LocalFiles::new(dir.path());
        assert!(probe.exists(Path::new("made.txt")));
        assert!(!probe.exists(Path::new("absent.txt")));
    }

    #[test]
    fn test_normalize_task_type() {
        assert_eq!(normalize_task_type("  Research "), "research");
        assert_eq!(normalize_task_type(""), DEFAULT_TASK_TYPE);
    }
}
