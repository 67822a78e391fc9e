use glob::{GlobError, PatternError, glob};
use std::{
    collections::HashSet,
    fmt,
    io::Error as IoError,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

#[derive(Debug)]
pub enum FileError {
    GlobPattern(PatternError),
    GlobExpansion(GlobError),
    Io(IoError),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::GlobPattern(e) => write!(f, "Invalid glob pattern: {}", e),
            FileError::GlobExpansion(e) => write!(f, "Failed to expand glob: {}", e),
            FileError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::GlobPattern(e) => Some(e),
            FileError::GlobExpansion(e) => Some(e),
            FileError::Io(e) => Some(e),
        }
    }
}

impl From<PatternError> for FileError {
    fn from(err: PatternError) -> Self {
        FileError::GlobPattern(err)
    }
}

impl From<GlobError> for FileError {
    fn from(err: GlobError) -> Self {
        FileError::GlobExpansion(err)
    }
}

impl From<IoError> for FileError {
    fn from(err: IoError) -> Self {
        FileError::Io(err)
    }
}

pub fn parse_timeout(timeout_str: Option<&str>, default_timeout: Option<&str>) -> Option<Duration> {
    let timeout_to_parse = timeout_str.or(default_timeout)?;

    if timeout_to_parse == "0" || timeout_to_parse.is_empty() {
        return None;
    }

    match timeout_to_parse.parse::<humantime::Duration>() {
        Ok(duration) => Some(duration.into()),
        Err(e) => {
            warn!(
                "Invalid timeout format '{}': {} (use a duration like '5s', '1m', '1m30s')",
                timeout_to_parse, e
            );
            None
        }
    }
}

/// Expands worker-output arguments into a deduplicated list of existing files.
///
/// Arguments containing glob metacharacters are expanded; plain paths are kept
/// when they exist and reported otherwise.
pub fn expand_globs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, FileError> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        let path_str = path.to_string_lossy();

        if is_glob_pattern(&path_str) {
            let mut expanded_paths = expand_single_glob(&path_str)?;
            expanded_paths.sort();
            for expanded_path in expanded_paths {
                if expanded_path.is_file() && seen.insert(expanded_path.clone()) {
                    result.push(expanded_path);
                }
            }
        } else {
            add_if_exists(path, &mut result, &mut seen);
        }
    }

    Ok(result)
}

fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

fn expand_single_glob(pattern: &str) -> Result<Vec<PathBuf>, FileError> {
    let glob_paths = glob(pattern)?;
    glob_paths
        .collect::<Result<Vec<_>, _>>()
        .map_err(FileError::from)
}

fn add_if_exists(path: &Path, result: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>) {
    if !path.exists() {
        warn!("Output file '{}' does not exist", path.display());
        return;
    }

    if seen.insert(path.to_path_buf()) {
        result.push(path.to_path_buf());
    }
}

/// Shortens a title for display, appending `...` when characters were cut.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }

    let mut shortened: String = title.chars().take(max_chars).collect();
    shortened.push_str("...");
    shortened
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short", 50), "short");
        assert_eq!(truncate_title("abcdef", 3), "abc...");
        let exact = "x".repeat(50);
        assert_eq!(truncate_title(&exact, 50), exact);
        assert_eq!(truncate_title("ééééé", 2), "éé...");
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(Some("5s"), None), Some(Duration::from_secs(5)));
        assert_eq!(parse_timeout(None, Some("1m")), Some(Duration::from_secs(60)));
        assert_eq!(parse_timeout(Some("0"), Some("1m")), None);
        assert_eq!(parse_timeout(Some("soon"), None), None);
        assert_eq!(parse_timeout(None, None), None);
    }

    #[test]
    fn test_expand_globs_dedups_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "a").unwrap();
        fs::write(dir.path().join("b.log"), "b").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        let pattern = dir.path().join("*.log");
        let explicit = dir.path().join("a.log");
        let missing = dir.path().join("missing.log");

        let files = expand_globs(&[pattern, explicit, missing]).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.log"), dir.path().join("b.log")]
        );
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }
}
