use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "taskaudit.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    weights: Option<HashMap<String, f64>>,
    #[serde(default)]
    validator: ValidatorSection,
    #[serde(default)]
    notify: NotifySection,
    #[serde(default)]
    variables: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidatorSection {
    root: Option<String>,
    task_type: Option<String>,
    implementation_patterns: Option<Vec<String>>,
    avoidance_patterns: Option<Vec<String>>,
    path_patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifySection {
    webhook: Option<String>,
    timeout: Option<String>,
    icon_emoji: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidatorSettings {
    pub root: Option<PathBuf>,
    pub task_type: Option<String>,
    pub implementation_patterns: Option<Vec<String>>,
    pub avoidance_patterns: Option<Vec<String>>,
    pub path_patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NotifySettings {
    pub webhook: Option<String>,
    pub timeout: Option<String>,
    pub icon_emoji: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuditConfiguration {
    pub weights: Option<HashMap<String, f64>>,
    pub validator: ValidatorSettings,
    pub notify: NotifySettings,
}

/// Loads the configuration file. A missing file is only an error when the
/// caller asked for that file explicitly.
pub fn load_config(config_path: &str, explicit: bool) -> Result<AuditConfiguration> {
    if !explicit && !Path::new(config_path).exists() {
        debug!("No {} found, using defaults", config_path);
        return Ok(AuditConfiguration::default());
    }

    let contents = fs::read_to_string(config_path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AuditConfiguration> {
    let config: Config = toml::from_str(contents)?;
    Ok(process_config(config))
}

fn process_config(config: Config) -> AuditConfiguration {
    let mut variables = config.variables;
    add_builtin_variables(&mut variables);

    let substitute = |value: Option<String>| value.map(|v| substitute_variables(&v, &variables));

    AuditConfiguration {
        weights: config.weights,
        validator: ValidatorSettings {
            root: substitute(config.validator.root).map(PathBuf::from),
            task_type: config.validator.task_type,
            implementation_patterns: config.validator.implementation_patterns,
            avoidance_patterns: config.validator.avoidance_patterns,
            path_patterns: config.validator.path_patterns,
        },
        notify: NotifySettings {
            webhook: substitute(config.notify.webhook),
            timeout: config.notify.timeout,
            icon_emoji: config.notify.icon_emoji,
        },
    }
}

fn add_builtin_variables(variables: &mut HashMap<String, String>) {
    for (key, value) in env::vars() {
        variables.insert(format!("ENV_{}", key), value);
    }

    if let Ok(pwd) = env::current_dir() {
        variables.insert("PWD".to_string(), pwd.to_string_lossy().to_string());
    }
}

fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    let braced_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let simple_regex = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap();

    let result = braced_regex
        .replace_all(text, |caps: &regex::Captures| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    simple_regex
        .replace_all(&result, |caps: &regex::Captures| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [variables]
            host = "hooks.example.com"
            workspace = "/srv/work"

            [weights]
            input = 0.2
            compute = 0.4
            output = 0.2
            time = 0.1
            resource = 0.1

            [validator]
            root = "${workspace}/out"
            task_type = "research"
            avoidance_patterns = ["maybe later"]

            [notify]
            webhook = "https://$host/T000/B000"
            timeout = "5s"
            icon_emoji = ":rocket:"
            "#,
        )
        .unwrap();

        let weights = config.weights.unwrap();
        assert_eq!(weights["compute"], 0.4);
        assert_eq!(config.validator.root, Some(PathBuf::from("/srv/work/out")));
        assert_eq!(config.validator.task_type.as_deref(), Some("research"));
        assert_eq!(
            config.validator.avoidance_patterns,
            Some(vec!["maybe later".to_string()])
        );
        assert!(config.validator.implementation_patterns.is_none());
        assert_eq!(
            config.notify.webhook.as_deref(),
            Some("https://hooks.example.com/T000/B000")
        );
        assert_eq!(config.notify.timeout.as_deref(), Some("5s"));
    }

    #[test]
    fn test_unknown_variables_are_left_alone() {
        let vars = HashMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(substitute_variables("${a}-$a-${b}-$b", &vars), "1-1-${b}-$b");
    }

    #[test]
    fn test_env_variables_are_available() {
        let vars = {
            let mut vars = HashMap::new();
            add_builtin_variables(&mut vars);
            vars
        };
        assert!(vars.contains_key("PWD"));
        if let Ok(path) = env::var("PATH") {
            assert_eq!(vars.get("ENV_PATH"), Some(&path));
        }
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let path = path.to_string_lossy();

        assert_eq!(load_config(&path, false).unwrap(), AuditConfiguration::default());
        assert!(load_config(&path, true).is_err());
    }

    #[test]
    fn test_rejects_unknown_sections() {
        assert!(parse_config("[wieghts]\ninput = 1.0\n").is_err());
    }
}
