use directories::BaseDirs;
use std::env;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use crate::cli::Args;
use crate::error::ConfigError;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const APP_NAME: &str = "slm";
const XDG_HISTORY_FILE: &str = "history.ndb";
const PLAN9_HISTORY_DIR: &str = "lib/llm";
const PLAN9_HISTORY_FILE: &str = "llm.history";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLayout {
    Xdg,
    Plan9,
}

impl HistoryLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xdg => "xdg",
            Self::Plan9 => "plan9",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub continue_conversation: bool,
    pub api_key: String,
    pub api_base_url: String,
    pub request_timeout_secs: Option<u64>,
    /// Set only when continuing a conversation.
    pub history_path: Option<PathBuf>,
}

impl Config {
    pub fn resolve(args: Args, stdin: impl Read) -> Result<Self, ConfigError> {
        Self::resolve_with(args, stdin, |key| env::var(key).ok())
    }

    pub fn resolve_with(
        args: Args,
        stdin: impl Read,
        mut get_var: impl FnMut(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Whitespace-only keys count as unset.
        let api_key =
            non_empty(get_var("OPENAI_API_KEY")).ok_or(ConfigError::MissingCredential)?;
        let prompt = resolve_prompt(args.prompt, stdin)?;

        let history_path = if args.continue_conversation {
            Some(resolve_history_path(&mut get_var)?)
        } else {
            None
        };

        Ok(Self {
            model: args.model,
            temperature: args.temperature,
            system_prompt: Some(args.system_prompt).filter(|value| !value.is_empty()),
            prompt,
            continue_conversation: args.continue_conversation,
            api_key,
            api_base_url: non_empty(get_var("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            request_timeout_secs: parse_timeout_secs(get_var("SLM_TIMEOUT_SECS").as_deref()),
            history_path,
        })
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn resolve_prompt(
    positional: Option<String>,
    mut stdin: impl Read,
) -> Result<String, ConfigError> {
    let prompt = match positional {
        Some(prompt) => prompt,
        None => {
            let mut buf = String::new();
            stdin
                .read_to_string(&mut buf)
                .map_err(ConfigError::PromptRead)?;
            buf
        }
    };

    if prompt.trim().is_empty() {
        return Err(ConfigError::EmptyPrompt);
    }
    Ok(prompt)
}

fn parse_timeout_secs(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn parse_history_layout(raw: Option<&str>) -> HistoryLayout {
    match raw.unwrap_or("xdg").trim().to_ascii_lowercase().as_str() {
        "plan9" | "9front" => HistoryLayout::Plan9,
        _ => HistoryLayout::Xdg,
    }
}

fn resolve_history_path(
    get_var: &mut impl FnMut(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty(get_var("SLM_HISTORY_FILE")) {
        return Ok(PathBuf::from(path));
    }

    let layout = parse_history_layout(get_var("SLM_HISTORY_LAYOUT").as_deref());
    debug!(history_layout = layout.as_str(), "deriving history location");
    match layout {
        HistoryLayout::Xdg => {
            let config_dir = non_empty(get_var("XDG_CONFIG_HOME"))
                .map(PathBuf::from)
                .or_else(platform_config_dir)
                .or_else(|| {
                    non_empty(get_var("HOME")).map(|home| PathBuf::from(home).join(".config"))
                })
                .ok_or(ConfigError::HistoryLocation)?;
            Ok(config_dir.join(APP_NAME).join(XDG_HISTORY_FILE))
        }
        HistoryLayout::Plan9 => {
            let home = non_empty(get_var("home"))
                .or_else(|| non_empty(get_var("HOME")))
                .ok_or(ConfigError::HistoryLocation)?;
            Ok(PathBuf::from(home)
                .join(PLAN9_HISTORY_DIR)
                .join(PLAN9_HISTORY_FILE))
        }
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{self, Read};
    use std::path::PathBuf;

    use super::{
        Config, DEFAULT_API_BASE_URL, HistoryLayout, parse_history_layout, parse_timeout_secs,
    };
    use crate::cli::{Args, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
    use crate::error::ConfigError;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        }
    }

    fn args(prompt: Option<&str>, continue_conversation: bool) -> Args {
        Args {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: String::new(),
            continue_conversation,
            prompt: prompt.map(str::to_string),
        }
    }

    fn resolve(args: Args, stdin: &str, pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::resolve_with(args, stdin.as_bytes(), |key| vars.get(key).cloned())
    }

    #[test]
    fn resolve_uses_defaults_and_positional_prompt() {
        let cfg = resolve(args(Some("hi"), false), "", &[("OPENAI_API_KEY", "sk-test")])
            .expect("config should resolve");
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(cfg.system_prompt, None);
        assert_eq!(cfg.prompt, "hi");
        assert!(!cfg.continue_conversation);
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.request_timeout_secs, None);
        assert_eq!(cfg.history_path, None);
    }

    #[test]
    fn resolve_fails_without_credential() {
        let err = resolve(args(Some("hi"), false), "", &[]).expect_err("missing key should fail");
        assert!(matches!(err, ConfigError::MissingCredential));

        let err = resolve(args(Some("hi"), false), "", &[("OPENAI_API_KEY", "")])
            .expect_err("empty key should fail");
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn whitespace_only_credential_counts_as_missing() {
        let err = resolve(args(Some("hi"), false), "", &[("OPENAI_API_KEY", " \t ")])
            .expect_err("blank key should fail");
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn credential_is_checked_before_stdin_is_read() {
        let err = Config::resolve_with(args(None, false), FailingReader, |_| None)
            .expect_err("missing key should fail");
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn resolve_reads_prompt_from_stdin_when_positional_is_absent() {
        let cfg = resolve(
            args(None, false),
            "summarise this\nplease\n",
            &[("OPENAI_API_KEY", "sk-test")],
        )
        .expect("config should resolve");
        assert_eq!(cfg.prompt, "summarise this\nplease\n");
    }

    #[test]
    fn stdin_read_failure_is_reported() {
        let err = Config::resolve_with(args(None, false), FailingReader, |key| {
            (key == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        })
        .expect_err("stdin failure should fail");
        assert!(matches!(err, ConfigError::PromptRead(_)));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = resolve(args(None, false), "  \n", &[("OPENAI_API_KEY", "sk-test")])
            .expect_err("blank prompt should fail");
        assert!(matches!(err, ConfigError::EmptyPrompt));
    }

    #[test]
    fn resolve_reads_flags_and_overrides() {
        let mut cli = args(Some("hi"), false);
        cli.model = "gpt-4o-mini".to_string();
        cli.temperature = 0.2;
        cli.system_prompt = "Be terse.".to_string();

        let cfg = resolve(
            cli,
            "",
            &[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_BASE_URL", "http://localhost:9999/v1"),
                ("SLM_TIMEOUT_SECS", "15"),
            ],
        )
        .expect("config should resolve");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.temperature, 0.2);
        assert_eq!(cfg.system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(cfg.api_base_url, "http://localhost:9999/v1");
        assert_eq!(cfg.request_timeout_secs, Some(15));
    }

    #[test]
    fn history_path_prefers_explicit_file() {
        let cfg = resolve(
            args(Some("hi"), true),
            "",
            &[
                ("OPENAI_API_KEY", "sk-test"),
                ("SLM_HISTORY_FILE", "/tmp/custom.ndb"),
                ("XDG_CONFIG_HOME", "/home/glenda/.config"),
            ],
        )
        .expect("config should resolve");
        assert_eq!(cfg.history_path, Some(PathBuf::from("/tmp/custom.ndb")));
    }

    #[test]
    fn xdg_layout_uses_config_home() {
        let cfg = resolve(
            args(Some("hi"), true),
            "",
            &[
                ("OPENAI_API_KEY", "sk-test"),
                ("XDG_CONFIG_HOME", "/home/glenda/.config"),
            ],
        )
        .expect("config should resolve");
        assert_eq!(
            cfg.history_path,
            Some(PathBuf::from("/home/glenda/.config/slm/history.ndb"))
        );
    }

    #[test]
    fn plan9_layout_prefers_lowercase_home() {
        let cfg = resolve(
            args(Some("hi"), true),
            "",
            &[
                ("OPENAI_API_KEY", "sk-test"),
                ("SLM_HISTORY_LAYOUT", "plan9"),
                ("home", "/usr/glenda"),
                ("HOME", "/home/other"),
            ],
        )
        .expect("config should resolve");
        assert_eq!(
            cfg.history_path,
            Some(PathBuf::from("/usr/glenda/lib/llm/llm.history"))
        );
    }

    #[test]
    fn plan9_layout_without_home_fails() {
        let err = resolve(
            args(Some("hi"), true),
            "",
            &[("OPENAI_API_KEY", "sk-test"), ("SLM_HISTORY_LAYOUT", "plan9")],
        )
        .expect_err("no home should fail");
        assert!(matches!(err, ConfigError::HistoryLocation));
    }

    #[test]
    fn history_is_not_resolved_without_continue() {
        let cfg = resolve(
            args(Some("hi"), false),
            "",
            &[("OPENAI_API_KEY", "sk-test"), ("SLM_HISTORY_LAYOUT", "plan9")],
        )
        .expect("config should resolve");
        assert_eq!(cfg.history_path, None);
    }

    #[test]
    fn parse_timeout_secs_ignores_missing_or_invalid_values() {
        assert_eq!(parse_timeout_secs(None), None);
        assert_eq!(parse_timeout_secs(Some("")), None);
        assert_eq!(parse_timeout_secs(Some("soon")), None);
        assert_eq!(parse_timeout_secs(Some("0")), None);
        assert_eq!(parse_timeout_secs(Some(" 30 ")), Some(30));
    }

    #[test]
    fn parse_history_layout_defaults_to_xdg() {
        assert_eq!(parse_history_layout(None), HistoryLayout::Xdg);
        assert_eq!(parse_history_layout(Some("unknown")), HistoryLayout::Xdg);
        assert_eq!(parse_history_layout(Some(" PLAN9 ")), HistoryLayout::Plan9);
        assert_eq!(parse_history_layout(Some("9front")).as_str(), "plan9");
    }
}
