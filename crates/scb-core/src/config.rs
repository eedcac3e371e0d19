use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{
    artifact::UrlOutput,
    errors::Error,
    session::{Limits, Mode},
    Result,
};

const MIB: u64 = 1024 * 1024;

/// Typed configuration, loaded from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_retry_attempts: usize,

    // Accumulation limits
    pub limits: Limits,

    // Processing
    pub default_mode: Mode,
    pub url_output: UrlOutput,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * MIB,
            max_merge_bytes: 25 * MIB,
            max_merge_files: 30,
            max_pending_bytes: 25 * MIB,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| env_str("BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        let telegram_retry_attempts = env_usize("TELEGRAM_RETRY_ATTEMPTS").unwrap_or(1);

        let defaults = Limits::default();
        let limits = Limits {
            max_file_bytes: env_u64("MAX_SINGLE_FILE_BYTES").unwrap_or(defaults.max_file_bytes),
            max_merge_bytes: env_u64("MAX_TOTAL_MERGE_BYTES").unwrap_or(defaults.max_merge_bytes),
            max_merge_files: env_usize("MAX_MERGE_FILES").unwrap_or(defaults.max_merge_files),
            max_pending_bytes: env_u64("MAX_PENDING_TOTAL_BYTES")
                .unwrap_or(defaults.max_pending_bytes),
        };

        let default_mode = match env_str("DEFAULT_MODE").and_then(non_empty) {
            Some(raw) => raw
                .parse::<Mode>()
                .map_err(|_| Error::Config(format!("DEFAULT_MODE must be apex or host, got {raw}")))?,
            None => Mode::default(),
        };

        let url_output = match env_str("URL_OUTPUT").and_then(non_empty) {
            Some(raw) => raw
                .parse::<UrlOutput>()
                .map_err(|_| Error::Config(format!("URL_OUTPUT must be sites or pairs, got {raw}")))?,
            None => UrlOutput::default(),
        };

        // Empty AUDIT_LOG_PATH disables the audit log.
        let audit_log_path = match env_str("AUDIT_LOG_PATH") {
            Some(p) => non_empty(p).map(PathBuf::from),
            None => Some(PathBuf::from("/tmp/site-cleaner-audit.log")),
        };
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            telegram_retry_attempts,
            limits,
            default_mode,
            url_output,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }

        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_documented_caps() {
        let l = Limits::default();
        assert_eq!(l.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(l.max_merge_bytes, 25 * 1024 * 1024);
        assert_eq!(l.max_merge_files, 30);
        assert_eq!(l.max_pending_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nBOT_TOKEN=\"abc:123\"\nDEFAULT_MODE = host\nbroken line\n=novalue\nX='y'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("BOT_TOKEN".to_string(), "abc:123".to_string()),
                ("DEFAULT_MODE".to_string(), "host".to_string()),
                ("X".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn non_empty_rejects_whitespace() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }
}
