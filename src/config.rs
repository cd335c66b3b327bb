use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::DEFAULT_BASE_URL;

/// Settings that may come from the command line, the environment or `.jsocrc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub url: String,
    pub email: String,
    pub verify: bool,
}

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    email: Option<String>,
    verify: Option<bool>,
}

/// Resolves settings with precedence: explicit argument, `JSOC_URL` /
/// `JSOC_EMAIL`, then the first `.jsocrc` found.
pub fn load_settings(
    url: Option<String>,
    email: Option<String>,
    verify: Option<bool>,
) -> Result<Settings> {
    resolve_settings(url, email, verify, |k| std::env::var(k).ok(), &rc_candidates())
}

fn resolve_settings(
    url: Option<String>,
    email: Option<String>,
    verify: Option<bool>,
    env: impl Fn(&str) -> Option<String>,
    rc_candidates: &[PathBuf],
) -> Result<Settings> {
    let mut url = url.or_else(|| env("JSOC_URL"));
    let mut email = email.or_else(|| env("JSOC_EMAIL"));
    let mut file_verify: Option<bool> = None;

    if url.is_none() || email.is_none() || verify.is_none() {
        if let Some(rc_path) = rc_candidates.iter().find(|p| p.exists()) {
            let cfg = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;

            if url.is_none() {
                url = cfg.url;
            }
            if email.is_none() {
                email = cfg.email;
            }
            file_verify = cfg.verify;
        }
    }

    let email = match email.filter(|e| !e.trim().is_empty()) {
        Some(v) => v,
        None => {
            if !rc_candidates.is_empty() {
                bail!(
                    "A registered email address is required to submit the query (pass --email, set JSOC_EMAIL or put `email:` in one of: {})",
                    rc_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            bail!(
                "A registered email address is required to submit the query (pass --email, set JSOC_EMAIL or create .jsocrc)"
            );
        }
    };

    Ok(Settings {
        url: url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        email,
        verify: verify.or(file_verify).unwrap_or(true),
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // A key may sit on its own line with the value on the next one.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match rc_entry(line) {
            Some((k, v)) => {
                pending_key = None;
                if v.is_empty() {
                    pending_key = Some(k);
                } else {
                    cfg.set(k, v);
                }
            }
            None => {
                if let Some(k) = pending_key.take() {
                    cfg.set(k, line);
                }
            }
        }
    }

    cfg
}

fn rc_entry(line: &str) -> Option<(&str, &str)> {
    let (k, v) = line.split_once(':')?;
    let k = k.trim();
    matches!(k, "url" | "email" | "verify").then(|| (k, v.trim()))
}

impl RcConfig {
    fn set(&mut self, key: &str, value: &str) {
        let value = strip_quotes(value);
        match key {
            "url" => self.url = Some(value.to_string()),
            "email" => self.email = Some(value.to_string()),
            "verify" => self.verify = Some(value != "0"),
            _ => {}
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) JSOC_RC (explicit)
    // 2) ./.jsocrc
    // 3) ~/.jsocrc
    if let Ok(p) = std::env::var("JSOC_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".jsocrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".jsocrc"));
    }
    v
}
