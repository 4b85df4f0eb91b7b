use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub categorizer: CategorizerSection,
    pub notion: NotionSection,
    pub input: InputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    /// "ollama" or "offline"
    pub provider: String,
    pub base_url: String,
    /// Unset: pick from the installed models at start-up
    pub model: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategorizerSection {
    pub confidence_threshold: f64,
    pub rules_file: PathBuf,
    /// Ask the operator about low-confidence transactions
    pub interactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotionSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub notion_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputSection {
    pub dir: PathBuf,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: None,
            timeout_secs: 120,
        }
    }
}

impl Default for CategorizerSection {
    fn default() -> Self {
        Self {
            confidence_threshold: tally_categorize::DEFAULT_CONFIDENCE_THRESHOLD,
            rules_file: PathBuf::from("transaction_rules.txt"),
            interactive: true,
        }
    }
}

impl Default for NotionSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            api_key: None,
            database_id: None,
            notion_version: "2022-06-28".to_string(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("input"),
        }
    }
}

impl Config {
    /// Let the environment override file values. `lookup` is `std::env::var`
    /// outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(v) = set(lookup("NOTION_API_KEY")) {
            self.notion.api_key = Some(v);
        }
        if let Some(v) = set(lookup("NOTION_DATABASE_ID")) {
            self.notion.database_id = Some(v);
        }
        if let Some(v) = set(lookup("OLLAMA_HOST")) {
            self.llm.base_url = normalize_host(&v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.categorizer.confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            bail!("confidence_threshold must be between 0.0 and 1.0 (got {t})");
        }
        match self.llm.provider.as_str() {
            "ollama" | "offline" => Ok(()),
            other => bail!("unknown llm provider {other:?} (expected \"ollama\" or \"offline\")"),
        }
    }

    /// TOML rendering with credentials masked.
    pub fn redacted(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.notion.api_key = shown.notion.api_key.as_deref().map(mask);
        toml::to_string_pretty(&shown).context("serialize config")
    }
}

/// `OLLAMA_HOST` is often given as `host:port`.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

/// Config file, then environment.
pub fn load_config() -> Result<Config> {
    let mut cfg = load_config_from(&config_path()?)?;
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
