use anyhow::{Context, Result, bail};
use billmail_core::{CategorySchema, DEFAULT_WORKFLOW_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_billmail_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub mail: MailSection,
    pub categories: CategoriesSection,
    pub output: OutputSection,
    pub workflow: WorkflowSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    /// gemini | openai | anthropic
    pub provider: String,
    pub model: String,
    /// Overrides the provider's public endpoint (proxies, compatible servers)
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 2048,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MailSection {
    /// Directory holding `unread/` and `read/`
    pub spool_dir: String,
    /// Case-insensitive sender substring; empty disables filtering
    pub sender_filter: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            spool_dir: "~/.billmail/spool".to_string(),
            sender_filter: "Chase".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoriesSection {
    pub schema: CategorySchema,
    /// CSV with a `pattern,category` header
    pub mapping_file: Option<String>,
}

impl Default for CategoriesSection {
    fn default() -> Self {
        Self {
            schema: CategorySchema::Extended,
            mapping_file: Some("~/.billmail/categories.csv".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    pub bills_file: String,
    pub runs_file: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            bills_file: "~/.billmail/bills.jsonl".to_string(),
            runs_file: "~/.billmail/runs.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSection {
    pub name: String,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKFLOW_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// Used when neither RUST_LOG nor LOG_LEVEL is set
    pub level: Option<String>,
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_billmail_home()?.join("config.toml"))
}

/// Load `explicit`, or the default config file. Only the default file may be
/// absent (defaults apply); a missing explicit path is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let p = match explicit {
        Some(p) => {
            if !p.exists() {
                bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = config_path()?;
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(explicit: Option<&Path>) -> Result<()> {
    let p = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
