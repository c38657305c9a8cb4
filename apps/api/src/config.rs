use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::upload::validation::UploadPolicy;

const DEFAULT_EXTENSIONS: &str = ".py,.js,.java,.cpp,.c,.ts,.go,.rs,.php,.rb,.txt";
const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173,http://127.0.0.1:3000";

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset → in-memory store.
    pub database_url: Option<String>,
    /// Unset → offline heuristic analyzer.
    pub anthropic_api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub max_file_size_kb: usize,
    pub supported_extensions: Vec<String>,
    pub max_files_per_request: usize,
    pub reports_dir: PathBuf,
    pub analysis_timeout: Duration,
    pub render_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            host: optional_env("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8002)?,
            max_file_size_kb: parse_env("MAX_FILE_SIZE_KB", 200)?,
            supported_extensions: parse_extensions(
                &optional_env("SUPPORTED_EXTENSIONS").unwrap_or_else(|| DEFAULT_EXTENSIONS.into()),
            ),
            max_files_per_request: parse_env("MAX_FILES_PER_REQUEST", 5)?,
            reports_dir: PathBuf::from(
                optional_env("REPORTS_DIR").unwrap_or_else(|| "reports".to_string()),
            ),
            analysis_timeout: Duration::from_secs(parse_env("ANALYSIS_TIMEOUT_SECS", 60)?),
            render_timeout: Duration::from_secs(parse_env("RENDER_TIMEOUT_SECS", 30)?),
            cors_origins: split_list(
                &optional_env("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into()),
            ),
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            supported_extensions: self.supported_extensions.clone(),
            max_file_size_kb: self.max_file_size_kb,
            max_files_per_request: self.max_files_per_request,
        }
    }

    /// Request body cap: a full batch plus room for multipart framing.
    pub fn body_limit_bytes(&self) -> usize {
        self.max_files_per_request
            .max(1)
            .saturating_mul(self.max_file_size_kb)
            .saturating_mul(1024)
            .saturating_add(64 * 1024)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercases and dot-prefixes each entry (`PY` → `.py`).
fn parse_extensions(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in split_list(raw) {
        let ext = ext.to_ascii_lowercase();
        let ext = if ext.starts_with('.') { ext } else { format!(".{ext}") };
        if !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
