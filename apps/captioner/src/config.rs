use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::sweeper::RetentionPolicy;

/// Process-wide configuration, loaded once at startup and passed explicitly
/// into constructors — components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    /// Flat directory holding every cached/generated file.
    pub static_dir: PathBuf,
    /// Base under which stored files are served; local references are
    /// `<public_base_url>/static/<token>.<ext>`.
    pub public_base_url: String,
    /// Caption font file. Load failure falls back, never fails composition.
    pub font_path: PathBuf,
    pub sweep_interval: Duration,
    pub retention_max_age: Duration,
    pub layout: LayoutConfig,
}

/// Knobs of the caption layout pipeline. The defaults are the tuned values
/// of the production service; tests override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Fraction of image height where the caption band starts.
    pub band_start_ratio: f32,
    /// Hard cap on characters per display line.
    pub max_chars_per_line: usize,
    /// Fraction of image width a rendered line may occupy.
    pub safe_width_ratio: f32,
    /// Ceiling on inter-character spacing, in em (negative = compaction).
    pub spacing_ceiling_em: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            band_start_ratio: 0.60,
            max_chars_per_line: 10,
            safe_width_ratio: 0.94,
            spacing_ceiling_em: -0.02,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            static_dir: env_or("STATIC_DIR", "static_media").into(),
            public_base_url: env_or("SERVER_HOST_URL", "http://127.0.0.1:9007"),
            font_path: env_or("FONT_PATH", "handwriting.ttf").into(),
            sweep_interval: Duration::from_secs(secs_env("CLEANUP_INTERVAL", 43_200)?),
            retention_max_age: Duration::from_secs(secs_env("RETENTION_PERIOD", 86_400)?),
            layout: LayoutConfig::default(),
        })
    }

    /// The slice of configuration the sweeper reads.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            sweep_interval: self.sweep_interval,
            max_age: self.retention_max_age,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn secs_env(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("'{key}' must be a whole number of seconds")),
        Err(_) => Ok(default),
    }
}
