use std::path::{Path, PathBuf};

use super::types::AppConfig;

const LOCAL_CONFIG_FILE: &str = "parawave.toml";

/// Get the default parawave data directory: ~/.parawave
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".parawave"))
}

/// Load configuration from an explicit path, applying environment overrides.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    let mut cfg = toml::from_str::<AppConfig>(&s)?;
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.parawave/config.toml
    let data_dir = get_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./parawave.toml (current directory)
    let local_config = Path::new(LOCAL_CONFIG_FILE);

    let mut cfg: AppConfig = if user_config.exists() {
        let s = std::fs::read_to_string(&user_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority after CLI flags).
pub fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Some(v) = env_value("PARAWAVE_MAX_CONCURRENCY") {
        cfg.run.max_concurrent_agents = v
            .parse()
            .map_err(|e| anyhow::anyhow!("PARAWAVE_MAX_CONCURRENCY: {e}"))?;
    }
    if let Some(v) = env_value("PARAWAVE_FAILURE_RECOVERY") {
        cfg.run.failure_recovery = v.parse()?;
    }
    if let Some(v) = env_value("PARAWAVE_SYNTHESIS_STRATEGY") {
        cfg.run.synthesis_strategy = v;
    }
    if let Some(v) = env_value("PARAWAVE_MIN_SPEEDUP") {
        cfg.run.minimum_speedup_ratio = v
            .parse()
            .map_err(|e| anyhow::anyhow!("PARAWAVE_MIN_SPEEDUP: {e}"))?;
    }
    Ok(())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
