use super::{Config, MAX_CONFIG_FILE_BYTES};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Read a text file, refusing anything larger than `MAX_CONFIG_FILE_BYTES`.
///
/// Shared by dashboard config loading and the CLI commands that read agent
/// configurations from disk.
pub fn read_bounded(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat '{}'", path.display()))?;

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "File '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Load configuration from a file path; the extension selects the format.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = read_bounded(path)?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in '{}'", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in '{}'", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?,
    };

    Ok(config)
}

/// Write configuration to a file; the extension selects the format.
pub fn write_config_file(path: &Path, config: &Config) -> Result<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
        Some("toml") => toml::to_string_pretty(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };
    std::fs::write(path, content).with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaveEncoding;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_json_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.json");
        fs::write(&file, r#"{"server": {"port": 8080}}"#).unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn read_yaml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.yaml");
        fs::write(&file, "backend:\n  baseUrl: http://opamp:4321\n").unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.backend.base_url, "http://opamp:4321");
    }

    #[test]
    fn read_toml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[sessions]\nidleTtlSecs = 60\n").unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.sessions.idle_ttl_secs, 60);
    }

    #[test]
    fn reject_oversized_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("huge.json");
        let content = "x".repeat((MAX_CONFIG_FILE_BYTES + 1) as usize);
        fs::write(&file, content).unwrap();

        let result = load_config_file(&file);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds limit"));
    }

    #[test]
    fn invalid_yaml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.yml");
        fs::write(&file, "server: [").unwrap();

        let err = load_config_file(&file).unwrap_err();
        assert!(err.to_string().contains("broken.yml"));
    }

    #[test]
    fn write_then_load_each_format() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backend.save_encoding = SaveEncoding::Json;

        for name in ["out.json", "out.yaml", "out.toml"] {
            let file = dir.path().join(name);
            write_config_file(&file, &config).unwrap();
            let loaded = load_config_file(&file).unwrap();
            assert_eq!(loaded.backend.save_encoding, SaveEncoding::Json, "{name}");
        }
    }
}
