use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file contents: the dataset settings plus CLI output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub dataset: tourload_core::Config,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub colors: bool,
    pub snapshot: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colors: true,
            snapshot: PathBuf::from("tourload.snapshot"),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_path {
            Self::load_from_file(&path)?
        } else {
            Self::load_default()?
        };

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                toml::from_str(&content).with_context(|| "Failed to parse TOML config")?
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).with_context(|| "Failed to parse YAML config")?
            }
            Some("json") => {
                serde_json::from_str(&content).with_context(|| "Failed to parse JSON config")?
            }
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };

        Ok(config)
    }

    fn load_default() -> Result<Self> {
        // Look for config file in standard locations
        let config_paths = [
            "tourload.toml",
            "tourload.yaml",
            "tourload.yml",
            "tourload.json",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::load_from_file(Path::new(path));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_paths = [
                config_dir.join("tourload").join("config.toml"),
                config_dir.join("tourload").join("config.yaml"),
                config_dir.join("tourload").join("config.yml"),
                config_dir.join("tourload").join("config.json"),
            ];

            for path in &xdg_paths {
                if path.exists() {
                    return Self::load_from_file(path);
                }
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tourload.toml");
        fs::write(
            &path,
            r#"
database = "rcs"

[scale]
user_count = 100
booking_count = 200

[load]
batch_rows = 50

[output]
colors = false
"#,
        )
        .unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.dataset.database, "rcs");
        assert_eq!(config.dataset.scale.user_count, 100);
        assert_eq!(config.dataset.scale.tour_count, 1_000_000);
        assert_eq!(config.dataset.load.batch_rows, 50);
        assert!(!config.output.colors);
        assert_eq!(config.output.snapshot, PathBuf::from("tourload.snapshot"));
    }

    #[test]
    fn test_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"scale": {"tour_count": 10}}"#).unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.dataset.scale.tour_count, 10);
        assert_eq!(config.dataset.database, "test");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "").unwrap();
        assert!(Config::load(Some(path)).is_err());
    }
}
