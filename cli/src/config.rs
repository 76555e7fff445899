use std::path::Path;

use anyhow::Context;
use runner::ExecutorSettings;
use serde::Deserialize;

/// File picked up from the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "termbook.toml";

/// Contents of `termbook.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub executor: ExecutorSettings,
    /// Program started for each session; commands are fed to its stdin.
    pub shell: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            executor: ExecutorSettings::default(),
            shell: "sh".to_string(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `explicit` if given, else `./termbook.toml` if it exists, else
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(CONFIG_FILE).is_file() => Path::new(CONFIG_FILE),
            None => {
                tracing::debug!("no {CONFIG_FILE} found, using defaults");
                return Ok(Config::default());
            }
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config '{}'", path.display()))?;
        let config = Config::parse(&text)
            .with_context(|| format!("invalid config '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }
}
