use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const DEFAULT_URL: &str = "http://127.0.0.1:9889";
pub const NATIVE_ASSET_ID: &str =
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
pub const NATIVE_ASSET_ALIAS: &str = "BTM";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeAsset {
    pub id: String,
    pub alias: String,
}

impl Default for NativeAsset {
    fn default() -> Self {
        Self {
            id: NATIVE_ASSET_ID.to_string(),
            alias: NATIVE_ASSET_ALIAS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub url: String,
    pub native_asset: NativeAsset,
    /// Wait before every build call, throttles requests against the node.
    pub pacing_delay_ms: u64,
    pub build_ttl: u64,
    pub build_time_range: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            native_asset: NativeAsset::default(),
            pacing_delay_ms: 1000,
            build_ttl: 1,
            build_time_range: 0,
        }
    }
}

impl Config {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path).with_context(|| {
            format!("Cannot read config file {path}", path = path.display())
        })?;
        let config: Config = serde_yaml::from_reader(file).with_context(|| {
            format!("Cannot parse config file {path}", path = path.display())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let bytes = hex::decode(&self.native_asset.id).with_context(|| {
            format!("native asset id {} is not hex", self.native_asset.id)
        })?;
        if bytes.len() != 32 {
            return Err(anyhow!(
                "native asset id must be 32 bytes, got {}",
                bytes.len()
            ));
        }
        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, NATIVE_ASSET_ID};

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config: Config = serde_yaml::from_str("url: http://10.0.0.2:9889\n").unwrap();
        assert_eq!(config.url, "http://10.0.0.2:9889");
        assert_eq!(config.native_asset.id, NATIVE_ASSET_ID);
        assert_eq!(config.pacing_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(serde_yaml::from_str::<Config>("retries: 3\n").is_err());
    }

    #[test]
    fn rejects_short_asset_id() {
        let config: Config =
            serde_yaml::from_str("native_asset:\n  id: ffff\n  alias: BTM\n").unwrap();
        assert!(config.validate().is_err());
    }
}
