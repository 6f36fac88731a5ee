use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::driver::I2cDriver;
use crate::error::Result;
use crate::manager::BusManager;

/// A bus controller to publish under a device alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Platform path of the controller.
    pub path: String,
    /// Device path the bus is opened through.
    pub alias: String,
}

/// Board bus setup, read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub buses: Vec<BusConfig>,
    #[serde(default)]
    pub default_bus: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Register every configured bus, in file order.
    ///
    /// Stops at the first failure; buses registered before it stay
    /// registered.
    pub fn register_all<D: I2cDriver>(&self, manager: &BusManager<D>) -> Result<()> {
        for bus in &self.buses {
            manager.register_bus(bus.path.as_bytes(), bus.alias.as_bytes())?;
        }
        Ok(())
    }

    /// Bus to use when none is named: the explicit default, else the first
    /// registered alias.
    pub fn default_bus(&self) -> Option<&str> {
        self.default_bus
            .as_deref()
            .or_else(|| self.buses.first().map(|b| b.alias.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn parses_buses_and_default() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "buses": [
                    { "path": "/soc/i2c@21a0000", "alias": "/dev/i2c-1" },
                    { "path": "/soc/i2c@21a4000", "alias": "/dev/i2c-2" }
                ],
                "default_bus": "/dev/i2c-2"
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.buses.len(), 2);
        assert_eq!(cfg.buses[0].alias, "/dev/i2c-1");
        assert_eq!(cfg.default_bus(), Some("/dev/i2c-2"));
    }

    #[test]
    fn default_bus_falls_back_to_first_alias() {
        let cfg = Config {
            buses: vec![BusConfig { path: "/a".into(), alias: "/dev/i2c-0".into() }],
            default_bus: None,
        };
        assert_eq!(cfg.default_bus(), Some("/dev/i2c-0"));
        assert_eq!(Config::default().default_bus(), None);
    }

    #[test]
    fn empty_object_is_an_empty_config() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();

        let err = Config::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigIo(_)));
        assert_eq!(err.kind(), ErrorKind::Config);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ buses: ").unwrap();
        let err = Config::load(&bad).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ni2c.json");
        fs::write(&path, r#"{ "default_bus": "/dev/i2c-3" }"#).unwrap();

        let cfg = Config::load(&path).unwrap();
        assert!(cfg.buses.is_empty());
        assert_eq!(cfg.default_bus(), Some("/dev/i2c-3"));
    }
}
