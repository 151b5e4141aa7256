//! Service configuration

use crate::cli::Cli;
use pictag_vision::{BundleConfig, DeviceSpec};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Service configuration, layered defaults < YAML file < CLI/env
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Model identifier (local directory or hub repository id)
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Hub revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(cli);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(model_id) = &cli.model_id {
            self.model_id = model_id.clone();
        }
        if let Some(revision) = &cli.revision {
            self.revision = revision.clone();
        }
        if let Some(device) = cli.device {
            self.device = device;
        }
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(limit) = cli.max_upload_bytes {
            self.max_upload_bytes = limit;
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn bundle_config(&self) -> BundleConfig {
        BundleConfig::new(self.model_id.clone())
            .with_revision(self.revision.clone())
            .with_device(self.device)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            revision: default_revision(),
            device: DeviceSpec::Auto,
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_model_id() -> String {
    "./models/convnextv2-base-22k-224".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pictag-server"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.model_id, "./models/convnextv2-base-22k-224");
        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:8000");
        assert_eq!(config.device, DeviceSpec::Auto);
    }

    #[test]
    fn test_yaml_file() {
        let config = ServiceConfig::from_yaml(
            r#"
model_id: facebook/convnextv2-tiny-1k-224
device: cuda:1
port: 9000
"#,
        )
        .unwrap();
        assert_eq!(config.model_id, "facebook/convnextv2-tiny-1k-224");
        assert_eq!(config.device, DeviceSpec::Cuda(1));
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_yaml_rejects_unknown_keys_and_devices() {
        assert!(ServiceConfig::from_yaml("modle_id: typo").is_err());
        assert!(ServiceConfig::from_yaml("device: tpu").is_err());
        assert_eq!(ServiceConfig::from_yaml("  \n").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pictag.yaml");
        std::fs::write(&path, "port: 9000\nhost: 0.0.0.0\nrevision: v2\n").unwrap();

        let cli = cli(&[
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9100",
            "--device",
            "cpu",
            "--model-id",
            "./models/local",
        ]);
        let config = ServiceConfig::load(&cli.config, &cli).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.device, DeviceSpec::Cpu);
        assert_eq!(config.model_id, "./models/local");

        let bundle = config.bundle_config();
        assert_eq!(bundle.revision, "v2");
        assert_eq!(bundle.device, DeviceSpec::Cpu);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cli = cli(&["--config", "/nonexistent/pictag.yaml", "--port", "8123"]);
        let config = ServiceConfig::load(&cli.config, &cli).unwrap();
        assert_eq!(config.port, 8123);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
    }
}
