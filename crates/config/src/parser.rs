use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlatformConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let substituted = substitution::substitute_env_vars(&content)?;

    let config: PlatformConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> PlatformConfig {
    PlatformConfig {
        platform: PlatformInfo {
            name: "BookSwap".to_string(),
            description: "A community platform for trading physical books".to_string(),
            version: "1.0.0".to_string(),
        },
        matching: MatchingConfig::default(),
        geography: GeographyConfig::default(),
        trust: TrustConfig::default(),
        lifecycle: LifecycleConfig::default(),
        sweeper: SweeperConfig::default(),
        observability: ObservabilityConfig {
            log_format: defaults::default_log_format(),
            metrics_port: None,
        },
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(
    config: &PlatformConfig,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = generate_default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: PlatformConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.platform.name, "BookSwap");
        assert_eq!(parsed.trust.floor, config.trust.floor);
        assert_eq!(parsed.matching.max_suggestions, config.matching.max_suggestions);
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let yaml = r#"
platform:
  name: MiniSwap
  description: test instance
  version: 1.0.0
"#;
        let parsed: PlatformConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.matching.score_threshold, 0.3);
        assert_eq!(parsed.trust.floor, 20.0);
        assert_eq!(parsed.lifecycle.request_expiry_days, 14);
        assert_eq!(parsed.sweeper.request_sweep_interval_secs, 3600);
    }
}
