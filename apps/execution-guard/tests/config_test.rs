//! Configuration Loading Tests
//!
//! File loading, environment interpolation and credential checks through
//! the public loader.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;

use execution_guard::config::{ConfigError, load_config, require_credentials};
use execution_guard::infrastructure::broker::AlpacaEnvironment;
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn loads_yaml_file_with_env_defaults() {
    let file = write_config(
        r#"
broker:
  api_key: "${GUARD_TEST_KEY_THAT_IS_NOT_SET:-paper-key}"
  api_secret: "${GUARD_TEST_SECRET_THAT_IS_NOT_SET:-paper-secret}"
  environment: "${GUARD_TEST_ENV_THAT_IS_NOT_SET:-paper}"

risk:
  max_positions: 3
  daily_loss_limit_pct: 0.025

exits:
  trailing:
    shadow_mode: false
    max_positions: 2
"#,
    );

    let config = load_config(file.path().to_str()).unwrap();

    assert_eq!(config.broker.api_key, "paper-key");
    assert_eq!(config.broker.environment, AlpacaEnvironment::Paper);
    assert_eq!(config.risk.max_positions, 3);
    assert_eq!(config.risk_config().daily_loss_limit_pct, dec!(0.025));
    assert!(!config.exits.trailing.shadow_mode);
    assert!(config.exits.profit_taking.shadow_mode);
    require_credentials(&config).unwrap();
}

#[test]
fn unset_credentials_are_reported_by_name() {
    let file = write_config(
        r#"
broker:
  api_key: "${GUARD_TEST_KEY_THAT_IS_NOT_SET}"
  api_secret: "${GUARD_TEST_SECRET_THAT_IS_NOT_SET}"
"#,
    );

    let config = load_config(file.path().to_str()).unwrap();
    let err = require_credentials(&config).unwrap_err();

    assert!(matches!(err, ConfigError::MissingEnvVar(ref names) if names.contains("ALPACA_KEY")));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = load_config(path.to_str()).unwrap_err();

    assert!(matches!(err, ConfigError::ReadError { .. }));
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn inconsistent_sizing_bounds_fail_validation() {
    let file = write_config(
        r"
sizing:
  min_multiplier: 1.5
  max_multiplier: 0.5
",
    );

    let err = load_config(file.path().to_str()).unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError(_)));
}
