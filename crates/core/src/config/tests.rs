use super::*;
use std::io::Write;

#[test]
fn test_binding_config_default() {
    let config = BindingConfig::default();
    assert_eq!(config.client_version_prefix, "1.");
    assert_eq!(config.event_capacity, 64);
    assert_eq!(config.gas.fallback_gas, 4_700_000);
    assert_eq!(config.gas.min_gas, 21_272);
    assert_eq!(config.gas.margin_percent, 10);
    assert!(config.validate().is_ok());
}

#[test]
fn test_margin_rounds_down() {
    let gas = GasPolicy::default();
    assert_eq!(gas.apply_margin(U256::from(10_000u64)), U256::from(11_000u64));
    assert_eq!(gas.apply_margin(U256::from(12_345u64)), U256::from(13_579u64));
    assert_eq!(gas.clamp(U256::from(110u64)), U256::from(21_272u64));
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = BindingConfig::from_toml_str(
        r#"
        [gas]
        margin_percent = 25
        "#,
    )
    .unwrap();

    assert_eq!(config.gas.margin_percent, 25);
    assert_eq!(config.gas.fallback_gas, 4_700_000);
    assert_eq!(config.client_version_prefix, "1.");
}

#[test]
fn test_validation_errors() {
    let mut config = BindingConfig::default();
    config.client_version_prefix.clear();
    assert!(matches!(config.validate(), Err(ConfigError::EmptyVersionPrefix)));

    let mut config = BindingConfig::default();
    config.event_capacity = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidEventCapacity)));

    let result = BindingConfig::from_toml_str(
        r#"
        [gas]
        min_gas = 5000000
        "#,
    );
    assert!(matches!(result, Err(ConfigError::MinGasAboveFallback { .. })));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "client_version_prefix = \"2.\"\nevent_capacity = 8").unwrap();

    let config = BindingConfig::load(file.path()).unwrap();
    assert_eq!(config.client_version_prefix, "2.");
    assert_eq!(config.event_capacity, 8);

    let missing = BindingConfig::load("/nonexistent/contract-class.toml");
    assert!(matches!(missing, Err(ConfigError::Read { .. })));
}
