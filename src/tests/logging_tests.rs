use super::*;
use serial_test::serial;

#[test]
#[serial]
fn test_env_filter_uses_variable() {
    std::env::set_var(LOG_ENV, "debug");
    let filter = env_filter();
    std::env::remove_var(LOG_ENV);

    assert_eq!(filter.to_string(), "debug");
}

#[test]
#[serial]
fn test_env_filter_defaults_to_info() {
    std::env::remove_var(LOG_ENV);
    assert_eq!(env_filter().to_string(), "info");
}

#[test]
#[serial]
fn test_init_twice_is_harmless() {
    init(true);
    init(true);
    tracing::info!("still logging");
}
