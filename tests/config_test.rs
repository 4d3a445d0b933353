use std::collections::HashMap;
use std::time::Duration;
use workitem_agent::config::{Config, DEFAULT_WIQ};

fn from_vars(vars: &[(&str, &str)]) -> workitem_agent::error::Result<Config> {
    let env: HashMap<&str, &str> = vars.iter().copied().collect();
    Config::from_lookup(|name| env.get(name).map(|v| v.to_string()))
}

#[test]
fn defaults_when_nothing_is_set() {
    let config = from_vars(&[("WORK_DIR", "/tmp")]).unwrap();
    assert_eq!(config.wiq, DEFAULT_WIQ);
    assert_eq!(config.queue, DEFAULT_WIQ);
    assert!(!config.is_ephemeral());
    assert_eq!(config.processing_timeout, None);
    assert_eq!(config.log_level, "info");
    assert!(config.database_url.is_none());
    assert!(!config.dummy_workitem);
}

#[test]
fn wiq_takes_priority_over_legacy_name() {
    let config = from_vars(&[("wiq", "primary"), ("SF_AMQPQUEUE", "legacy")]).unwrap();
    assert_eq!(config.wiq, "primary");
    assert_eq!(config.queue, "primary");

    let config = from_vars(&[("wiq", ""), ("SF_AMQPQUEUE", "legacy")]).unwrap();
    assert_eq!(config.wiq, "legacy");
}

#[test]
fn queue_overrides_consumer_name_only() {
    let config = from_vars(&[("wiq", "work"), ("queue", "messages")]).unwrap();
    assert_eq!(config.wiq, "work");
    assert_eq!(config.queue, "messages");
}

#[test]
fn non_empty_vmid_enables_ephemeral_mode() {
    assert!(from_vars(&[("SF_VMID", "vm-1")]).unwrap().is_ephemeral());
    assert!(!from_vars(&[("SF_VMID", "")]).unwrap().is_ephemeral());
}

#[test]
fn timeout_parses_and_rejects_garbage() {
    let config = from_vars(&[("WORKITEM_TIMEOUT_SECS", "30")]).unwrap();
    assert_eq!(config.processing_timeout, Some(Duration::from_secs(30)));

    let config = from_vars(&[("WORKITEM_TIMEOUT_SECS", "0")]).unwrap();
    assert_eq!(config.processing_timeout, None);

    assert!(from_vars(&[("WORKITEM_TIMEOUT_SECS", "soon")]).is_err());
}

#[test]
fn database_url_is_required_only_on_demand() {
    let config = from_vars(&[]).unwrap();
    assert!(config.require_database_url().is_err());

    let config = from_vars(&[("DATABASE_URL", "postgres://u:p@localhost/db")]).unwrap();
    assert!(config.require_database_url().is_ok());
}

#[test]
fn config_from_env_reads_process_environment() {
    unsafe {
        std::env::set_var("SF_AMQPQUEUE", "env_queue");
    }

    let config = Config::from_env().unwrap();
    // `wiq` may be set in the developer's shell; the legacy name only wins without it.
    if std::env::var("wiq").map_or(true, |v| v.is_empty()) {
        assert_eq!(config.wiq, "env_queue");
    }

    unsafe {
        std::env::remove_var("SF_AMQPQUEUE");
    }
}
