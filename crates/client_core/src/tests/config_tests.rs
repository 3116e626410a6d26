use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_point_at_the_hosted_service_with_builtin_tenants() {
    let settings = Settings::default();
    assert!(settings.service_url.starts_with("https://"));
    assert_eq!(settings.request_timeout, Duration::from_secs(15));
    assert_eq!(
        settings.tenant_table().expect("table"),
        TenantTable::default()
    );
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
service_url = "http://localhost:8000"
request_timeout_secs = 3

[[tenants]]
id = "bakery"
name = "Bakery"
marker = "/bakery/"
"#,
    )
    .expect("parse");

    assert_eq!(settings.service_url, "http://localhost:8000");
    assert_eq!(settings.request_timeout, Duration::from_secs(3));

    let table = settings.tenant_table().expect("table");
    assert_eq!(table.rules().len(), 1);
    assert_eq!(table.rules()[0].tenant_id.as_str(), "bakery");
    assert_eq!(table.rules()[0].marker_fragment, "/bakery/");
}

#[test]
fn unknown_file_keys_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "servce_url = \"http://x\"").is_err());
}

#[test]
fn env_overrides_file_and_ignores_bad_timeouts() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("ORDER_SERVICE_URL", "http://legacy:1"),
            ("APP__SERVICE_URL", "http://preferred:2"),
            ("APP__REQUEST_TIMEOUT_SECS", "soon"),
        ]),
    );

    assert_eq!(settings.service_url, "http://preferred:2");
    assert_eq!(settings.request_timeout, Duration::from_secs(15));
}

#[test]
fn zero_timeout_is_rejected_from_file_and_ignored_from_env() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "request_timeout_secs = 0").is_err());
    assert_eq!(settings.request_timeout, Duration::from_secs(15));

    apply_env(
        &mut settings,
        env_from(&[("APP__REQUEST_TIMEOUT_SECS", "0")]),
    );
    assert_eq!(settings.request_timeout, Duration::from_secs(15));
}

#[test]
fn service_url_must_be_http() {
    assert_eq!(
        normalize_service_url(" http://localhost:8000/ ").expect("valid"),
        "http://localhost:8000"
    );
    assert!(normalize_service_url("ftp://files.example.com").is_err());
    assert!(normalize_service_url("not a url").is_err());
}

#[test]
fn invalid_tenant_rules_fail_table_construction() {
    let settings = Settings {
        tenants: Some(vec![
            TenantRuleSettings {
                id: "a".into(),
                name: None,
                marker: "x".into(),
            },
            TenantRuleSettings {
                id: "A".into(),
                name: None,
                marker: "y".into(),
            },
        ]),
        ..Settings::default()
    };
    assert!(settings.tenant_table().is_err());
}

#[test]
fn explicit_settings_file_must_exist() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let missing = env::temp_dir().join(format!("order_console_missing_{suffix}.toml"));

    assert!(load_settings(Some(&missing)).is_err());
}

#[test]
fn explicit_settings_file_is_loaded() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("order_console_settings_{suffix}.toml"));
    fs::write(&path, "request_timeout_secs = 7\n").expect("write settings");

    let settings = load_settings(Some(&path)).expect("load");
    assert_eq!(settings.request_timeout, Duration::from_secs(7));

    fs::remove_file(path).expect("cleanup");
}
