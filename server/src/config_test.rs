use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_when_nothing_is_set() {
    let config = GateConfig::from_lookup(lookup(&[]));
    assert_eq!(config, GateConfig::default());
    assert_eq!(config.port, 3000);
    assert_eq!(config.verify_timeout, Duration::from_secs(3));
    assert_eq!(config.protected_prefixes, vec!["/dashboard".to_owned()]);
    assert!(!config.cookie_secure);
}

#[test]
fn backend_url_falls_back_to_api_url() {
    let config = GateConfig::from_lookup(lookup(&[("API_URL", "http://api:9000/")]));
    assert_eq!(config.backend_url, "http://api:9000");

    let config = GateConfig::from_lookup(lookup(&[("API_URL", "http://api:9000"), ("BACKEND_URL", "http://edge:1")]));
    assert_eq!(config.backend_url, "http://edge:1");
}

#[test]
fn endpoint_joins_origin_prefix_and_path() {
    let config = GateConfig::from_lookup(lookup(&[("BACKEND_URL", "http://b"), ("BACKEND_API_PREFIX", "/v2/")]));
    assert_eq!(config.backend_endpoint("/auth/verify"), "http://b/v2/auth/verify");
}

#[test]
fn protected_prefixes_are_comma_separated() {
    let config = GateConfig::from_lookup(lookup(&[("PROTECTED_PREFIXES", " /dashboard, /reports ,,")]));
    assert_eq!(config.protected_prefixes, vec!["/dashboard".to_owned(), "/reports".to_owned()]);

    let blank = GateConfig::from_lookup(lookup(&[("PROTECTED_PREFIXES", " , ")]));
    assert_eq!(blank.protected_prefixes, vec!["/dashboard".to_owned()]);
}

#[test]
fn invalid_numbers_keep_defaults() {
    let config = GateConfig::from_lookup(lookup(&[("PORT", "http"), ("VERIFY_TIMEOUT_MS", "-1")]));
    assert_eq!(config.port, 3000);
    assert_eq!(config.verify_timeout, Duration::from_millis(3000));
}

#[test]
fn cookie_secure_inferred_from_scheme_unless_overridden() {
    let https = GateConfig::from_lookup(lookup(&[("BACKEND_URL", "https://api.example.com")]));
    assert!(https.cookie_secure);

    let forced_off = GateConfig::from_lookup(lookup(&[("BACKEND_URL", "https://api.example.com"), ("COOKIE_SECURE", "off")]));
    assert!(!forced_off.cookie_secure);

    let garbage = GateConfig::from_lookup(lookup(&[("COOKIE_SECURE", "maybe")]));
    assert!(!garbage.cookie_secure);
}

#[test]
fn parse_bool_variants() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(raw), Some(true), "expected true for {raw:?}");
    }
    for raw in ["0", "False", "no", "off"] {
        assert_eq!(parse_bool(raw), Some(false), "expected false for {raw:?}");
    }
    assert_eq!(parse_bool(""), None);
}
