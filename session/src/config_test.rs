use super::*;
use std::collections::HashMap;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_when_nothing_is_set() {
    let config = ClientConfig::from_lookup(lookup(&[]));
    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.endpoint("/auth/refresh"), "http://localhost:8000/api/v1/auth/refresh");
}

#[test]
fn variables_override_defaults() {
    let config = ClientConfig::from_lookup(lookup(&[
        ("API_URL", "https://api.example.com/"),
        ("API_PREFIX", "/v2/"),
        ("API_TIMEOUT_SECS", "15"),
        ("LOGIN_PATH", "/signin"),
    ]));
    assert_eq!(config.endpoint("/auth/verify"), "https://api.example.com/v2/auth/verify");
    assert_eq!(config.timeout, Duration::from_secs(15));
    assert_eq!(config.login_path, "/signin");
}

#[test]
fn unparsable_timeout_falls_back() {
    let config = ClientConfig::from_lookup(lookup(&[("API_TIMEOUT_SECS", "soon")]));
    assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
}
