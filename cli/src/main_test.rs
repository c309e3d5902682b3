use super::*;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["gatehouse-cli"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments parse")
}

#[test]
fn chat_takes_the_question_positionally() {
    let cli = parse(&["--api-url", "http://api:8000/", "chat", "how many rows?"]);
    assert_eq!(cli.command, Command::Chat { question: "how many rows?".into() });
    assert_eq!(cli.client_config().endpoint("/chat/stream"), "http://api:8000/api/v1/chat/stream");
}

#[test]
fn password_wins_as_credentials() {
    let cli = parse(&["--password", "hunter2", "verify"]);
    assert_eq!(cli.credentials(), Some(Credentials::Password { password: "hunter2".into() }));

    let cli = parse(&["--email", "a@uni.edu", "status"]);
    assert_eq!(cli.credentials(), Some(Credentials::Email { email: "a@uni.edu".into() }));
}

#[test]
fn password_and_email_conflict() {
    let result = Cli::try_parse_from(["gatehouse-cli", "--password", "p", "--email", "e@x", "login"]);
    assert!(result.is_err());
}

#[test]
fn prefix_and_timeout_flow_into_client_config() {
    let cli = parse(&["--api-prefix", "/v2/", "--timeout-secs", "5", "logout"]);
    let config = cli.client_config();
    assert_eq!(config.api_prefix, "/v2");
    assert_eq!(config.timeout, Duration::from_secs(5));
}

#[test]
fn api_errors_render_with_their_kind() {
    let err = CliError::from(ApiError::Network("connection refused".into()));
    assert_eq!(err.to_string(), "network_error: network error: connection refused");
}
