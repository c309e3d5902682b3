use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use frames::{ChunkKind, Credentials};
use futures_util::StreamExt;
use serde_json::Value;
use session::{ApiClient, ApiError, ClientConfig, Navigator};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing credentials; pass --password or --email (or set GATEHOUSE_PASSWORD / GATEHOUSE_EMAIL)")]
    MissingCredentials,
    #[error("http client init failed: {0}")]
    Client(#[from] reqwest::Error),
    #[error("{}: {}", .0.kind(), .0)]
    Api(#[from] ApiError),
    #[error("login rejected: {0}")]
    LoginRejected(String),
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("stream reported an error: {0}")]
    StreamError(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("stdout write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gatehouse-cli", about = "Session-aware client for the analytics backend")]
struct Cli {
    #[arg(long, env = "GATEHOUSE_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    #[arg(long, env = "GATEHOUSE_API_PREFIX", default_value = frames::DEFAULT_API_PREFIX)]
    api_prefix: String,

    /// Chat session id sent as `X-Session-ID`; a fresh one is generated when absent.
    #[arg(long, env = "GATEHOUSE_SESSION_ID")]
    session_id: Option<String>,

    #[arg(long, env = "GATEHOUSE_PASSWORD", conflicts_with = "email")]
    password: Option<String>,

    #[arg(long, env = "GATEHOUSE_EMAIL")]
    email: Option<String>,

    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Log in and print the resulting auth state.
    Login,
    /// Ask the backend whether the session is valid.
    Verify,
    /// Force a token refresh.
    Refresh,
    /// Log out; local state is cleared either way.
    Logout,
    /// Academic quota for the current session.
    Status,
    /// Ask one question and stream the answer to stdout.
    Chat { question: String },
    /// `GET` any backend path through the session client.
    Get { path: String },
}

/// Prints where a browser would have been sent once the session is gone.
struct LoginHint;

impl Navigator for LoginHint {
    fn navigate(&self, location: &str) {
        eprintln!("session expired; sign in again (login page: {location})");
    }
}

impl Cli {
    fn credentials(&self) -> Option<Credentials> {
        if let Some(password) = &self.password {
            return Some(Credentials::Password { password: password.clone() });
        }
        self.email
            .as_ref()
            .map(|email| Credentials::Email { email: email.clone() })
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url.as_str());
        config.api_prefix = self.api_prefix.trim_end_matches('/').to_owned();
        config.timeout = Duration::from_secs(self.timeout_secs);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let client = ApiClient::builder(cli.client_config())
        .navigator(Arc::new(LoginHint))
        .build()?;
    client.set_session_id(cli.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()));

    let credentials = cli.credentials();
    if cli.command == Command::Login {
        sign_in(&client, credentials.ok_or(CliError::MissingCredentials)?).await?;
        return print_json(&serde_json::to_value(client.auth_state())?);
    }
    if let Some(credentials) = credentials {
        sign_in(&client, credentials).await?;
    }

    match cli.command {
        Command::Login => Ok(()),
        Command::Verify => run_verify(&client).await,
        Command::Refresh => run_refresh(&client).await,
        Command::Logout => run_logout(&client).await,
        Command::Status => run_status(&client).await,
        Command::Chat { question } => run_chat(&client, &question).await,
        Command::Get { path } => run_get(&client, &path).await,
    }
}

async fn sign_in(client: &ApiClient, credentials: Credentials) -> Result<(), CliError> {
    if client.login(credentials).await {
        return Ok(());
    }
    let message = client
        .auth_state()
        .error
        .unwrap_or_else(|| "unknown reason".to_owned());
    Err(CliError::LoginRejected(message))
}

async fn run_verify(client: &ApiClient) -> Result<(), CliError> {
    if !client.verify().await {
        return Err(CliError::NotAuthenticated);
    }
    println!("authenticated");
    Ok(())
}

async fn run_refresh(client: &ApiClient) -> Result<(), CliError> {
    if !client.refresh().await {
        return Err(CliError::NotAuthenticated);
    }
    println!("refreshed");
    Ok(())
}

async fn run_logout(client: &ApiClient) -> Result<(), CliError> {
    client.logout().await;
    println!("logged out");
    Ok(())
}

async fn run_status(client: &ApiClient) -> Result<(), CliError> {
    let status = client.fetch_academic_status().await?;
    print_json(&serde_json::to_value(status)?)
}

async fn run_get(client: &ApiClient, path: &str) -> Result<(), CliError> {
    let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
    let value: Value = client.get(&path, &[]).await?;
    print_json(&value)
}

async fn run_chat(client: &ApiClient, question: &str) -> Result<(), CliError> {
    let mut stream = client.stream_chat(question).await?;
    let mut stdout = std::io::stdout().lock();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        match chunk.kind {
            ChunkKind::Content => {
                if let Some(text) = chunk.content {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
            }
            ChunkKind::Sql => {
                if let Some(sql) = chunk.content {
                    eprintln!("\n[sql] {sql}");
                }
            }
            ChunkKind::Error => {
                writeln!(stdout)?;
                return Err(CliError::StreamError(chunk.content.unwrap_or_else(|| "Unknown error".to_owned())));
            }
            ChunkKind::Start | ChunkKind::Complete | ChunkKind::Unknown => {}
        }
    }
    writeln!(stdout)?;
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
