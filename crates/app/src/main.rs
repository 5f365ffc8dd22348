mod cli;
mod commands;
mod train;

use std::fmt;
use std::time::Duration;

use clap::Parser;
use services::{ApiConfig, AppServices, Clock, SessionPolicy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    InvalidDbUrl { raw: String },
    NotSignedIn,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} is required"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::NotSignedIn => write!(f, "not signed in; run `chauffeur login` first"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;

    let policy = SessionPolicy {
        access_token_ttl: Duration::from_secs(cli.token_ttl_secs),
        session_ceiling: Duration::from_secs(cli.session_ceiling_secs),
        ..SessionPolicy::default()
    };
    let api = ApiConfig::new(&cli.api_url)?;
    tracing::debug!(api = %api.base_url(), db = %db_url, "starting");
    let services = AppServices::new_sqlite(&db_url, api, Clock::default_clock(), policy).await?;

    match cli.command {
        Command::Login(args) => commands::login(&services, args).await,
        Command::Logout => commands::logout(&services).await,
        Command::Whoami => commands::whoami(&services).await,
        Command::Register(args) => commands::register(&services, args).await,
        Command::Train(args) => train::run(&services, &args).await,
        Command::Users(command) => commands::users(&services, command).await,
        Command::Videos(command) => commands::videos(&services, command).await,
        Command::Consent(command) => commands::consent(&services, command).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        // printed once at the binary boundary
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_become_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/chauffeur.sqlite3"),
            "sqlite:///var/lib/chauffeur.sqlite3"
        );
        let relative = normalize_sqlite_url("sqlite:data/chauffeur.sqlite3");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("data/chauffeur.sqlite3"));
    }

    #[test]
    fn non_file_urls_are_rejected() {
        let err = prepare_sqlite_file("postgres://localhost/db").unwrap_err();
        assert_eq!(err.to_string(), "invalid --db value: postgres://localhost/db");
    }
}
