use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

mod calendar;
mod config;
mod db;
mod error;
mod html;
mod render;
mod server;
mod types;
mod validation;

use config::Config;
use types::Section;

#[derive(Parser, Debug)]
#[command(name = "campusdocx")]
#[command(about = "Calendar journal for school periods and daily activities")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SQLite database file (overrides CAMPUSDOCX_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory of .sql migration files (overrides CAMPUSDOCX_MIGRATIONS)
    #[arg(long, global = true)]
    migrations: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on (overrides CAMPUSDOCX_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Render a text file as HTML and print it
    Render {
        /// Path to the text file
        file: PathBuf,

        /// Render as a field of this section (school shows the holiday banner)
        #[arg(long)]
        section: Option<String>,
    },
}

/// Log filter: `RUST_LOG` if set, else `log_level`. Request logs from the
/// trace layer stay at info, hyper internals are capped at warn.
fn log_filter(log_level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=info".parse()?))
}

fn init_tracing(log_level: &str) -> Result<()> {
    fmt()
        .with_env_filter(log_filter(log_level)?)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    match args.command {
        None => serve(args.db, args.migrations, None).await?,
        Some(Commands::Serve { port }) => serve(args.db, args.migrations, port).await?,
        Some(Commands::Render { file, section }) => {
            let section = match section.as_deref() {
                None => None,
                Some(name) => match Section::parse(name) {
                    Some(section) => Some(section),
                    None => bail!("Unknown section: {}", name),
                },
            };
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let markup = render::render_field(&text, section == Some(Section::School));
            println!("{}", markup.into_string());
        }
    }

    Ok(())
}

async fn serve(db: Option<PathBuf>, migrations: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(db) = db {
        config.db_path = db;
    }
    if let Some(migrations) = migrations {
        config.migrations_dir = migrations;
    }
    if let Some(port) = port {
        config.port = port;
    }

    server::serve(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_lets_request_logs_through() {
        let filter = log_filter("warn").unwrap().to_string();
        assert!(filter.contains("tower_http=info"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_render_command_parses() {
        let args = Args::try_parse_from(["campusdocx", "render", "notes.txt", "--section", "school"])
            .unwrap();
        match args.command {
            Some(Commands::Render { file, section }) => {
                assert_eq!(file, PathBuf::from("notes.txt"));
                assert_eq!(section.as_deref(), Some("school"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
