//! Kanban Board
//!
//! Serves the board ordering store over HTTP, and drives a running server
//! from the command line.

use anyhow::{Result, bail};
use clap::Parser;
use kanban_board::api;
use kanban_board::board::{BoardSession, DragEnd, HttpBoardApi};
use kanban_board::cli::{Cli, ClientArgs, Command, ServeArgs};
use kanban_board::config::Config;
use kanban_board::db::Database;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Set up the global subscriber from `--log` and `--verbose`.
/// `RUST_LOG` takes precedence over the default level when set.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = Config::load_or_default(cli.config.as_deref().map(Path::new))?;
    if let Some(database) = &cli.database {
        config.server.db_path = database.into();
    }
    debug!(?config, "Configuration loaded");

    match cli.command {
        None => run_server(config, ServeArgs::default()).await,
        Some(Command::Serve(args)) => run_server(config, args).await,
        Some(Command::Show(client)) => {
            let session = connect(&config, &client).await?;
            print_board(&session);
            Ok(())
        }
        Some(Command::MoveColumn { from, to, client }) => {
            let session = connect(&config, &client).await?;
            apply(&session, DragEnd::column(from, to)).await?;
            print_board(&session);
            Ok(())
        }
        Some(Command::MoveTask {
            from_column,
            from,
            to_column,
            to,
            client,
        }) => {
            let session = connect(&config, &client).await?;
            apply(&session, DragEnd::task(from_column, from, to_column, to)).await?;
            print_board(&session);
            Ok(())
        }
    }
}

async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = config.server.socket_addr()?;
    let db = Arc::new(Database::open(&config.server.db_path)?);
    info!(path = %config.server.db_path.display(), "Database opened");

    api::serve(db, addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    })
    .await
}

/// Build a session against the configured server and load the board.
async fn connect(config: &Config, client: &ClientArgs) -> Result<BoardSession<HttpBoardApi>> {
    let url = client.url.as_deref().unwrap_or(&config.board.api_url);
    let session =
        BoardSession::with_limits(HttpBoardApi::new(url), config.board.session_limits());

    if let Err(err) = session.load().await {
        bail!("{} ({})", session.error().unwrap_or_default(), err);
    }
    Ok(session)
}

/// Apply a drag and wait for the store to acknowledge it.
async fn apply(session: &BoardSession<HttpBoardApi>, drag: DragEnd) -> Result<()> {
    match session.on_drag_end(&drag) {
        Some(pending) => pending.settled().await,
        None => {
            println!("Nothing to move.");
            return Ok(());
        }
    }

    if let Some(error) = session.error() {
        bail!(error);
    }
    Ok(())
}

fn print_board(session: &BoardSession<HttpBoardApi>) {
    for column in session.columns() {
        println!("[{}] {} ({}) {}", column.id, column.title, column.slug, column.color);
        for (index, task) in session.column_tasks(column.id).iter().enumerate() {
            println!("  {}. #{} {}", index, task.id, task.title);
        }
    }
}
